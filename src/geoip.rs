//! IP to location lookup for drafts posted without coordinates
//!
//! Uses a MaxMind GeoLite2 City database when one can be found. Results are
//! cached per address, including misses.

use crate::event::GeoLocation;
use maxminddb::{geoip2, Reader};
use std::collections::HashMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, info, warn};

const CACHE_SIZE: usize = 1024;

struct IpCache {
    cache: HashMap<IpAddr, Option<GeoLocation>>,
    max_size: usize,
}

impl IpCache {
    fn new(max_size: usize) -> Self {
        Self { cache: HashMap::with_capacity(max_size), max_size }
    }

    fn get_or_insert<F>(&mut self, ip: IpAddr, lookup_fn: F) -> Option<GeoLocation>
    where
        F: FnOnce(IpAddr) -> Option<GeoLocation>,
    {
        if let Some(cached) = self.cache.get(&ip) {
            return cached.clone();
        }

        // Evict half the cache if at capacity
        if self.cache.len() >= self.max_size {
            let to_remove: Vec<_> = self.cache.keys().take(self.max_size / 2).copied().collect();
            for key in to_remove {
                self.cache.remove(&key);
            }
        }

        let result = lookup_fn(ip);
        self.cache.insert(ip, result.clone());
        result
    }
}

pub struct GeoIpLookup {
    reader: Option<Reader<Vec<u8>>>,
    cache: Mutex<IpCache>,
}

impl GeoIpLookup {
    pub fn new(db_path: Option<&Path>) -> Self {
        let reader = Self::find_database(db_path).and_then(|path| match Reader::open_readfile(&path) {
            Ok(reader) => {
                info!(path = %path.display(), "geoip database loaded");
                Some(reader)
            }
            Err(err) => {
                warn!(path = %path.display(), error = %err, "geoip database unreadable");
                None
            }
        });
        Self { reader, cache: Mutex::new(IpCache::new(CACHE_SIZE)) }
    }

    fn find_database(explicit_path: Option<&Path>) -> Option<PathBuf> {
        if let Some(path) = explicit_path {
            if path.exists() {
                return Some(path.to_path_buf());
            }
            warn!(path = %path.display(), "configured geoip database not found, trying defaults");
        }

        let candidates = [
            dirs::config_dir().map(|p| p.join("globewatch/GeoLite2-City.mmdb")),
            Some(PathBuf::from("/usr/share/GeoIP/GeoLite2-City.mmdb")),
            Some(PathBuf::from("/var/lib/GeoIP/GeoLite2-City.mmdb")),
            Some(PathBuf::from("./GeoLite2-City.mmdb")),
        ];

        candidates.into_iter().flatten().find(|p| p.exists())
    }

    pub fn is_available(&self) -> bool {
        self.reader.is_some()
    }

    /// Resolve an address to a location. Local and private addresses never resolve.
    pub fn locate(&self, ip: IpAddr) -> Option<GeoLocation> {
        let reader = self.reader.as_ref()?;
        if is_local_or_private(ip) {
            return None;
        }
        let mut cache = self.cache.lock().ok()?;
        cache.get_or_insert(ip, |ip| {
            let found = lookup(reader, ip);
            if found.is_none() {
                debug!(%ip, "no geoip match");
            }
            found
        })
    }
}

fn lookup(reader: &Reader<Vec<u8>>, ip: IpAddr) -> Option<GeoLocation> {
    let record: geoip2::City = reader.lookup(ip).ok()?;
    let location = record.location?;
    let lat = location.latitude?;
    let lng = location.longitude?;
    let city = record
        .city
        .and_then(|c| c.names)
        .and_then(|names| names.get("en").map(|s| s.to_string()))
        .unwrap_or_default();
    let country = record
        .country
        .and_then(|c| c.iso_code)
        .map(str::to_string)
        .unwrap_or_default();
    Some(GeoLocation { lat, lng, city, country })
}

fn is_local_or_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_loopback() || v4.is_private() || v4.is_unspecified() || v4.is_link_local(),
        IpAddr::V6(v6) => v6.is_loopback() || v6.is_unspecified(),
    }
}
