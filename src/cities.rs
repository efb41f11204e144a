//! Reference geography: coastline outlines and a table of world cities

/// Simplified continent outlines as closed (lat, lng) rings in degrees
pub const COASTLINES: &[(&str, &[(f32, f32)])] = &[
    (
        "North America",
        &[
            (69.5, -90.5), (67.1, -81.4), (58.9, -94.7), (51.2, -79.9), (62.6, -77.4),
            (58.2, -67.6), (60.3, -64.6), (53.3, -55.8), (46.8, -71.1), (49.2, -65.1),
            (45.9, -59.8), (39.2, -76.3), (31.4, -81.3), (25.2, -80.4), (30.1, -84.1),
            (27.8, -97.1), (18.8, -95.9), (21.5, -87.1), (15.9, -88.9), (15.3, -83.4),
            (9.0, -82.2), (11.1, -74.9), (7.2, -80.9), (19.3, -105.0), (31.2, -113.1),
            (23.4, -109.4), (24.7, -112.2), (40.3, -124.4), (49.0, -122.8), (58.1, -134.1),
            (61.3, -150.6), (54.4, -164.8), (58.9, -157.0), (61.5, -166.1), (64.8, -160.8),
            (65.7, -168.1), (71.4, -156.6), (67.4, -108.9), (67.3, -96.1), (71.9, -95.2),
            (69.5, -90.5),
        ],
    ),
    (
        "South America",
        &[
            (11.1, -74.9), (10.7, -61.9), (4.2, -51.3), (-0.1, -50.4), (-7.3, -34.7),
            (-21.9, -40.9), (-24.9, -47.6), (-34.4, -53.8), (-33.9, -58.4), (-36.9, -56.8),
            (-41.1, -65.1), (-48.1, -66.0), (-53.8, -71.0), (-52.3, -74.9), (-46.6, -75.6),
            (-42.4, -72.7), (-18.3, -70.4), (-14.6, -76.0), (-4.7, -81.4), (3.8, -77.1),
            (9.0, -79.1), (11.1, -74.9),
        ],
    ),
    (
        "Europe",
        &[
            (31.2, 29.7), (31.2, 34.3), (36.7, 36.2), (36.7, 27.6), (39.5, 26.2),
            (41.5, 41.6), (45.2, 36.7), (47.3, 39.1), (44.4, 33.9), (46.6, 30.7),
            (41.1, 28.8), (40.3, 22.6), (36.4, 23.2), (45.6, 13.9), (40.2, 18.5),
            (37.9, 15.7), (44.4, 8.9), (36.0, -5.9), (36.9, -8.9), (43.0, -9.4),
            (43.4, -1.9), (48.7, -4.6), (53.5, 8.1), (57.1, 8.5), (54.0, 10.9),
            (54.4, 19.7), (59.2, 23.3), (60.0, 29.1), (60.7, 21.3), (65.1, 25.4),
            (65.7, 22.2), (55.4, 12.9), (59.5, 10.4), (58.6, 5.7), (62.6, 5.9),
            (69.8, 19.2), (70.5, 31.3), (69.3, 33.8), (31.2, 29.7),
        ],
    ),
    (
        "Africa",
        &[
            (29.9, 32.4), (11.7, 42.7), (10.6, 51.0), (-4.7, 39.2), (-14.7, 40.8),
            (-19.8, 34.8), (-24.1, 35.5), (-32.8, 28.2), (-34.8, 19.6), (-18.1, 11.8),
            (-10.7, 13.7), (3.7, 9.4), (6.3, 4.3), (4.4, -8.0), (14.7, -17.6),
            (29.9, 32.4),
        ],
    ),
    (
        "Asia",
        &[
            (77.0, 107.0), (70.8, 131.3), (69.4, 178.6), (62.3, 179.2), (59.9, 163.5),
            (51.0, 156.8), (56.8, 155.9), (62.6, 164.5), (54.7, 135.1), (52.2, 141.4),
            (39.8, 127.5), (35.1, 129.1), (40.9, 121.6), (39.2, 118.0), (37.5, 122.4),
            (34.9, 119.2), (28.2, 121.7), (19.8, 105.9), (13.4, 109.3), (8.6, 105.2),
            (13.4, 100.1), (1.3, 104.2), (22.8, 91.4), (15.9, 80.3), (8.0, 77.5),
            (21.4, 72.6), (30.3, 48.9), (24.0, 51.8), (26.4, 56.4), (22.3, 59.8),
            (12.6, 43.5), (21.3, 39.1), (69.3, 33.8), (67.5, 41.1), (66.6, 33.2),
            (63.8, 37.0), (68.6, 43.5), (68.1, 68.5), (71.0, 66.7), (73.0, 69.9),
            (66.2, 72.4), (72.8, 74.7), (77.0, 107.0),
        ],
    ),
    (
        "Australia",
        &[
            (-13.8, 143.6), (-26.1, 153.1), (-37.4, 150.0), (-38.0, 140.6), (-34.4, 138.2),
            (-35.3, 136.8), (-32.9, 137.8), (-34.9, 136.0), (-31.5, 131.3), (-34.2, 115.0),
            (-21.8, 114.1), (-19.7, 120.9), (-14.2, 125.7), (-15.0, 129.6), (-11.1, 132.4),
            (-11.9, 136.5), (-15.0, 135.5), (-17.7, 140.2), (-11.0, 142.1), (-13.8, 143.6),
        ],
    ),
    (
        "Greenland",
        &[
            (83.5, -27.1), (82.7, -20.8), (82.0, -31.4), (81.3, -12.2), (80.2, -20.0),
            (80.1, -17.7), (76.6, -21.7), (74.3, -19.4), (70.2, -26.4), (70.1, -22.3),
            (65.5, -39.8), (60.1, -43.4), (63.6, -51.6), (67.2, -54.0), (69.9, -50.9),
            (69.6, -54.7), (70.6, -51.4), (75.5, -58.6), (78.0, -73.3), (81.8, -62.7),
            (83.5, -27.1),
        ],
    ),
    (
        "Japan",
        &[
            (37.1, 141.0), (33.5, 135.8), (33.9, 131.0), (31.4, 130.2), (33.3, 129.4),
            (38.2, 139.4), (41.2, 140.3), (37.1, 141.0),
        ],
    ),
    (
        "UK/Ireland",
        &[
            (58.6, -3.0), (51.3, 1.4), (50.0, -5.2), (54.0, -2.9), (56.8, -6.1),
            (58.6, -3.0),
        ],
    ),
    (
        "Antarctica",
        &[
            (-64.2, -58.6), (-68.0, -65.7), (-73.7, -60.8), (-79.2, -78.0), (-83.2, -58.2),
            (-80.3, -28.5), (-78.1, -35.3), (-70.9, -6.9), (-65.8, 54.5), (-72.3, 69.9),
            (-66.2, 88.0), (-65.3, 135.1), (-71.7, 171.2), (-80.9, 159.8), (-84.7, 180.0),
            (-90.0, 180.0), (-90.0, -180.0), (-84.1, -179.1), (-85.0, -143.1), (-76.9, -158.4),
            (-73.9, -74.9), (-64.2, -58.6),
        ],
    ),
];

/// A named place events can originate from
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub country: &'static str,
    pub lat: f64,
    pub lng: f64,
}

const fn city(name: &'static str, country: &'static str, lat: f64, lng: f64) -> City {
    City { name, country, lat, lng }
}

pub const CITIES: &[City] = &[
    // North America
    city("New York", "US", 40.7, -74.0),
    city("Los Angeles", "US", 34.1, -118.2),
    city("Chicago", "US", 41.9, -87.6),
    city("Houston", "US", 29.8, -95.4),
    city("Phoenix", "US", 33.4, -112.1),
    city("San Francisco", "US", 37.8, -122.4),
    city("Seattle", "US", 47.6, -122.3),
    city("Toronto", "CA", 43.7, -79.4),
    city("Montreal", "CA", 45.5, -73.6),
    city("Mexico City", "MX", 19.4, -99.1),
    // South America
    city("Sao Paulo", "BR", -23.5, -46.6),
    city("Rio de Janeiro", "BR", -22.9, -43.2),
    city("Buenos Aires", "AR", -34.6, -58.4),
    city("Santiago", "CL", -33.4, -70.6),
    city("Lima", "PE", -12.0, -77.0),
    city("Bogota", "CO", 4.7, -74.1),
    // Europe
    city("London", "GB", 51.5, -0.1),
    city("Paris", "FR", 48.9, 2.3),
    city("Berlin", "DE", 52.5, 13.4),
    city("Rome", "IT", 41.9, 12.5),
    city("Madrid", "ES", 40.4, -3.7),
    city("Amsterdam", "NL", 52.4, 4.9),
    city("Oslo", "NO", 59.9, 10.8),
    city("Stockholm", "SE", 59.3, 18.1),
    city("Moscow", "RU", 55.8, 37.6),
    city("Prague", "CZ", 50.1, 14.4),
    city("Vienna", "AT", 48.2, 16.4),
    city("Istanbul", "TR", 41.0, 29.0),
    // Africa
    city("Cairo", "EG", 30.0, 31.2),
    city("Cape Town", "ZA", -33.9, 18.4),
    city("Nairobi", "KE", -1.3, 36.8),
    city("Lagos", "NG", 6.5, 3.4),
    city("Casablanca", "MA", 33.6, -7.6),
    city("Johannesburg", "ZA", -26.2, 28.0),
    // Asia
    city("Tokyo", "JP", 35.7, 139.7),
    city("Shanghai", "CN", 31.2, 121.5),
    city("Beijing", "CN", 39.9, 116.4),
    city("Hong Kong", "HK", 22.3, 114.2),
    city("Singapore", "SG", 1.4, 103.8),
    city("Seoul", "KR", 37.6, 127.0),
    city("Bangkok", "TH", 13.8, 100.5),
    city("Delhi", "IN", 28.6, 77.2),
    city("Mumbai", "IN", 19.1, 72.9),
    city("Taipei", "TW", 25.0, 121.5),
    city("Manila", "PH", 14.6, 121.0),
    city("Jakarta", "ID", -6.2, 106.8),
    city("Dubai", "AE", 25.3, 55.3),
    city("Tel Aviv", "IL", 32.1, 34.8),
    // Oceania
    city("Sydney", "AU", -33.9, 151.2),
    city("Melbourne", "AU", -37.8, 145.0),
    city("Auckland", "NZ", -36.8, 174.8),
    city("Brisbane", "AU", -27.5, 153.0),
];

impl City {
    pub fn geo(&self) -> crate::event::GeoLocation {
        crate::event::GeoLocation {
            lat: self.lat,
            lng: self.lng,
            city: self.name.to_string(),
            country: self.country.to_string(),
        }
    }
}

/// Points along a coastline ring, `steps` per segment, wrapping longitude the short way
pub fn trace_ring(ring: &[(f32, f32)], steps: usize) -> impl Iterator<Item = (f64, f64)> + '_ {
    let steps = steps.max(1);
    ring.windows(2).flat_map(move |pair| {
        let (lat1, lng1) = pair[0];
        let (lat2, lng2) = pair[1];
        let dlng = crate::geo::shortest_angular_delta(lng1.to_radians(), lng2.to_radians()).to_degrees();
        (0..steps).map(move |t| {
            let f = t as f32 / steps as f32;
            let mut lng = lng1 + dlng * f;
            if lng > 180.0 {
                lng -= 360.0;
            } else if lng < -180.0 {
                lng += 360.0;
            }
            ((lat1 + (lat2 - lat1) * f) as f64, lng as f64)
        })
    })
}
