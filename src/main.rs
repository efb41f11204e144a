use clap::{Parser, Subcommand};
use globewatch::config::{GlobeConfig, GlobeOverrides, ServeConfig, ServeOverrides};
use globewatch::poller::{HttpLogSource, LogSource};
use globewatch::settings::Settings;
use globewatch::stats::Stats;
use globewatch::telemetry::{self, LogTarget};
use globewatch::{globe, server};
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "globewatch")]
#[command(version)]
#[command(about = "Live request activity on a terminal globe", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the activity log HTTP server
    Serve {
        /// Address to listen on
        #[arg(short, long)]
        bind: Option<String>,

        /// Number of events kept in memory
        #[arg(short, long)]
        capacity: Option<usize>,

        /// GeoLite2-City database for drafts posted with only an IP
        #[arg(long)]
        geoip_db: Option<PathBuf>,

        /// Generate synthetic traffic
        #[arg(long)]
        demo: bool,

        /// Milliseconds between synthetic events
        #[arg(long)]
        demo_interval_ms: Option<u64>,

        /// Emit JSON log lines
        #[arg(long)]
        log_json: bool,
    },

    /// Watch the activity log on a rotating globe
    Globe {
        /// Activity log endpoint
        #[arg(short, long)]
        url: Option<String>,

        /// Poll interval in milliseconds
        #[arg(long)]
        poll_ms: Option<u64>,

        /// Request timeout in milliseconds
        #[arg(long)]
        timeout_ms: Option<u64>,

        /// Equirectangular surface image
        #[arg(long)]
        texture: Option<PathBuf>,

        /// Seconds per frame
        #[arg(short, long)]
        time: Option<f32>,

        /// Random seed for the starfield
        #[arg(short, long)]
        seed: Option<u64>,
    },

    /// Fetch the activity log once and print summary stats
    Stats {
        /// Activity log endpoint
        #[arg(short, long)]
        url: Option<String>,
    },
}

fn main() -> io::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, capacity, geoip_db, demo, demo_interval_ms, log_json } => {
            telemetry::init(LogTarget::Stderr { json: log_json });
            let settings = Settings::load();
            let config = ServeConfig::resolve(
                &settings.server,
                ServeOverrides { bind, capacity, geoip_db, demo, demo_interval_ms, log_json },
            );
            tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()?
                .block_on(server::serve(config))?;
        }
        Commands::Globe { url, poll_ms, timeout_ms, texture, time, seed } => {
            telemetry::init(LogTarget::File(telemetry::viewer_log_path()));
            let settings = Settings::load();
            let config = GlobeConfig::resolve(
                &settings.globe,
                GlobeOverrides { url, poll_ms, timeout_ms, texture, time, seed },
            );
            globe::run(config)?;
        }
        Commands::Stats { url } => {
            telemetry::init(LogTarget::Stderr { json: false });
            let settings = Settings::load();
            let config = GlobeConfig::resolve(&settings.globe, GlobeOverrides { url, ..Default::default() });
            let mut source = HttpLogSource::new(config.url, server::MAX_LIMIT, config.request_timeout);
            let events = source
                .fetch()
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            for line in Stats::from_events(&events).lines() {
                println!("{line}");
            }
        }
    }

    Ok(())
}
