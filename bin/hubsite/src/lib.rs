//! Library half of the `hubsite` binary.
//!
//! `cmd` holds one module per subcommand; `server` is the development HTTP
//! server that `hubsite serve` runs on top of the generator, pushing reload
//! events to open browser tabs after every rebuild.
//!
//! ```no_run
//! use std::path::Path;
//!
//! use hubsite::cmd::{self, build::Target};
//!
//! cmd::build::run(Path::new("demo"), Path::new("hubsite.toml"), Target::Pages).unwrap();
//! ```

pub mod cmd;
pub mod server;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

/// Default log level for a `-v` count: warnings by default, `-vvv` for
/// everything.
pub fn verbosity_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        2 => LevelFilter::DEBUG,
        _ => LevelFilter::TRACE,
    }
}

/// Install the global subscriber. `RUST_LOG` directives are layered over the
/// level chosen by `-v`.
pub fn init_tracing(verbose: u8) {
    let filter = EnvFilter::builder()
        .with_default_directive(verbosity_level(verbose).into())
        .from_env_lossy();

    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(verbose >= 2))
        .with(filter)
        .init();
}
