//! Logging setup
//!
//! Everything in the crate logs through the `log` facade; binaries pick the
//! sink by calling [`init`] or [`init_with_level`] once at startup.

pub use log::{debug, error, info, trace, warn};

use log::LevelFilter;

/// Initialize `env_logger` at `info`, unless `RUST_LOG` says otherwise
pub fn init() {
    init_with_level(LevelFilter::Info);
}

/// Initialize `env_logger` with a fallback level
///
/// `RUST_LOG` still wins when it is set. Calling this more than once is
/// harmless; later calls are ignored.
pub fn init_with_level(level: LevelFilter) {
    let mut builder = env_logger::Builder::new();
    builder.filter_level(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    // try_init fails only if a logger is already installed
    let _ = builder.try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_with_level(LevelFilter::Debug);
        init();
        info!("logger installed");
    }
}
