//! Logging setup for the binary.

use tracing_subscriber::EnvFilter;

/// Directives used when `RUST_LOG` is unset or invalid
pub const DEFAULT_DIRECTIVES: &str = "userdesk=info,userdesk_api=info,userdesk_core=info";

/// Install the JSON subscriber
///
/// `RUST_LOG` overrides [`DEFAULT_DIRECTIVES`]. Calling this twice is
/// harmless; the second call leaves the first subscriber in place.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVES));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .json()
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_tracing();
        init_tracing();
    }
}
