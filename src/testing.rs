use std::sync::Once;

use tracing::debug;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static TEST_SETUP: Once = Once::new();

/// Installs a test-captured subscriber once per test binary. `RUST_LOG` overrides
/// the default `debug` filter.
pub(crate) fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        let env_filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let subscriber = tracing_subscriber::registry().with(
            fmt::layer()
                .with_test_writer()
                .with_target(true)
                .with_filter(env_filter),
        );

        if tracing::dispatcher::has_been_set() {
            debug!("tracing subscriber already set");
        } else if let Err(error) = subscriber.try_init() {
            eprintln!("failed to set up test logging: {error}");
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn init_test_setup_is_idempotent() {
        init_test_setup();
        init_test_setup();
    }
}
