use tracing::Level;
use tracing_subscriber::EnvFilter;

/// Install the global fmt subscriber.
///
/// `RUST_LOG` directives apply on top of an INFO default. Calling this twice
/// is harmless; the second call leaves the first subscriber in place.
pub fn init_logging() {
    let installed = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with_writer(std::io::stderr)
        .try_init();

    if installed.is_ok() {
        tracing::debug!("Logging initialized");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_twice_is_harmless() {
        init_logging();
        init_logging();
    }
}
