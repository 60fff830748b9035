//! Structured logging.
//!
//! # Responsibilities
//! - Initialize the tracing subscriber for the binary
//! - Provide the `Logger` port the relay core logs through
//!
//! # Design Decisions
//! - Uses tracing crate for structured logging
//! - The core never logs directly; it receives a `Logger` and defaults to `NullLogger`
//! - Log level configurable via config and `RUST_LOG`

use std::fmt;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Leveled logging capability handed to sessions and pipes.
///
/// All methods default to doing nothing, so an implementation only needs
/// to override the levels it cares about.
pub trait Logger: Send + Sync {
    fn trace(&self, _args: fmt::Arguments<'_>) {}
    fn debug(&self, _args: fmt::Arguments<'_>) {}
    fn info(&self, _args: fmt::Arguments<'_>) {}
    fn warn(&self, _args: fmt::Arguments<'_>) {}
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {}

/// Forwards every level to the matching `tracing` macro.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn trace(&self, args: fmt::Arguments<'_>) {
        tracing::trace!("{}", args);
    }

    fn debug(&self, args: fmt::Arguments<'_>) {
        tracing::debug!("{}", args);
    }

    fn info(&self, args: fmt::Arguments<'_>) {
        tracing::info!("{}", args);
    }

    fn warn(&self, args: fmt::Arguments<'_>) {
        tracing::warn!("{}", args);
    }
}

/// Install the global subscriber.
///
/// `RUST_LOG` takes precedence over `default_filter`.
pub fn init_logging(default_filter: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter));

    // A second init (tests, embedding) is harmless; keep the first subscriber.
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl Logger for Recorder {
        fn warn(&self, args: fmt::Arguments<'_>) {
            self.0.lock().unwrap().push(args.to_string());
        }
    }

    #[test]
    fn default_methods_are_noops() {
        let log = Recorder::default();
        log.info(format_args!("ignored"));
        log.warn(format_args!("kept {}", 1));
        assert_eq!(*log.0.lock().unwrap(), vec!["kept 1".to_string()]);
    }

    #[test]
    fn null_logger_accepts_everything() {
        let log: &dyn Logger = &NullLogger;
        log.trace(format_args!("a"));
        log.debug(format_args!("b"));
        log.info(format_args!("c"));
        log.warn(format_args!("d"));
    }
}
