//! Structured logging setup shared by the `balancer`, `storage`, and
//! `testcli` binaries.
//!
//! A trimmed version of the teacher workspace's own `tracing` crate: an
//! `EnvFilter` (so `RUST_LOG` always wins) plus a single compact `fmt`
//! layer writing to stderr. The OTLP exporter and the indicatif progress
//! layer the teacher's builder also offers have no counterpart here — this
//! system logs structured events (`pkg/logger/slog.go`'s `slog.Logger`),
//! it doesn't render terminal progress bars or export spans.

use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(transparent)]
    Init(#[from] tracing_subscriber::util::TryInitError),
}

/// Builds the process-wide subscriber. `level` is the default directive;
/// `RUST_LOG`, if set, takes priority over it field-by-field.
pub struct TracingBuilder {
    level: Level,
}

impl Default for TracingBuilder {
    fn default() -> Self {
        Self { level: Level::INFO }
    }
}

impl TracingBuilder {
    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    /// Installs the subscriber as the global default. Call once per binary,
    /// as early as possible in `main`.
    pub fn build(self) -> Result<(), Error> {
        let subscriber = tracing_subscriber::registry()
            .with(
                EnvFilter::builder()
                    .with_default_directive(self.level.into())
                    .from_env()
                    .expect("invalid RUST_LOG"),
            )
            .with(tracing_subscriber::fmt::Layer::new().compact());

        subscriber.try_init()?;
        Ok(())
    }
}
