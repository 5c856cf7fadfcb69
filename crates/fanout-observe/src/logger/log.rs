//! Subscriber assembly: one `EnvFilter` over one output layer on stderr.
use std::io;

use time::{UtcOffset, format_description::well_known::Rfc3339};
use tracing::Subscriber;
use tracing_subscriber::{
    EnvFilter, Layer, Registry, fmt, fmt::time::OffsetTime, layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::logger::{config::LoggerConfig, error::LoggerError, format::LoggerFormat};

type OutputLayer = Box<dyn Layer<Registry> + Send + Sync>;

/// Build the subscriber for `cfg` without installing it.
pub(crate) fn build(
    cfg: &LoggerConfig,
) -> Result<impl Subscriber + Send + Sync + 'static, LoggerError> {
    let filter = EnvFilter::try_new(&cfg.filter).map_err(|e| LoggerError::BadFilter {
        directive: cfg.filter.clone(),
        reason: e.to_string(),
    })?;
    Ok(tracing_subscriber::registry()
        .with(output_layer(cfg)?)
        .with(filter))
}

/// Install the subscriber for `cfg` as the process-wide default.
pub(crate) fn install(cfg: &LoggerConfig) -> Result<(), LoggerError> {
    if tracing::dispatcher::has_been_set() {
        return Err(LoggerError::AlreadyInstalled);
    }
    build(cfg)?
        .try_init()
        .map_err(|e| LoggerError::Install(e.to_string()))
}

fn output_layer(cfg: &LoggerConfig) -> Result<OutputLayer, LoggerError> {
    let layer: OutputLayer = match cfg.format {
        LoggerFormat::Text => fmt::layer()
            .with_writer(io::stderr)
            .with_ansi(cfg.ansi)
            .with_target(cfg.targets)
            .with_timer(local_timer())
            .boxed(),
        LoggerFormat::Json => fmt::layer()
            .json()
            .with_writer(io::stderr)
            .with_ansi(false)
            .with_target(cfg.targets)
            .with_timer(local_timer())
            .boxed(),
        LoggerFormat::Journald => journald_layer()?,
    };
    Ok(layer)
}

// The local offset is only readable while the process is single-threaded.
fn local_timer() -> OffsetTime<Rfc3339> {
    let offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);
    OffsetTime::new(offset, Rfc3339)
}

#[cfg(all(target_os = "linux", feature = "journald"))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    let layer = tracing_journald::layer()
        .map_err(|e| LoggerError::Install(format!("journald: {e}")))?
        .with_syslog_identifier("fanout".to_string());
    Ok(layer.boxed())
}

#[cfg(not(all(target_os = "linux", feature = "journald")))]
fn journald_layer() -> Result<OutputLayer, LoggerError> {
    Err(LoggerError::JournaldUnavailable)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_filter_names_the_directive() {
        let cfg = LoggerConfig::default().with_filter("fanout=notalevel");
        let err = build(&cfg).err().unwrap();
        assert!(matches!(
            err,
            LoggerError::BadFilter { ref directive, .. } if directive == "fanout=notalevel"
        ));
    }

    #[test]
    fn text_and_json_subscribers_accept_events() {
        for format in [LoggerFormat::Text, LoggerFormat::Json] {
            let cfg = LoggerConfig::default()
                .with_filter("warn,fanout_exec=debug")
                .with_format(format);
            let subscriber = build(&cfg).unwrap();
            tracing::subscriber::with_default(subscriber, || {
                tracing::warn!(target: "fanout.test", format = %format, "logger smoke");
                assert!(tracing::enabled!(target: "fanout_exec", tracing::Level::DEBUG));
                assert!(!tracing::enabled!(target: "other", tracing::Level::INFO));
            });
        }
    }

    #[cfg(not(feature = "journald"))]
    #[test]
    fn journald_needs_the_feature() {
        let cfg = LoggerConfig::default().with_format(LoggerFormat::Journald);
        assert!(matches!(build(&cfg).err(), Some(LoggerError::JournaldUnavailable)));
    }
}
