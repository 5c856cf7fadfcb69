use crate::logger::format::LoggerFormat;

/// Diagnostic logging setup.
///
/// Diagnostics are written to stderr; stdout carries remote output only.
#[derive(Debug, Clone)]
pub struct LoggerConfig {
    pub format: LoggerFormat,
    /// `EnvFilter` directive, e.g. `warn` or `warn,fanout_exec=debug`.
    pub filter: String,
    /// Print the event target (`fanout.exec.sched`, ...).
    pub targets: bool,
    /// ANSI colors in text output.
    pub ansi: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            format: LoggerFormat::Text,
            filter: "warn".to_string(),
            targets: true,
            ansi: atty::is(atty::Stream::Stderr),
        }
    }
}

impl LoggerConfig {
    pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
        self.filter = filter.into();
        self
    }

    pub fn with_format(mut self, format: LoggerFormat) -> Self {
        self.format = format;
        self
    }
}
