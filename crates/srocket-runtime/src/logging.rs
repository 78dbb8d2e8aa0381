//! Logging setup for SRocket servers.
//!
//! Every crate logs through `tracing`; this module installs the subscriber.
//! The router wraps each inbound event in a `dispatch` span carrying
//! `event`, `namespace` and `socket_id`, so span events turn into one
//! opening and one closing line per event, the latter with its busy and
//! idle time:
//!
//! ```text
//! INFO dispatch{event=register namespace=/ socket_id=3f2c..}: new
//! INFO dispatch{event=register namespace=/ socket_id=3f2c..}: close time.busy=180µs time.idle=42µs
//! ```
//!
//! Servers normally call [`init_from_config`] with the loaded
//! [`LoggingConfig`]. While debugging a handler, the presets are quicker:
//!
//! ```rust,ignore
//! use srocket_runtime::logging::LoggingBuilder;
//!
//! // Middleware decisions and per-event timing.
//! LoggingBuilder::dispatch_trace().init();
//!
//! // Additionally every frame, ping and room change on the wire.
//! LoggingBuilder::wire_trace().init();
//! ```

use std::ffi::OsStr;
use std::path::{Path, PathBuf};

use tracing_subscriber::filter::Directive;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::fmt::writer::BoxMakeWriter;
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

use crate::config::{LogFormat, LogOutput, LoggingConfig, SpanEventConfig};

/// Which span transitions are logged.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SpanEvents {
    pub new: bool,
    pub enter: bool,
    pub exit: bool,
    pub close: bool,
}

impl SpanEvents {
    pub const NONE: Self = Self {
        new: false,
        enter: false,
        exit: false,
        close: false,
    };

    /// One line when a dispatch starts and one with its timing when it ends.
    pub const LIFECYCLE: Self = Self {
        new: true,
        enter: false,
        exit: false,
        close: true,
    };

    /// Also logs every poll of a dispatch, which shows where a handler
    /// suspends.
    pub const FULL: Self = Self {
        new: true,
        enter: true,
        exit: true,
        close: true,
    };
}

impl From<SpanEvents> for FmtSpan {
    fn from(events: SpanEvents) -> Self {
        [
            (events.new, FmtSpan::NEW),
            (events.enter, FmtSpan::ENTER),
            (events.exit, FmtSpan::EXIT),
            (events.close, FmtSpan::CLOSE),
        ]
        .into_iter()
        .filter(|(on, _)| *on)
        .fold(FmtSpan::NONE, |acc, (_, span)| acc | span)
    }
}

impl From<&SpanEventConfig> for SpanEvents {
    fn from(config: &SpanEventConfig) -> Self {
        Self {
            new: config.new,
            enter: config.enter,
            exit: config.exit,
            close: config.close,
        }
    }
}

/// Installs the subscriber described by `config`.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_from_config(config: &LoggingConfig) {
    let _ = LoggingBuilder::from_config(config).try_init();
}

/// Subscriber settings, filled from a [`LoggingConfig`] or a preset.
#[derive(Debug)]
pub struct LoggingBuilder {
    level: tracing::Level,
    directives: Vec<String>,
    span_events: SpanEvents,
    format: LogFormat,
    output: LogOutput,
    file_path: Option<PathBuf>,
    thread_ids: bool,
    source_location: bool,
}

impl Default for LoggingBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl LoggingBuilder {
    /// Compact `info` lines on stdout.
    pub fn new() -> Self {
        Self {
            level: tracing::Level::INFO,
            directives: Vec::new(),
            span_events: SpanEvents::NONE,
            format: LogFormat::Compact,
            output: LogOutput::Stdout,
            file_path: None,
            thread_ids: false,
            source_location: false,
        }
    }

    /// Router and middleware at `debug`, with a line at the start and end
    /// of every dispatch.
    pub fn dispatch_trace() -> Self {
        Self::new()
            .directive("srocket_framework=debug")
            .span_events(SpanEvents::LIFECYCLE)
    }

    /// [`dispatch_trace`](Self::dispatch_trace) plus the transport at
    /// `trace`: connections, frames, pings and room changes.
    pub fn wire_trace() -> Self {
        Self::dispatch_trace().directive("srocket_transport=trace")
    }

    pub fn from_config(config: &LoggingConfig) -> Self {
        // Sorted so the filter does not depend on map order.
        let mut filters: Vec<_> = config.filters.iter().collect();
        filters.sort_by(|a, b| a.0.cmp(b.0));

        Self {
            level: config.level.to_tracing_level(),
            directives: filters
                .into_iter()
                .map(|(module, level)| format!("{}={}", module, level.as_str()))
                .collect(),
            span_events: SpanEvents::from(&config.span_events),
            format: config.format,
            output: config.output,
            file_path: config.file_path.clone(),
            thread_ids: config.thread_ids,
            source_location: config.file_location,
        }
    }

    /// Base level for targets without a directive.
    pub fn with_level(mut self, level: tracing::Level) -> Self {
        self.level = level;
        self
    }

    /// Adds a filter directive, e.g. `srocket_transport=trace`.
    pub fn directive(mut self, directive: &str) -> Self {
        self.directives.push(directive.to_string());
        self
    }

    pub fn span_events(mut self, events: SpanEvents) -> Self {
        self.span_events = events;
        self
    }

    pub fn format(mut self, format: LogFormat) -> Self {
        self.format = format;
        self
    }

    /// Writes to `path`, never rotated.
    pub fn output_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.output = LogOutput::File;
        self.file_path = Some(path.into());
        self
    }

    pub fn output_stderr(mut self) -> Self {
        self.output = LogOutput::Stderr;
        self
    }

    pub fn with_thread_ids(mut self, enabled: bool) -> Self {
        self.thread_ids = enabled;
        self
    }

    /// Includes the source file and line of each event.
    pub fn with_source_location(mut self, enabled: bool) -> Self {
        self.source_location = enabled;
        self
    }

    pub fn directives(&self) -> &[String] {
        &self.directives
    }

    pub fn span_event_config(&self) -> SpanEvents {
        self.span_events
    }

    /// `RUST_LOG` replaces the base level when set. Unparsable directives
    /// are skipped.
    fn build_filter(&self) -> EnvFilter {
        let base = self.level.to_string().to_lowercase();
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(base));

        self.directives
            .iter()
            .filter_map(|directive| directive.parse::<Directive>().ok())
            .fold(filter, EnvFilter::add_directive)
    }

    /// File output without a path falls back to stdout.
    fn writer(&self) -> BoxMakeWriter {
        match (self.output, &self.file_path) {
            (LogOutput::Stderr, _) => BoxMakeWriter::new(std::io::stderr),
            (LogOutput::File, Some(path)) => BoxMakeWriter::new(tracing_appender::rolling::never(
                path.parent().unwrap_or_else(|| Path::new(".")),
                path.file_name().unwrap_or_else(|| OsStr::new("srocket.log")),
            )),
            _ => BoxMakeWriter::new(std::io::stdout),
        }
    }

    fn fmt_layer<S>(&self) -> Box<dyn Layer<S> + Send + Sync + 'static>
    where
        S: tracing::Subscriber + for<'a> LookupSpan<'a>,
    {
        let layer = fmt::layer()
            .with_writer(self.writer())
            .with_span_events(self.span_events.into())
            .with_thread_ids(self.thread_ids)
            .with_file(self.source_location)
            .with_line_number(self.source_location);

        match self.format {
            #[cfg(feature = "json-log")]
            LogFormat::Json => layer.json().boxed(),
            LogFormat::Full => layer.boxed(),
            LogFormat::Pretty => layer.pretty().boxed(),
            // Json lands here without the `json-log` feature.
            _ => layer.compact().boxed(),
        }
    }

    /// Installs the subscriber, ignoring an already installed one.
    pub fn init(self) {
        let _ = self.try_init();
    }

    pub fn try_init(self) -> Result<(), TryInitError> {
        tracing_subscriber::registry()
            .with(self.fmt_layer::<Registry>())
            .with(self.build_filter())
            .try_init()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LogLevel;

    #[test]
    fn test_span_events_from_config() {
        let config = SpanEventConfig {
            new: true,
            close: true,
            ..Default::default()
        };
        assert_eq!(SpanEvents::from(&config), SpanEvents::LIFECYCLE);
        assert_eq!(SpanEvents::default(), SpanEvents::NONE);
    }

    #[test]
    fn test_span_events_map_to_fmt_span() {
        assert_eq!(FmtSpan::from(SpanEvents::NONE), FmtSpan::NONE);
        assert_eq!(
            FmtSpan::from(SpanEvents::LIFECYCLE),
            FmtSpan::NEW | FmtSpan::CLOSE
        );
        assert_eq!(FmtSpan::from(SpanEvents::FULL), FmtSpan::FULL);
    }

    #[test]
    fn test_presets_focus_on_dispatch() {
        let dispatch = LoggingBuilder::dispatch_trace();
        assert_eq!(dispatch.directives(), ["srocket_framework=debug"]);
        assert_eq!(dispatch.span_event_config(), SpanEvents::LIFECYCLE);

        let wire = LoggingBuilder::wire_trace();
        assert_eq!(
            wire.directives(),
            ["srocket_framework=debug", "srocket_transport=trace"]
        );
        assert_eq!(wire.span_event_config(), SpanEvents::LIFECYCLE);
    }

    #[test]
    fn test_from_config_collects_filters_in_order() {
        let mut config = LoggingConfig {
            level: LogLevel::Warn,
            file_location: true,
            ..Default::default()
        };
        config
            .filters
            .insert("srocket_transport".into(), LogLevel::Trace);
        config
            .filters
            .insert("srocket_framework".into(), LogLevel::Debug);

        let builder = LoggingBuilder::from_config(&config);
        assert_eq!(builder.level, tracing::Level::WARN);
        assert!(builder.source_location);
        assert_eq!(
            builder.directives(),
            ["srocket_framework=debug", "srocket_transport=trace"]
        );
    }

    #[test]
    fn test_output_file_switches_output() {
        let builder = LoggingBuilder::new().output_file("logs/server.log");
        assert_eq!(builder.output, LogOutput::File);
        assert_eq!(builder.file_path.as_deref(), Some(Path::new("logs/server.log")));
    }
}
