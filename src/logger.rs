//! The logger handle injected into the instrumentation layers.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, Level};

use crate::config::SinkConfig;
use crate::core::Error;
use crate::middleware::{ErrorLayer, LifecycleLayer};
use crate::record::Entry;
use crate::sink::{ConsoleSink, FanoutSink, LogstashSink, Sink};

/// Cheap, cloneable handle over a shared [`Sink`].
///
/// Build one at startup and hand it to [`layer`](Logger::layer) and
/// [`error_layer`](Logger::error_layer). There is no global logger.
#[derive(Clone)]
pub struct Logger {
    sink: Arc<dyn Sink>,
}

impl Logger {
    pub fn new(sink: impl Sink + 'static) -> Self {
        Self {
            sink: Arc::new(sink),
        }
    }

    pub fn from_shared(sink: Arc<dyn Sink>) -> Self {
        Self { sink }
    }

    /// Console and/or logstash sinks as configured.
    ///
    /// The logstash writer runs on the current Tokio runtime, so this fails
    /// with [`Error::NoRuntime`] outside of one when logstash is enabled.
    pub fn from_config(config: &SinkConfig) -> Result<Self, Error> {
        let mut fanout = FanoutSink::new();

        if config.console {
            let fields = config
                .logstash
                .as_ref()
                .map(|l| l.fields.clone())
                .unwrap_or_default();
            fanout.push(ConsoleSink::stdout().with_fields(fields));
        }
        if let Some(ref logstash) = config.logstash {
            fanout.push(LogstashSink::spawn(logstash)?);
            debug!(address = %logstash.address(), "logstash sink started");
        }

        Ok(Self::new(fanout))
    }

    /// Hand an entry to the sink. Plain strings become `{"message": ...}`.
    pub fn log(&self, level: Level, entry: impl Into<Entry>) {
        self.sink.log(level, &entry.into());
    }

    /// Normal instrumentation layer.
    pub fn layer(&self) -> LifecycleLayer {
        LifecycleLayer::new(self.clone())
    }

    /// Error hook layer.
    pub fn error_layer(&self) -> ErrorLayer {
        ErrorLayer::new(self.clone())
    }
}

impl fmt::Debug for Logger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Logger").finish_non_exhaustive()
    }
}
