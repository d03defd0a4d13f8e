//! Logstash TCP sink.
//!
//! Records are encoded on the caller's thread and queued; a background task
//! owns the connection and writes one JSON line per record. A full queue or
//! a dead connection drops lines. Nothing is retried.

use std::sync::Arc;
use std::time::Duration;

use serde_json::{Map, Value};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::time::Instant;
use tracing::{debug, warn, Level};

use super::{encode, Sink};
use crate::config::LogstashConfig;
use crate::core::Error;
use crate::record::Entry;

/// Wait between connection attempts.
const RECONNECT_COOLDOWN: Duration = Duration::from_secs(1);

/// Ships JSON lines to a logstash `tcp` input with the `json_lines` codec.
pub struct LogstashSink {
    sender: mpsc::Sender<String>,
    fields: Arc<Map<String, Value>>,
}

impl LogstashSink {
    /// Start the writer task on the current Tokio runtime.
    pub fn spawn(config: &LogstashConfig) -> Result<Self, Error> {
        let handle = Handle::try_current().map_err(|_| Error::NoRuntime)?;
        let (tx, rx) = mpsc::channel(config.queue_capacity.max(1));
        handle.spawn(write_loop(config.address(), rx));

        Ok(Self {
            sender: tx,
            fields: Arc::new(config.fields.clone()),
        })
    }
}

impl Sink for LogstashSink {
    fn log(&self, level: Level, entry: &Entry) {
        let line = encode(level, entry, &self.fields);
        match self.sender.try_send(line) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => debug!("logstash queue full, record dropped"),
            Err(TrySendError::Closed(_)) => debug!("logstash writer stopped, record dropped"),
        }
    }
}

async fn write_loop(address: String, mut rx: mpsc::Receiver<String>) {
    let mut stream: Option<TcpStream> = None;
    let mut retry_at: Option<Instant> = None;

    while let Some(mut line) = rx.recv().await {
        if stream.is_none() {
            if retry_at.is_some_and(|at| Instant::now() < at) {
                debug!(address = %address, "logstash unavailable, record dropped");
                continue;
            }
            match TcpStream::connect(&address).await {
                Ok(s) => {
                    let _ = s.set_nodelay(true);
                    debug!(address = %address, "logstash connected");
                    stream = Some(s);
                    retry_at = None;
                }
                Err(e) => {
                    warn!(address = %address, error = %e, "logstash connect failed");
                    retry_at = Some(Instant::now() + RECONNECT_COOLDOWN);
                    continue;
                }
            }
        }

        line.push('\n');
        if let Some(s) = stream.as_mut() {
            if let Err(e) = s.write_all(line.as_bytes()).await {
                warn!(address = %address, error = %e, "logstash write failed");
                stream = None;
                retry_at = Some(Instant::now() + RECONNECT_COOLDOWN);
            }
        }
    }
}
