//! One-shot completion signals.

use std::fmt;
use std::sync::Arc;

use tracing::{debug, Level};

use crate::core::CorrelationContext;
use crate::record::Message;

/// Which stream a signal observes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Channel {
    Request,
    Response,
}

impl Channel {
    /// Message of the record emitted when this channel finishes.
    pub fn terminal_message(self) -> &'static str {
        match self {
            Channel::Request => "request finished",
            Channel::Response => "response finished",
        }
    }
}

/// Fires the terminal record of one channel at most once.
///
/// Firing consumes the signal. A signal dropped without firing is a
/// cancellation and emits nothing. Disarmed signals, handed out when the
/// context already existed, never emit.
pub struct CompletionSignal {
    context: Option<Arc<CorrelationContext>>,
    channel: Channel,
}

impl CompletionSignal {
    pub(crate) fn armed(context: Arc<CorrelationContext>, channel: Channel) -> Self {
        Self {
            context: Some(context),
            channel,
        }
    }

    pub(crate) fn disarmed(channel: Channel) -> Self {
        Self {
            context: None,
            channel,
        }
    }

    pub fn is_armed(&self) -> bool {
        self.context.is_some()
    }

    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub(crate) fn context(&self) -> Option<&Arc<CorrelationContext>> {
        self.context.as_ref()
    }

    /// Count response body bytes handed to the transport.
    pub(crate) fn record_sent(&self, bytes: u64) {
        if let (Some(ctx), Channel::Response) = (&self.context, self.channel) {
            ctx.response().add_sent(bytes);
        }
    }

    /// Emit the channel's records.
    ///
    /// An error yields an ERROR record carrying it, then the terminal record.
    /// A response that finished cleanly is marked complete first so the
    /// terminal record carries status, length and response time.
    pub fn fire(mut self, result: Result<(), Message>) {
        let Some(ctx) = self.context.take() else {
            return;
        };

        match result {
            Ok(()) => {
                if self.channel == Channel::Response {
                    ctx.response().mark_complete(ctx.elapsed_ms());
                }
            }
            Err(message) => ctx.log_at(Level::ERROR, message),
        }
        ctx.log(self.channel.terminal_message());
    }

    /// Drop the signal without emitting anything.
    pub fn cancel(mut self) {
        if let Some(ctx) = self.context.take() {
            debug!(
                correlation_id = %ctx.id(),
                channel = ?self.channel,
                "completion signal cancelled"
            );
        }
    }
}

impl Drop for CompletionSignal {
    fn drop(&mut self) {
        if let Some(ctx) = self.context.take() {
            debug!(
                correlation_id = %ctx.id(),
                channel = ?self.channel,
                "completion signal dropped"
            );
        }
    }
}

impl fmt::Debug for CompletionSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompletionSignal")
            .field("channel", &self.channel)
            .field("armed", &self.is_armed())
            .finish()
    }
}
