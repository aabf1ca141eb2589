use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use switchboard_core::model::GroupMessage;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::SendTimeoutError;

static NEXT_SINK_ID: AtomicU64 = AtomicU64::new(1);

/// Handle a fanout uses to tell its subscribers apart.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub struct SinkId(u64);

impl SinkId {
    fn next() -> Self {
        Self(NEXT_SINK_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sink-{}", self.0)
    }
}

/// Delivery end of a subscriber's outbound path.
///
/// Cloning a sink keeps its id, so re-subscribing a clone is the same
/// subscription.
#[derive(Debug, Clone)]
pub struct Sink {
    id: SinkId,
    tx: mpsc::Sender<GroupMessage>,
}

pub(crate) enum Delivery {
    Accepted,
    TimedOut,
    Gone,
}

impl Sink {
    /// Bounded outbound path. A capacity of zero is raised to one.
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<GroupMessage>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let sink = Self {
            id: SinkId::next(),
            tx,
        };
        (sink, rx)
    }

    pub fn id(&self) -> SinkId {
        self.id
    }

    pub(crate) async fn deliver(
        &self,
        message: GroupMessage,
        wait: Option<Duration>,
    ) -> Delivery {
        match wait {
            None => match self.tx.send(message).await {
                Ok(()) => Delivery::Accepted,
                Err(_) => Delivery::Gone,
            },
            Some(limit) => match self.tx.send_timeout(message, limit).await {
                Ok(()) => Delivery::Accepted,
                Err(SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
                Err(SendTimeoutError::Closed(_)) => Delivery::Gone,
            },
        }
    }
}
