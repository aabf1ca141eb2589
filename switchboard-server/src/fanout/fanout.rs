use crate::config::FanoutConfig;
use crate::fanout::fanout_command::FanoutCommand;
use crate::fanout::sink::Delivery;
use crate::fanout::{Sink, SinkId};
use std::collections::HashMap;
use std::time::Duration;
use switchboard_core::model::{GroupKey, GroupMessage};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

/// Handle to one group's broadcast actor.
///
/// All clones talk to the same actor. The actor stops once the last handle
/// is dropped.
#[derive(Clone)]
pub struct Fanout {
    command_tx: mpsc::Sender<FanoutCommand>,
}

impl Fanout {
    pub fn spawn(config: FanoutConfig) -> Self {
        Self::spawn_for(&GroupKey::from("-"), config)
    }

    pub(crate) fn spawn_for(group: &GroupKey, config: FanoutConfig) -> Self {
        let (command_tx, command_rx) = mpsc::channel(config.command_capacity.max(1));

        let actor = FanoutActor {
            group: group.clone(),
            sinks: HashMap::new(),
            command_rx,
            delivery_timeout: config.delivery_timeout,
        };
        tokio::spawn(actor.run());

        Self { command_tx }
    }

    pub async fn subscribe(&self, sink: Sink) {
        self.submit(FanoutCommand::Subscribe(sink)).await;
    }

    pub async fn unsubscribe(&self, id: SinkId) {
        self.submit(FanoutCommand::Unsubscribe(id)).await;
    }

    /// Returns once every subscriber known at this point in the queue has
    /// taken the message or had it dropped by the delivery timeout.
    pub async fn broadcast(&self, message: GroupMessage) {
        let (done, finished) = oneshot::channel();
        self.submit(FanoutCommand::Broadcast { message, done }).await;
        let _ = finished.await;
    }

    pub async fn subscriber_count(&self) -> usize {
        let (reply, count) = oneshot::channel();
        self.submit(FanoutCommand::Count { reply }).await;
        count.await.unwrap_or(0)
    }

    pub fn same_as(&self, other: &Fanout) -> bool {
        self.command_tx.same_channel(&other.command_tx)
    }

    async fn submit(&self, cmd: FanoutCommand) {
        if self.command_tx.send(cmd).await.is_err() {
            warn!("Fanout actor is gone, command dropped");
        }
    }
}

struct FanoutActor {
    group: GroupKey,
    sinks: HashMap<SinkId, Sink>,
    command_rx: mpsc::Receiver<FanoutCommand>,
    delivery_timeout: Option<Duration>,
}

impl FanoutActor {
    async fn run(mut self) {
        info!(group = %self.group, "Fanout event loop started");

        while let Some(cmd) = self.command_rx.recv().await {
            self.handle_command(cmd).await;
        }

        info!(group = %self.group, "Fanout event loop finished");
    }

    async fn handle_command(&mut self, cmd: FanoutCommand) {
        match cmd {
            FanoutCommand::Subscribe(sink) => {
                let id = sink.id();
                if self.sinks.contains_key(&id) {
                    return;
                }
                self.sinks.insert(id, sink);
                debug!(group = %self.group, sink = %id, subscribers = self.sinks.len(), "Subscribed");
            }

            FanoutCommand::Unsubscribe(id) => {
                if self.sinks.remove(&id).is_some() {
                    debug!(group = %self.group, sink = %id, subscribers = self.sinks.len(), "Unsubscribed");
                }
            }

            FanoutCommand::Broadcast { message, done } => {
                self.deliver_to_all(message).await;
                let _ = done.send(());
            }

            FanoutCommand::Count { reply } => {
                let _ = reply.send(self.sinks.len());
            }
        }
    }

    async fn deliver_to_all(&mut self, message: GroupMessage) {
        let mut gone = Vec::new();

        for (id, sink) in &self.sinks {
            match sink.deliver(message.clone(), self.delivery_timeout).await {
                Delivery::Accepted => {}
                Delivery::TimedOut => {
                    warn!(group = %self.group, sink = %id, "Subscriber did not take message in time, dropped for it");
                }
                Delivery::Gone => gone.push(*id),
            }
        }

        for id in gone {
            self.sinks.remove(&id);
            debug!(group = %self.group, sink = %id, "Pruned closed subscriber");
        }
    }
}
