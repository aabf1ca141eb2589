use crate::fanout::{Fanout, Sink, SinkId};
use crate::session::{SessionRegistry, SessionState};
use crate::transport::{LinkEvent, OutboundChannel, PeerLink};
use std::sync::Arc;
use switchboard_core::model::{ClientId, GroupKey, GroupMessage, StreamId};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Drives one answered session until its link goes away.
///
/// Owns the subscription to the group's fanout and the relay task that
/// writes fanout deliveries to the peer.
pub(crate) struct Session {
    pub stream_id: StreamId,
    pub client_id: ClientId,
    pub group: GroupKey,
    pub fanout: Fanout,
    pub link: Arc<dyn PeerLink>,
    pub registry: SessionRegistry,
    pub events_rx: mpsc::Receiver<LinkEvent>,
    pub candidates_rx: mpsc::Receiver<String>,
    pub state_tx: watch::Sender<SessionState>,
    pub outbound_capacity: usize,
}

struct Subscription {
    sink: SinkId,
    label: String,
    relay: JoinHandle<()>,
}

impl Session {
    pub async fn run(mut self) {
        info!(stream_id = %self.stream_id, client = %self.client_id, group = %self.group, "Session started");

        let mut subscription: Option<Subscription> = None;
        let mut candidates_open = true;

        loop {
            tokio::select! {
                evt = self.events_rx.recv() => {
                    match evt {
                        Some(e) => {
                            if !self.handle_link_event(e, &mut subscription).await {
                                break;
                            }
                        }
                        None => {
                            warn!(stream_id = %self.stream_id, "Link event channel closed unexpectedly");
                            break;
                        }
                    }
                }

                candidate = self.candidates_rx.recv(), if candidates_open => {
                    match candidate {
                        Some(c) => self.apply_candidate(c).await,
                        None => candidates_open = false,
                    }
                }
            }
        }

        self.teardown(subscription).await;
    }

    /// Returns `false` once the session has to end.
    async fn handle_link_event(
        &mut self,
        event: LinkEvent,
        subscription: &mut Option<Subscription>,
    ) -> bool {
        match event {
            LinkEvent::ChannelOpen(channel) => {
                if let Some(current) = subscription {
                    warn!(
                        stream_id = %self.stream_id,
                        carrying = %current.label,
                        "Ignoring extra data channel '{}'",
                        channel.label()
                    );
                    return true;
                }
                *subscription = Some(self.subscribe(channel).await);
            }

            LinkEvent::Message(label, message) => {
                let carrying = subscription.as_ref().is_some_and(|s| s.label == label);
                if !carrying {
                    debug!(stream_id = %self.stream_id, "Dropping message from unused data channel '{}'", label);
                    return true;
                }
                debug!(stream_id = %self.stream_id, bytes = message.len(), "Broadcasting message");
                self.fanout.broadcast(message).await;
            }

            LinkEvent::ChannelClosed(label) => {
                let carrying = subscription.as_ref().is_some_and(|s| s.label == label);
                if carrying {
                    info!(stream_id = %self.stream_id, "Data channel '{}' closed", label);
                    return false;
                }
                debug!(stream_id = %self.stream_id, "Unused data channel '{}' closed", label);
            }

            LinkEvent::StateChanged(state) => {
                if state.is_terminal() {
                    info!(stream_id = %self.stream_id, "Link is {:?}", state);
                    return false;
                }
                debug!(stream_id = %self.stream_id, "Link is {:?}", state);
            }

            LinkEvent::CandidateGathered(_) => {
                debug!(stream_id = %self.stream_id, "Local ICE candidate gathered");
            }
        }

        true
    }

    async fn subscribe(&mut self, channel: Arc<dyn OutboundChannel>) -> Subscription {
        let (sink, outbound_rx) = Sink::channel(self.outbound_capacity);
        let sink_id = sink.id();
        let label = channel.label();

        let relay = tokio::spawn(relay(
            self.stream_id,
            channel,
            outbound_rx,
            self.state_tx.subscribe(),
        ));

        self.fanout.subscribe(sink).await;
        self.state_tx.send_replace(SessionState::Subscribed);
        info!(stream_id = %self.stream_id, group = %self.group, "Session subscribed on '{}'", label);

        Subscription {
            sink: sink_id,
            label,
            relay,
        }
    }

    async fn apply_candidate(&self, candidate: String) {
        match self.link.add_ice_candidate(&candidate).await {
            Ok(()) => debug!(stream_id = %self.stream_id, "Remote ICE candidate added"),
            Err(e) => warn!(stream_id = %self.stream_id, "Failed to add ICE candidate: {:#}", e),
        }
    }

    async fn teardown(self, subscription: Option<Subscription>) {
        self.state_tx.send_replace(SessionState::Closing);

        if let Some(sub) = &subscription {
            self.fanout.unsubscribe(sub.sink).await;
        }
        self.registry.remove(&self.stream_id);

        if let Err(e) = self.link.close().await {
            debug!(stream_id = %self.stream_id, "Close after teardown: {:#}", e);
        }

        if let Some(sub) = subscription {
            let _ = sub.relay.await;
        }

        self.state_tx.send_replace(SessionState::Closed);
        info!(stream_id = %self.stream_id, client = %self.client_id, "Session closed");
    }
}

/// Writes fanout deliveries to the peer, in order, until the session starts
/// closing.
async fn relay(
    stream_id: StreamId,
    channel: Arc<dyn OutboundChannel>,
    mut outbound_rx: mpsc::Receiver<GroupMessage>,
    mut state: watch::Receiver<SessionState>,
) {
    loop {
        tokio::select! {
            biased;

            _ = closing(&mut state) => break,

            msg = outbound_rx.recv() => {
                let Some(message) = msg else { break };
                if let Err(e) = channel.send(&message).await {
                    warn!(stream_id = %stream_id, "Failed to relay message: {:#}", e);
                }
            }
        }
    }

    debug!(stream_id = %stream_id, "Relay stopped");
}

async fn closing(state: &mut watch::Receiver<SessionState>) {
    loop {
        if state.borrow_and_update().is_closing() {
            return;
        }
        if state.changed().await.is_err() {
            return;
        }
    }
}
