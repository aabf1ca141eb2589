use crate::config::BrokerConfig;
use crate::error::{BrokerError, BrokerResult};
use crate::group::GroupRegistry;
use crate::session::{Session, SessionEntry, SessionRegistry, SessionState};
use crate::transport::{PeerConnector, PeerLink, WebRtcConnector};
use futures::future::join_all;
use std::sync::Arc;
use switchboard_core::model::{
    CandidateSubmission, NegotiationRequest, NegotiationResponse, StreamId,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Accepts offers, wires each negotiated link into its group and keeps the
/// bookkeeping needed for later candidate exchange.
#[derive(Clone)]
pub struct Broker {
    config: Arc<BrokerConfig>,
    connector: Arc<dyn PeerConnector>,
    groups: GroupRegistry,
    sessions: SessionRegistry,
}

impl Broker {
    pub fn new(config: BrokerConfig, connector: Arc<dyn PeerConnector>) -> Self {
        Self {
            groups: GroupRegistry::new(config.fanout.clone()),
            sessions: SessionRegistry::new(),
            config: Arc::new(config),
            connector,
        }
    }

    pub fn with_webrtc(config: BrokerConfig) -> Self {
        let connector = Arc::new(WebRtcConnector::new(config.transport.clone()));
        Self::new(config, connector)
    }

    pub fn groups(&self) -> &GroupRegistry {
        &self.groups
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub async fn handle_offer(
        &self,
        request: NegotiationRequest,
    ) -> BrokerResult<NegotiationResponse> {
        validate(&request)?;
        let NegotiationRequest {
            client_id,
            group_key,
            offer,
        } = request;

        let (state_tx, state_rx) = watch::channel(SessionState::Negotiating);
        let (events_tx, events_rx) = mpsc::channel(self.config.event_capacity.max(1));

        let link = self
            .connector
            .connect(&client_id, events_tx)
            .await
            .map_err(|e| {
                error!(client = %client_id, group = %group_key, "Failed to create peer connection: {:#}", e);
                BrokerError::from(e)
            })?;
        let pending = PendingLink::new(link);

        let offered = pending.link().accept_offer(&offer).await;
        let answer = match offered {
            Ok(answer) => answer,
            Err(e) => {
                error!(client = %client_id, group = %group_key, "Negotiation failed: {:#}", e);
                pending.abandon().await;
                return Err(e.into());
            }
        };
        state_tx.send_replace(SessionState::Answered);

        let fanout = self.groups.resolve(&group_key);
        let (candidates_tx, candidates_rx) =
            mpsc::channel(self.config.candidate_capacity.max(1));
        let link = pending.disarm();
        let stream_id = self.sessions.insert_unique(SessionEntry {
            client_id: client_id.clone(),
            group: group_key.clone(),
            link: link.clone(),
            candidates: candidates_tx,
            state: state_rx,
        });

        let session = Session {
            stream_id,
            client_id: client_id.clone(),
            group: group_key.clone(),
            fanout,
            link,
            registry: self.sessions.clone(),
            events_rx,
            candidates_rx,
            state_tx,
            outbound_capacity: self.config.outbound_capacity,
        };
        tokio::spawn(session.run());

        info!(stream_id = %stream_id, client = %client_id, group = %group_key, "Offer answered");

        Ok(NegotiationResponse { answer, stream_id })
    }

    pub fn submit_candidate(&self, submission: CandidateSubmission) -> BrokerResult<()> {
        if submission.candidate.trim().is_empty() {
            return Err(BrokerError::MalformedRequest("candidate is empty".into()));
        }
        self.sessions
            .submit_candidate(&submission.stream_id, submission.candidate)
    }

    /// Closes the session's peer connection. The session tears itself down
    /// once the link reports it.
    pub async fn close_session(&self, stream_id: &StreamId) -> BrokerResult<()> {
        let link = self
            .sessions
            .link(stream_id)
            .ok_or(BrokerError::UnknownStream(*stream_id))?;
        link.close()
            .await
            .map_err(|e| BrokerError::NegotiationFailure(format!("{e:#}")))
    }

    /// Closes every live session.
    pub async fn shutdown(&self) {
        let ids = self.sessions.stream_ids();
        info!(sessions = ids.len(), "Closing all sessions");

        let closes = ids.iter().map(|id| async move {
            if let Err(e) = self.close_session(id).await {
                debug!(stream_id = %id, "Close on shutdown: {}", e);
            }
        });
        join_all(closes).await;
    }
}

fn validate(request: &NegotiationRequest) -> BrokerResult<()> {
    if request.client_id.is_blank() {
        return Err(BrokerError::MalformedRequest("clientId is empty".into()));
    }
    if request.group_key.is_blank() {
        return Err(BrokerError::MalformedRequest("groupKey is empty".into()));
    }
    if request.offer.trim().is_empty() {
        return Err(BrokerError::MalformedRequest("offer is empty".into()));
    }
    Ok(())
}

/// A link whose negotiation has not finished yet. Dropping it while still
/// armed, e.g. when the caller's future is cancelled mid-offer, closes the
/// link in the background.
struct PendingLink {
    link: Arc<dyn PeerLink>,
    armed: bool,
}

impl PendingLink {
    fn new(link: Arc<dyn PeerLink>) -> Self {
        Self { link, armed: true }
    }

    fn link(&self) -> &Arc<dyn PeerLink> {
        &self.link
    }

    fn disarm(mut self) -> Arc<dyn PeerLink> {
        self.armed = false;
        self.link.clone()
    }

    async fn abandon(mut self) {
        self.armed = false;
        close_abandoned(self.link.clone()).await;
    }
}

impl Drop for PendingLink {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let link = self.link.clone();
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                warn!("Negotiation cancelled, closing half-built link");
                handle.spawn(close_abandoned(link));
            }
            Err(_) => warn!("Negotiation cancelled outside a runtime, link left to drop"),
        }
    }
}

async fn close_abandoned(link: Arc<dyn PeerLink>) {
    if let Err(e) = link.close().await {
        debug!("Close of abandoned link failed: {:#}", e);
    }
}
