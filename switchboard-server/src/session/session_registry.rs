use crate::error::{BrokerError, BrokerResult};
use crate::session::SessionState;
use crate::transport::PeerLink;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use std::sync::Arc;
use switchboard_core::model::{ClientId, GroupKey, StreamId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, watch};
use tracing::warn;

/// Resources of one live session, reachable by stream id.
pub(crate) struct SessionEntry {
    pub client_id: ClientId,
    pub group: GroupKey,
    pub link: Arc<dyn PeerLink>,
    pub candidates: mpsc::Sender<String>,
    pub state: watch::Receiver<SessionState>,
}

#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<DashMap<StreamId, SessionEntry>>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `entry` under a fresh stream id that no live session holds.
    pub(crate) fn insert_unique(&self, entry: SessionEntry) -> StreamId {
        loop {
            let stream_id = StreamId::new();
            match self.sessions.entry(stream_id) {
                Entry::Vacant(slot) => {
                    slot.insert(entry);
                    return stream_id;
                }
                Entry::Occupied(_) => continue,
            }
        }
    }

    pub(crate) fn remove(&self, stream_id: &StreamId) -> bool {
        self.sessions.remove(stream_id).is_some()
    }

    pub(crate) fn link(&self, stream_id: &StreamId) -> Option<Arc<dyn PeerLink>> {
        self.sessions.get(stream_id).map(|entry| entry.link.clone())
    }

    /// Queues a trickle candidate for the session's driver.
    pub fn submit_candidate(&self, stream_id: &StreamId, candidate: String) -> BrokerResult<()> {
        let Some(entry) = self.sessions.get(stream_id) else {
            return Err(BrokerError::UnknownStream(*stream_id));
        };

        if entry.state.borrow().is_closing() {
            return Err(BrokerError::CandidateRejected(format!(
                "session {stream_id} is closing"
            )));
        }

        match entry.candidates.try_send(candidate) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => {
                warn!(stream_id = %stream_id, client = %entry.client_id, "Candidate queue full");
                Err(BrokerError::CandidateRejected(format!(
                    "candidate queue for {stream_id} is full"
                )))
            }
            Err(TrySendError::Closed(_)) => Err(BrokerError::CandidateRejected(format!(
                "session {stream_id} is closing"
            ))),
        }
    }

    pub fn state(&self, stream_id: &StreamId) -> Option<SessionState> {
        self.sessions
            .get(stream_id)
            .map(|entry| *entry.state.borrow())
    }

    pub fn group_of(&self, stream_id: &StreamId) -> Option<GroupKey> {
        self.sessions.get(stream_id).map(|entry| entry.group.clone())
    }

    pub fn client_of(&self, stream_id: &StreamId) -> Option<ClientId> {
        self.sessions
            .get(stream_id)
            .map(|entry| entry.client_id.clone())
    }

    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.sessions.contains_key(stream_id)
    }

    pub fn stream_ids(&self) -> Vec<StreamId> {
        self.sessions.iter().map(|entry| *entry.key()).collect()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
