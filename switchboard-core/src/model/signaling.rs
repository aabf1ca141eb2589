use crate::model::{ClientId, GroupKey, StreamId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IceServerConfig {
    pub urls: Vec<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub credential: Option<String>,
}

impl IceServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            urls: vec![url.into()],
            username: None,
            credential: None,
        }
    }
}

/// Body of `POST /offer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationRequest {
    pub client_id: ClientId,
    pub group_key: GroupKey,
    /// Session description offered by the peer.
    pub offer: String,
}

/// Reply to a successful `POST /offer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NegotiationResponse {
    pub answer: String,
    pub stream_id: StreamId,
}

/// Body of `POST /candidate`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateSubmission {
    pub stream_id: StreamId,
    /// JSON form of an ICE candidate init.
    pub candidate: String,
}
