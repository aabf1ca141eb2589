use crate::transport::LinkEvent;
use async_trait::async_trait;
use std::sync::Arc;
use switchboard_core::model::{ClientId, GroupMessage};
use tokio::sync::mpsc;

/// Creates peer connections. Everything the connection later observes is
/// pushed into `events`.
#[async_trait]
pub trait PeerConnector: Send + Sync {
    async fn connect(
        &self,
        client: &ClientId,
        events: mpsc::Sender<LinkEvent>,
    ) -> anyhow::Result<Arc<dyn PeerLink>>;
}

/// One negotiated (or negotiating) peer connection.
#[async_trait]
pub trait PeerLink: Send + Sync {
    /// Applies the remote offer and returns the local answer SDP.
    async fn accept_offer(&self, sdp: &str) -> anyhow::Result<String>;

    async fn add_ice_candidate(&self, candidate_json: &str) -> anyhow::Result<()>;

    async fn close(&self) -> anyhow::Result<()>;
}

/// Writable side of an open data channel.
#[async_trait]
pub trait OutboundChannel: Send + Sync {
    fn label(&self) -> String;

    async fn send(&self, message: &GroupMessage) -> anyhow::Result<()>;
}
