use anyhow::{Context, Result};
use std::sync::Arc;
use switchboard_core::model::{ClientId, GroupKey, NegotiationRequest};
use tokio::sync::{Mutex, mpsc};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// Timeout for ICE gathering (ms).
pub const ICE_GATHERING_TIMEOUT_MS: u64 = 3000;

/// Timeout for connection establishment (ms).
pub const CONNECTION_TIMEOUT_MS: u64 = 10000;

/// Timeout for data channel opening (ms).
pub const DATA_CHANNEL_TIMEOUT_MS: u64 = 5000;

/// A real WebRTC peer joining the broker over loopback, without ICE servers.
pub struct TestClient {
    pub client_id: ClientId,
    peer_connection: Arc<RTCPeerConnection>,
    data_channel: Arc<Mutex<Option<Arc<RTCDataChannel>>>>,
    /// Received text messages.
    received: Arc<Mutex<Vec<String>>>,
    dc_open_tx: mpsc::Sender<()>,
    dc_open_rx: Arc<Mutex<mpsc::Receiver<()>>>,
    connection_state: Arc<Mutex<RTCPeerConnectionState>>,
}

impl TestClient {
    pub async fn new(client_id: &str) -> Result<Self> {
        let mut media_engine = MediaEngine::default();
        media_engine.register_default_codecs()?;

        let registry = register_default_interceptors(Registry::new(), &mut media_engine)?;

        let api = APIBuilder::new()
            .with_media_engine(media_engine)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(api.new_peer_connection(RTCConfiguration::default()).await?);

        let (dc_open_tx, dc_open_rx) = mpsc::channel(1);
        let connection_state = Arc::new(Mutex::new(RTCPeerConnectionState::New));

        let state_clone = Arc::clone(&connection_state);
        peer_connection.on_peer_connection_state_change(Box::new(move |state| {
            let state_clone = Arc::clone(&state_clone);
            Box::pin(async move {
                tracing::debug!("[TestClient] Connection state: {:?}", state);
                *state_clone.lock().await = state;
            })
        }));

        Ok(Self {
            client_id: ClientId::from(client_id),
            peer_connection,
            data_channel: Arc::new(Mutex::new(None)),
            received: Arc::new(Mutex::new(Vec::new())),
            dc_open_tx,
            dc_open_rx: Arc::new(Mutex::new(dc_open_rx)),
            connection_state,
        })
    }

    /// Create the "data" channel and an offer that already carries the
    /// gathered local candidates.
    pub async fn offer_for(&self, group: &str) -> Result<NegotiationRequest> {
        let dc = self
            .peer_connection
            .create_data_channel("data", None)
            .await
            .context("Failed to create data channel")?;

        let received = Arc::clone(&self.received);
        dc.on_message(Box::new(move |msg: DataChannelMessage| {
            let received = Arc::clone(&received);
            Box::pin(async move {
                let text = String::from_utf8_lossy(&msg.data).into_owned();
                tracing::debug!("[TestClient] Message received: {}", text);
                received.lock().await.push(text);
            })
        }));

        let dc_open_tx = self.dc_open_tx.clone();
        dc.on_open(Box::new(move || {
            let dc_open_tx = dc_open_tx.clone();
            Box::pin(async move {
                tracing::debug!("[TestClient] Data channel opened");
                let _ = dc_open_tx.send(()).await;
            })
        }));

        *self.data_channel.lock().await = Some(dc);

        let offer = self
            .peer_connection
            .create_offer(None)
            .await
            .context("Failed to create offer")?;

        let mut gathering_complete = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection
            .set_local_description(offer.clone())
            .await
            .context("Failed to set local description")?;

        if tokio::time::timeout(
            std::time::Duration::from_millis(ICE_GATHERING_TIMEOUT_MS),
            gathering_complete.recv(),
        )
        .await
        .is_err()
        {
            tracing::warn!("[TestClient] ICE gathering timeout, sending partial offer");
        }

        let sdp = self
            .peer_connection
            .local_description()
            .await
            .map(|d| d.sdp)
            .unwrap_or(offer.sdp);

        Ok(NegotiationRequest {
            client_id: self.client_id.clone(),
            group_key: GroupKey::from(group),
            offer: sdp,
        })
    }

    /// Set the remote SDP answer received from the broker.
    pub async fn set_remote_answer(&self, sdp: String) -> Result<()> {
        let answer = RTCSessionDescription::answer(sdp)?;
        self.peer_connection
            .set_remote_description(answer)
            .await
            .context("Failed to set remote description")?;
        Ok(())
    }

    /// Wait for the data channel to be open.
    pub async fn wait_for_data_channel(&self, timeout_ms: u64) -> Result<()> {
        let mut rx = self.dc_open_rx.lock().await;
        let timeout_result =
            tokio::time::timeout(std::time::Duration::from_millis(timeout_ms), rx.recv()).await;

        match timeout_result {
            Ok(Some(())) => Ok(()),
            Ok(None) => anyhow::bail!("Data channel open channel closed"),
            Err(_) => anyhow::bail!("Timeout waiting for data channel to open"),
        }
    }

    /// Wait for the connection to be established.
    pub async fn wait_for_connection(&self, timeout_ms: u64) -> Result<()> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            let state = *self.connection_state.lock().await;
            match state {
                RTCPeerConnectionState::Connected => return Ok(()),
                RTCPeerConnectionState::Failed => anyhow::bail!("Connection failed"),
                RTCPeerConnectionState::Closed => anyhow::bail!("Connection closed"),
                _ => {}
            }

            if start.elapsed() > timeout {
                anyhow::bail!("Timeout waiting for connection (state: {:?})", state);
            }

            tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        }
    }

    /// Wait for the connection and the data channel.
    pub async fn wait_until_ready(&self) -> Result<()> {
        self.wait_for_connection(CONNECTION_TIMEOUT_MS)
            .await
            .context("Connection not established")?;
        self.wait_for_data_channel(DATA_CHANNEL_TIMEOUT_MS)
            .await
            .context("Data channel not opened")?;
        Ok(())
    }

    pub async fn send_text(&self, text: &str) -> Result<()> {
        let dc = self
            .data_channel
            .lock()
            .await
            .clone()
            .context("Data channel not available")?;

        dc.send_text(text.to_string())
            .await
            .context("Failed to send message")?;
        Ok(())
    }

    /// Wait until at least `count` messages arrived or timeout.
    pub async fn wait_for_messages(&self, count: usize, timeout_ms: u64) -> Vec<String> {
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(timeout_ms);

        loop {
            let received = self.received.lock().await.clone();
            if received.len() >= count || start.elapsed() > timeout {
                return received;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
    }

    pub async fn close(&self) -> Result<()> {
        self.peer_connection
            .close()
            .await
            .context("Failed to close peer connection")?;
        Ok(())
    }
}
