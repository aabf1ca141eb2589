use crate::transport::{LinkEvent, OutboundChannel, PeerConnector, PeerLink, TransportConfig};
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use switchboard_core::model::{ClientId, GroupMessage};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_candidate::{RTCIceCandidate, RTCIceCandidateInit};
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

/// [`PeerConnector`] backed by webrtc-rs.
#[derive(Clone, Default)]
pub struct WebRtcConnector {
    config: TransportConfig,
}

impl WebRtcConnector {
    pub fn new(config: TransportConfig) -> Self {
        Self { config }
    }

    fn rtc_configuration(&self) -> RTCConfiguration {
        let ice_servers = self
            .config
            .ice_servers
            .iter()
            .map(|server| RTCIceServer {
                urls: server.urls.clone(),
                username: server.username.clone().unwrap_or_default(),
                credential: server.credential.clone().unwrap_or_default(),
                ..Default::default()
            })
            .collect();

        RTCConfiguration {
            ice_servers,
            ..Default::default()
        }
    }
}

#[async_trait]
impl PeerConnector for WebRtcConnector {
    async fn connect(
        &self,
        client: &ClientId,
        events: mpsc::Sender<LinkEvent>,
    ) -> Result<Arc<dyn PeerLink>> {
        // Кодеки регистрируются даже для чистого DataChannel, иначе SDP не собрать
        let mut m = MediaEngine::default();
        m.register_default_codecs()?;
        let registry = register_default_interceptors(Registry::new(), &mut m)?;

        let api = APIBuilder::new()
            .with_media_engine(m)
            .with_interceptor_registry(registry)
            .build();

        let peer_connection = Arc::new(
            api.new_peer_connection(self.rtc_configuration())
                .await
                .context("Failed to create peer connection")?,
        );

        let state_tx = events.clone();
        let uid_state = client.clone();
        peer_connection.on_peer_connection_state_change(Box::new(
            move |s: RTCPeerConnectionState| {
                let tx = state_tx.clone();
                let uid = uid_state.clone();

                Box::pin(async move {
                    info!(client = %uid, "Peer connection state changed: {:?}", s);
                    let _ = tx.send(LinkEvent::StateChanged(s.into())).await;
                })
            },
        ));

        let ice_tx = events.clone();
        peer_connection.on_ice_candidate(Box::new(move |c: Option<RTCIceCandidate>| {
            let tx = ice_tx.clone();

            Box::pin(async move {
                let Some(candidate) = c else { return };
                let Ok(json_candidate) = candidate.to_json() else {
                    return;
                };
                let Ok(str_candidate) = serde_json::to_string(&json_candidate) else {
                    return;
                };
                let _ = tx.send(LinkEvent::CandidateGathered(str_candidate)).await;
            })
        }));

        let dc_tx = events;
        let uid_dc = client.clone();
        peer_connection.on_data_channel(Box::new(move |dc: Arc<RTCDataChannel>| {
            let tx = dc_tx.clone();
            let uid = uid_dc.clone();

            Box::pin(async move {
                debug!(client = %uid, "New DataChannel '{}'", dc.label());
                wire_data_channel(dc, tx);
            })
        }));

        Ok(Arc::new(WebRtcLink {
            client: client.clone(),
            peer_connection,
            config: self.config.clone(),
        }))
    }
}

fn wire_data_channel(dc: Arc<RTCDataChannel>, tx: mpsc::Sender<LinkEvent>) {
    // Писать в канал можно только после on_open
    let dc_on_open = dc.clone();
    let tx_open = tx.clone();
    dc.on_open(Box::new(move || {
        let tx = tx_open.clone();
        let channel: Arc<dyn OutboundChannel> = Arc::new(WebRtcChannel {
            dc: dc_on_open.clone(),
        });

        Box::pin(async move {
            let _ = tx.send(LinkEvent::ChannelOpen(channel)).await;
        })
    }));

    let label = dc.label().to_owned();

    let tx_msg = tx.clone();
    let msg_label = label.clone();
    dc.on_message(Box::new(move |msg: DataChannelMessage| {
        let tx = tx_msg.clone();
        let label = msg_label.clone();
        Box::pin(async move {
            let message = GroupMessage {
                data: msg.data,
                is_text: msg.is_string,
            };
            let _ = tx.send(LinkEvent::Message(label, message)).await;
        })
    }));

    dc.on_close(Box::new(move || {
        let tx = tx.clone();
        let label = label.clone();
        Box::pin(async move {
            let _ = tx.send(LinkEvent::ChannelClosed(label)).await;
        })
    }));
}

pub struct WebRtcLink {
    client: ClientId,
    peer_connection: Arc<RTCPeerConnection>,
    config: TransportConfig,
}

#[async_trait]
impl PeerLink for WebRtcLink {
    async fn accept_offer(&self, sdp: &str) -> Result<String> {
        let offer = RTCSessionDescription::offer(sdp.to_owned()).context("Invalid SDP offer")?;
        self.peer_connection
            .set_remote_description(offer)
            .await
            .context("Failed to apply remote offer")?;

        let answer = self
            .peer_connection
            .create_answer(None)
            .await
            .context("Failed to create answer")?;

        let mut gathering = self.peer_connection.gathering_complete_promise().await;
        self.peer_connection
            .set_local_description(answer.clone())
            .await
            .context("Failed to apply local answer")?;

        if self.config.wait_for_gathering
            && tokio::time::timeout(self.config.gather_timeout, gathering.recv())
                .await
                .is_err()
        {
            warn!(client = %self.client, "ICE gathering timed out, answering with what we have");
        }

        let local = self.peer_connection.local_description().await;
        Ok(local.map(|d| d.sdp).unwrap_or(answer.sdp))
    }

    async fn add_ice_candidate(&self, candidate_json: &str) -> Result<()> {
        let candidate: RTCIceCandidateInit =
            serde_json::from_str(candidate_json).context("Failed to parse ICE candidate JSON")?;
        self.peer_connection.add_ice_candidate(candidate).await?;
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.peer_connection.close().await?;
        Ok(())
    }
}

struct WebRtcChannel {
    dc: Arc<RTCDataChannel>,
}

#[async_trait]
impl OutboundChannel for WebRtcChannel {
    fn label(&self) -> String {
        self.dc.label().to_owned()
    }

    async fn send(&self, message: &GroupMessage) -> Result<()> {
        if message.is_text {
            self.dc.send_text(message.as_text()).await?;
        } else {
            self.dc.send(&message.data).await?;
        }
        Ok(())
    }
}
