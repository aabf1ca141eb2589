use anyhow::{Context, Result};
use clap::Args;
use colored::*;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use switchboard::model::{ClientId, GroupKey, NegotiationRequest, NegotiationResponse};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use webrtc::api::APIBuilder;
use webrtc::api::interceptor_registry::register_default_interceptors;
use webrtc::api::media_engine::MediaEngine;
use webrtc::data_channel::RTCDataChannel;
use webrtc::data_channel::data_channel_message::DataChannelMessage;
use webrtc::ice_transport::ice_server::RTCIceServer;
use webrtc::interceptor::registry::Registry;
use webrtc::peer_connection::RTCPeerConnection;
use webrtc::peer_connection::configuration::RTCConfiguration;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;
use webrtc::peer_connection::sdp::session_description::RTCSessionDescription;

const GATHER_TIMEOUT: Duration = Duration::from_secs(5);
const OPEN_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Args)]
pub struct JoinArgs {
    /// Group to join
    #[arg(long)]
    group: String,

    /// Client id; five random uppercase letters when omitted
    #[arg(long)]
    name: Option<String>,

    /// Seconds between messages
    #[arg(long, default_value_t = 5)]
    interval: u64,

    /// Broker base url
    #[arg(long, env = "SWITCHBOARD_SERVER", default_value = "http://127.0.0.1:9090")]
    server: String,

    #[arg(
        long,
        value_delimiter = ',',
        default_value = "stun:stun.l.google.com:19302"
    )]
    ice_servers: Vec<String>,
}

pub async fn run(args: JoinArgs) -> Result<()> {
    let name = args.name.clone().unwrap_or_else(random_name);
    println!(
        "{} {} {}",
        "🔗 Joining".green().bold(),
        args.group.cyan(),
        format!("as {name}").dimmed()
    );

    let peer_connection = new_peer_connection(&args.ice_servers).await?;

    let (state_tx, mut state_rx) = mpsc::channel(16);
    peer_connection.on_peer_connection_state_change(Box::new(
        move |s: RTCPeerConnectionState| {
            let tx = state_tx.clone();
            Box::pin(async move {
                debug!("Peer connection state: {:?}", s);
                let _ = tx.send(s).await;
            })
        },
    ));

    let channel = peer_connection
        .create_data_channel("data", None)
        .await
        .context("Failed to create data channel")?;
    let mut opened = watch_open(&channel);
    channel.on_message(Box::new(move |msg: DataChannelMessage| {
        Box::pin(async move {
            let text = String::from_utf8_lossy(&msg.data);
            println!("{} {}", "◀".cyan(), text);
        })
    }));

    let offer = local_offer(&peer_connection).await?;
    let response = exchange(&args.server, &name, &args.group, offer).await?;
    info!(stream_id = %response.stream_id, "Offer answered");

    let answer = RTCSessionDescription::answer(response.answer).context("Invalid SDP answer")?;
    peer_connection
        .set_remote_description(answer)
        .await
        .context("Failed to apply answer")?;

    tokio::time::timeout(OPEN_TIMEOUT, opened.recv())
        .await
        .context("Timed out waiting for the data channel")?
        .context("Data channel never opened")?;
    println!("{}", "✨ Connected".green().bold());

    let mut ticker = tokio::time::interval(Duration::from_secs(args.interval.max(1)));
    let mut sent = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                sent += 1;
                let text = format!("message #{sent} from {name}");
                if let Err(e) = channel.send_text(text.clone()).await {
                    warn!("Send failed: {}", e);
                    continue;
                }
                println!("{} {}", "▶".green(), text);
            }

            state = state_rx.recv() => match state {
                Some(
                    RTCPeerConnectionState::Failed
                    | RTCPeerConnectionState::Disconnected
                    | RTCPeerConnectionState::Closed,
                ) | None => {
                    println!("{}", "Connection lost".red());
                    break;
                }
                Some(_) => {}
            },

            _ = tokio::signal::ctrl_c() => break,
        }
    }

    peer_connection.close().await.context("Failed to close peer connection")?;
    Ok(())
}

fn random_name() -> String {
    let mut rng = rand::rng();
    (0..5).map(|_| rng.random_range(b'A'..=b'Z') as char).collect()
}

async fn new_peer_connection(ice_servers: &[String]) -> Result<Arc<RTCPeerConnection>> {
    let mut m = MediaEngine::default();
    m.register_default_codecs()?;
    let registry = register_default_interceptors(Registry::new(), &mut m)?;

    let api = APIBuilder::new()
        .with_media_engine(m)
        .with_interceptor_registry(registry)
        .build();

    let ice_servers = if ice_servers.is_empty() {
        vec![]
    } else {
        vec![RTCIceServer {
            urls: ice_servers.to_vec(),
            ..Default::default()
        }]
    };

    let rtc_config = RTCConfiguration {
        ice_servers,
        ..Default::default()
    };

    Ok(Arc::new(api.new_peer_connection(rtc_config).await?))
}

fn watch_open(channel: &Arc<RTCDataChannel>) -> mpsc::Receiver<()> {
    let (tx, rx) = mpsc::channel(1);
    channel.on_open(Box::new(move || {
        let tx = tx.clone();
        Box::pin(async move {
            let _ = tx.send(()).await;
        })
    }));
    rx
}

/// Offer SDP with the local candidates already in it.
async fn local_offer(peer_connection: &RTCPeerConnection) -> Result<String> {
    let offer = peer_connection
        .create_offer(None)
        .await
        .context("Failed to create offer")?;

    let mut gathering = peer_connection.gathering_complete_promise().await;
    peer_connection
        .set_local_description(offer.clone())
        .await
        .context("Failed to set local description")?;

    if tokio::time::timeout(GATHER_TIMEOUT, gathering.recv())
        .await
        .is_err()
    {
        warn!("ICE gathering timed out, sending partial offer");
    }

    Ok(peer_connection
        .local_description()
        .await
        .map(|d| d.sdp)
        .unwrap_or(offer.sdp))
}

async fn exchange(
    server: &str,
    name: &str,
    group: &str,
    offer: String,
) -> Result<NegotiationResponse> {
    let url = format!("{}/offer", server.trim_end_matches('/'));
    let request = NegotiationRequest {
        client_id: ClientId::from(name),
        group_key: GroupKey::from(group),
        offer,
    };

    let response = reqwest::Client::new()
        .post(&url)
        .json(&request)
        .send()
        .await
        .with_context(|| format!("Failed to reach {url}"))?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Broker refused the offer ({status}): {body}");
    }

    response
        .json::<NegotiationResponse>()
        .await
        .context("Unreadable answer from broker")
}
