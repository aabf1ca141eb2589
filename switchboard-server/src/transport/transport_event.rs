use crate::transport::OutboundChannel;
use std::fmt;
use std::sync::Arc;
use switchboard_core::model::GroupMessage;
use webrtc::peer_connection::peer_connection_state::RTCPeerConnectionState;

/// What a peer link reports to the session driving it.
pub enum LinkEvent {
    /// A data channel finished opening and can be written to.
    ChannelOpen(Arc<dyn OutboundChannel>),
    /// The data channel with this label closed.
    ChannelClosed(String),
    /// Inbound payload and the label of the channel it arrived on.
    Message(String, GroupMessage),
    StateChanged(LinkState),
    /// Local ICE candidate, JSON encoded.
    CandidateGathered(String),
}

impl fmt::Debug for LinkEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LinkEvent::ChannelOpen(channel) => write!(f, "ChannelOpen({})", channel.label()),
            LinkEvent::ChannelClosed(label) => write!(f, "ChannelClosed({label})"),
            LinkEvent::Message(label, msg) => write!(f, "Message({label}, {} bytes)", msg.len()),
            LinkEvent::StateChanged(state) => write!(f, "StateChanged({state:?})"),
            LinkEvent::CandidateGathered(_) => write!(f, "CandidateGathered"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    New,
    Connecting,
    Connected,
    Disconnected,
    Failed,
    Closed,
}

impl LinkState {
    /// The link is gone for good once it reaches one of these.
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            LinkState::Disconnected | LinkState::Failed | LinkState::Closed
        )
    }
}

impl From<RTCPeerConnectionState> for LinkState {
    fn from(state: RTCPeerConnectionState) -> Self {
        match state {
            RTCPeerConnectionState::Unspecified | RTCPeerConnectionState::New => LinkState::New,
            RTCPeerConnectionState::Connecting => LinkState::Connecting,
            RTCPeerConnectionState::Connected => LinkState::Connected,
            RTCPeerConnectionState::Disconnected => LinkState::Disconnected,
            RTCPeerConnectionState::Failed => LinkState::Failed,
            RTCPeerConnectionState::Closed => LinkState::Closed,
        }
    }
}
