mod client;
mod group;
mod message;
mod signaling;
mod stream;

pub use client::ClientId;
pub use group::GroupKey;
pub use message::GroupMessage;
pub use signaling::{CandidateSubmission, IceServerConfig, NegotiationRequest, NegotiationResponse};
pub use stream::StreamId;
