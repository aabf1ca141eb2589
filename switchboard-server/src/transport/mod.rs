mod connection_wrapper;
mod peer_link;
mod transport_config;
mod transport_event;

pub use connection_wrapper::*;
pub use peer_link::*;
pub use transport_config::*;
pub use transport_event::*;
