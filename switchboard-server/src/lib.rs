mod config;
mod error;
mod fanout;
mod group;
mod session;
mod signaling;
mod transport;

pub use config::{BrokerConfig, FanoutConfig};
pub use error::{BrokerError, BrokerResult};
pub use fanout::*;
pub use group::*;
pub use session::{SessionRegistry, SessionState};
pub use signaling::*;
pub use transport::*;
