mod broker;
mod http_handler;

pub use broker::*;
pub use http_handler::*;
