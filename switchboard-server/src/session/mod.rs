mod session;
mod session_registry;
mod session_state;

pub(crate) use session::*;
pub use session_registry::*;
pub use session_state::*;
