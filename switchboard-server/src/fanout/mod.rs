mod fanout;
mod fanout_command;
mod sink;

pub use fanout::*;
pub use sink::*;
