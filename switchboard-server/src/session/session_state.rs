use std::fmt;

/// Lifecycle of one session. Moves forward only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SessionState {
    Negotiating,
    Answered,
    Subscribed,
    Closing,
    Closed,
}

impl SessionState {
    pub fn is_closing(self) -> bool {
        self >= SessionState::Closing
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SessionState::Negotiating => "negotiating",
            SessionState::Answered => "answered",
            SessionState::Subscribed => "subscribed",
            SessionState::Closing => "closing",
            SessionState::Closed => "closed",
        };
        f.write_str(name)
    }
}
