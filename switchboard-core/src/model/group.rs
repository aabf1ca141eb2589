use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque name of a broadcast group.
#[derive(Debug, Serialize, Deserialize, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[serde(transparent)]
pub struct GroupKey(pub String);

impl GroupKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for GroupKey {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for GroupKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
