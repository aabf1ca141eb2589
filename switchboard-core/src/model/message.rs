use bytes::Bytes;

/// A payload travelling through a group, exactly as the sending peer wrote it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupMessage {
    pub data: Bytes,
    pub is_text: bool,
}

impl GroupMessage {
    pub fn text(s: impl Into<String>) -> Self {
        Self {
            data: Bytes::from(s.into()),
            is_text: true,
        }
    }

    pub fn binary(data: impl Into<Bytes>) -> Self {
        Self {
            data: data.into(),
            is_text: false,
        }
    }

    /// Lossy view of the payload, for logs and the demo client.
    pub fn as_text(&self) -> String {
        String::from_utf8_lossy(&self.data).into_owned()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
