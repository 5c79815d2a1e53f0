//! Client handle type
//!
//! A handle is the transport's identifier for one open connection (a socket
//! descriptor on embedded targets). It is only meaningful while the
//! connection is open.

/// Opaque identifier for one live client connection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClientHandle(i32);

impl ClientHandle {
    /// Wrap a raw transport identifier
    pub const fn new(raw: i32) -> Self {
        Self(raw)
    }

    /// Raw transport identifier
    pub const fn raw(&self) -> i32 {
        self.0
    }

    /// Negative identifiers never name a connection
    pub const fn is_valid(&self) -> bool {
        self.0 >= 0
    }
}

impl From<i32> for ClientHandle {
    fn from(raw: i32) -> Self {
        Self::new(raw)
    }
}

impl std::fmt::Display for ClientHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
