//! Error types
//!
//! Every operation in the hub reports failure through [`HubError`]; nothing
//! here aborts the process. Callers decide how severe a failure is.

use std::time::Duration;

use crate::registry::ClientHandle;

/// Result alias used throughout the crate
pub type Result<T> = std::result::Result<T, HubError>;

/// Error type for hub operations
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubError {
    /// Argument was malformed (negative handle, empty or oversized message, ...)
    InvalidArgument(&'static str),
    /// Handle is already registered
    AlreadyExists(ClientHandle),
    /// Handle is not registered
    NotFound(ClientHandle),
    /// Client table has no free slot
    NoCapacity {
        /// Size of the client table
        capacity: usize,
    },
    /// Queue does not have room for the message
    Full {
        /// Queue name ("outbound" or "inbound")
        queue: &'static str,
        /// Bytes the message would occupy
        needed: usize,
        /// Bytes currently free
        available: usize,
    },
    /// Lock could not be acquired within the bounded wait
    LockTimeout(Duration),
    /// A resource could not be created during start
    AllocationFailure {
        /// Which resource failed
        resource: &'static str,
    },
    /// Hub is already running
    AlreadyRunning,
    /// Hub is not running
    NotRunning,
}

impl HubError {
    /// Short stable label for log fields
    pub fn as_label(&self) -> &'static str {
        match self {
            HubError::InvalidArgument(_) => "invalid_argument",
            HubError::AlreadyExists(_) => "already_exists",
            HubError::NotFound(_) => "not_found",
            HubError::NoCapacity { .. } => "no_capacity",
            HubError::Full { .. } => "queue_full",
            HubError::LockTimeout(_) => "lock_timeout",
            HubError::AllocationFailure { .. } => "allocation_failure",
            HubError::AlreadyRunning => "already_running",
            HubError::NotRunning => "not_running",
        }
    }

    /// Whether the error reports a saturated table or queue
    pub fn is_capacity(&self) -> bool {
        matches!(self, HubError::NoCapacity { .. } | HubError::Full { .. })
    }
}

impl std::fmt::Display for HubError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HubError::InvalidArgument(what) => write!(f, "Invalid argument: {}", what),
            HubError::AlreadyExists(handle) => write!(f, "Client already registered: {}", handle),
            HubError::NotFound(handle) => write!(f, "Client not found: {}", handle),
            HubError::NoCapacity { capacity } => {
                write!(f, "No free client slot (capacity {})", capacity)
            }
            HubError::Full {
                queue,
                needed,
                available,
            } => write!(
                f,
                "Queue {} is full: need {} bytes, {} available",
                queue, needed, available
            ),
            HubError::LockTimeout(wait) => write!(f, "Lock not acquired within {:?}", wait),
            HubError::AllocationFailure { resource } => {
                write!(f, "Failed to allocate {}", resource)
            }
            HubError::AlreadyRunning => write!(f, "Hub is already running"),
            HubError::NotRunning => write!(f, "Hub is not running"),
        }
    }
}

impl std::error::Error for HubError {}
