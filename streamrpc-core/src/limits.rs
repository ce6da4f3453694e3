//! Message size and buffering limits.
//!
//! The default message limit of 4 MB matches gRPC's default receive limit.

use crate::Status;

/// Default maximum message size (4 MB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 4 * 1024 * 1024;

/// Default number of frames buffered per channel half before `send()` waits.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 16;

/// Configuration for message size limits.
///
/// Checked against every encoded payload, in both directions.
///
/// # Example
///
/// ```rust
/// use streamrpc_core::MessageLimits;
///
/// // Use default 4 MB limit
/// let limits = MessageLimits::default();
///
/// // Custom 16 MB limit for large payloads
/// let limits = MessageLimits::new(16 * 1024 * 1024);
///
/// // No limit
/// let limits = MessageLimits::unlimited();
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct MessageLimits {
    /// `None` means unlimited.
    max_message_size: Option<usize>,
}

impl Default for MessageLimits {
    fn default() -> Self {
        Self {
            max_message_size: Some(DEFAULT_MAX_MESSAGE_SIZE),
        }
    }
}

impl MessageLimits {
    /// Create new limits with the specified maximum message size in bytes.
    pub fn new(max_message_size: usize) -> Self {
        Self {
            max_message_size: Some(max_message_size),
        }
    }

    /// Create limits with no maximum.
    pub fn unlimited() -> Self {
        Self {
            max_message_size: None,
        }
    }

    /// Returns the maximum message size, or `None` if unlimited.
    pub fn max_message_size(&self) -> Option<usize> {
        self.max_message_size
    }

    /// Check a payload size against the limit.
    ///
    /// Oversized payloads fail with [`Code::ResourceExhausted`](crate::Code::ResourceExhausted).
    pub fn check_size(&self, size: usize) -> Result<(), Status> {
        if let Some(max) = self.max_message_size {
            if size > max {
                return Err(Status::resource_exhausted(format!(
                    "message size {} bytes exceeds maximum allowed size of {} bytes",
                    size, max
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Code;

    #[test]
    fn test_default_limits() {
        let limits = MessageLimits::default();
        assert_eq!(limits.max_message_size(), Some(DEFAULT_MAX_MESSAGE_SIZE));
    }

    #[test]
    fn test_unlimited() {
        let limits = MessageLimits::unlimited();
        assert_eq!(limits.max_message_size(), None);
        assert!(limits.check_size(usize::MAX).is_ok());
    }

    #[test]
    fn test_check_size_within_limit() {
        let limits = MessageLimits::new(1024);
        assert!(limits.check_size(512).is_ok());
        assert!(limits.check_size(1024).is_ok());
    }

    #[test]
    fn test_check_size_exceeds_limit() {
        let limits = MessageLimits::new(1024);
        let err = limits.check_size(1025).unwrap_err();
        assert_eq!(err.code(), Code::ResourceExhausted);
        assert!(err.message().contains("1025"));
        assert!(err.message().contains("1024"));
    }
}
