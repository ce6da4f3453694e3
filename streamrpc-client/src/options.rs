//! Call options for per-call configuration.
//!
//! This module provides [`CallOptions`] for configuring individual calls
//! with a timeout or an explicit [`CallContext`].

use std::time::Duration;

use streamrpc_core::CallContext;

/// Options for configuring individual calls.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use streamrpc_client::CallOptions;
/// use streamrpc_core::CallContext;
///
/// let ctx = CallContext::new();
/// let options = CallOptions::new()
///     .timeout(Duration::from_secs(5))
///     .context(ctx.clone());
///
/// // Cancelling `ctx` later cancels the call.
/// assert_eq!(options.get_timeout(), Some(Duration::from_secs(5)));
/// ```
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Timeout for this specific call.
    /// If set, overrides the client's default timeout.
    pub(crate) timeout: Option<Duration>,
    /// Context the call is derived from.
    pub(crate) context: Option<CallContext>,
}

impl CallOptions {
    /// Create new default call options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the timeout for this call.
    ///
    /// The server observes the resulting deadline as well; if it has its own
    /// timeout, the smaller of the two applies.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Get the configured timeout, if any.
    pub fn get_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Derive the call from `ctx`.
    ///
    /// The call is cancelled whenever `ctx` is, and inherits its deadline.
    /// Ending or abandoning the call never cancels `ctx` itself.
    pub fn context(mut self, ctx: CallContext) -> Self {
        self.context = Some(ctx);
        self
    }

    /// Get the configured parent context, if any.
    pub fn get_context(&self) -> Option<&CallContext> {
        self.context.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = CallOptions::new();
        assert!(options.get_timeout().is_none());
        assert!(options.get_context().is_none());
    }

    #[test]
    fn test_timeout() {
        let options = CallOptions::new().timeout(Duration::from_millis(250));
        assert_eq!(options.get_timeout(), Some(Duration::from_millis(250)));
    }
}
