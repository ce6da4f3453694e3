//! Transport security hook.
//!
//! When a server enables transport security, every call header is passed
//! through a [`TransportSecurity`] provider before dispatch. Without one,
//! calls are accepted as they arrive.

use crate::{CallHeader, Status};

/// Authenticates calls before they are dispatched.
pub trait TransportSecurity: Send + Sync + 'static {
    /// Provider name, for logs.
    fn name(&self) -> &'static str;

    /// Accept or reject the call described by `header`.
    fn authorize(&self, header: &CallHeader) -> Result<(), Status>;
}

/// Accepts every call.
#[derive(Clone, Copy, Debug, Default)]
pub struct Plaintext;

impl TransportSecurity for Plaintext {
    fn name(&self) -> &'static str {
        "plaintext"
    }

    fn authorize(&self, _header: &CallHeader) -> Result<(), Status> {
        Ok(())
    }
}

/// Requires callers to present a pre-shared secret.
#[derive(Clone)]
pub struct SharedSecret {
    secret: String,
}

impl SharedSecret {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl std::fmt::Debug for SharedSecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedSecret").finish_non_exhaustive()
    }
}

impl TransportSecurity for SharedSecret {
    fn name(&self) -> &'static str {
        "shared-secret"
    }

    fn authorize(&self, header: &CallHeader) -> Result<(), Status> {
        match header.credentials.as_deref() {
            Some(presented) if constant_time_eq(presented.as_bytes(), self.secret.as_bytes()) => {
                Ok(())
            }
            Some(_) => Err(Status::unauthenticated("invalid credentials")),
            None => Err(Status::unauthenticated("missing credentials")),
        }
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallShape, Code, Encoding};

    fn header() -> CallHeader {
        CallHeader::new("greet.GreetService/Greet", CallShape::Unary, Encoding::Proto)
    }

    #[test]
    fn test_plaintext_accepts_everything() {
        assert!(Plaintext.authorize(&header()).is_ok());
    }

    #[test]
    fn test_shared_secret() {
        let security = SharedSecret::new("hunter2");
        assert!(security.authorize(&header().with_credentials("hunter2")).is_ok());

        let err = security.authorize(&header().with_credentials("hunter3")).unwrap_err();
        assert_eq!(err.code(), Code::Unauthenticated);

        let err = security.authorize(&header()).unwrap_err();
        assert_eq!(err.message(), "missing credentials");
    }

    #[test]
    fn test_debug_hides_secret() {
        let rendered = format!("{:?}", SharedSecret::new("hunter2"));
        assert!(!rendered.contains("hunter2"));
    }
}
