//! Call shapes and the header sent when a call is opened.

use crate::Encoding;

/// Multiplicity of requests and responses for an operation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallShape {
    /// One request, one response.
    Unary,
    /// One request, a stream of responses.
    ServerStreaming,
    /// A stream of requests, one response.
    ClientStreaming,
    /// Independent request and response streams.
    BidiStreaming,
}

impl CallShape {
    /// Name used for the `rpc.type` span field.
    pub fn as_str(&self) -> &'static str {
        match self {
            CallShape::Unary => "unary",
            CallShape::ServerStreaming => "server_stream",
            CallShape::ClientStreaming => "client_stream",
            CallShape::BidiStreaming => "bidi_stream",
        }
    }

    /// Whether the caller sends more than one request.
    pub fn client_streams(&self) -> bool {
        matches!(self, CallShape::ClientStreaming | CallShape::BidiStreaming)
    }

    /// Whether the handler sends more than one response.
    pub fn server_streams(&self) -> bool {
        matches!(self, CallShape::ServerStreaming | CallShape::BidiStreaming)
    }
}

impl std::fmt::Display for CallShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the caller announces when opening a call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CallHeader {
    /// Operation identifier, e.g. `calculator.CalculatorService/Sum`.
    pub operation: String,
    pub shape: CallShape,
    pub encoding: Encoding,
    /// Credentials checked by the server's transport security, if enabled.
    pub credentials: Option<String>,
}

impl CallHeader {
    pub fn new(operation: impl Into<String>, shape: CallShape, encoding: Encoding) -> Self {
        Self {
            operation: operation.into(),
            shape,
            encoding,
            credentials: None,
        }
    }

    pub fn with_credentials(mut self, credentials: impl Into<String>) -> Self {
        self.credentials = Some(credentials.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shape_directions() {
        assert!(!CallShape::Unary.client_streams());
        assert!(!CallShape::Unary.server_streams());
        assert!(CallShape::ServerStreaming.server_streams());
        assert!(CallShape::ClientStreaming.client_streams());
        assert!(CallShape::BidiStreaming.client_streams());
        assert!(CallShape::BidiStreaming.server_streams());
    }

    #[test]
    fn test_header_builder() {
        let header = CallHeader::new("greet.GreetService/Greet", CallShape::Unary, Encoding::Json)
            .with_credentials("s3cret");
        assert_eq!(header.operation, "greet.GreetService/Greet");
        assert_eq!(header.credentials.as_deref(), Some("s3cret"));
        assert_eq!(header.shape.to_string(), "unary");
    }
}
