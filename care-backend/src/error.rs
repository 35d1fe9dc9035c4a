use a2a_types::JsonRpcError;
use std::fmt;

/// Failure kinds that cross a component boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum CareError {
    /// Registry source or environment is malformed.
    Config(String),
    /// A peer agent could not be reached, timed out, or answered non-2xx.
    Transport {
        message: String,
        status_code: Option<u16>,
    },
    /// A peer answered 2xx with a body that is not a protocol response.
    Decode(String),
    /// A peer answered with a JSON-RPC error object.
    Rpc(JsonRpcError),
    /// Unknown task id, or unknown agent name during delegation.
    NotFound(String),
    /// The reasoning capability failed or timed out.
    Reasoning(String),
}

impl CareError {
    pub fn transport(message: impl Into<String>) -> Self {
        CareError::Transport {
            message: message.into(),
            status_code: None,
        }
    }

    pub fn transport_status(message: impl Into<String>, status_code: u16) -> Self {
        CareError::Transport {
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CareError::Transport { .. })
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, CareError::NotFound(_))
    }
}

impl fmt::Display for CareError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CareError::Config(msg) => write!(f, "configuration error: {}", msg),
            CareError::Transport {
                message,
                status_code: Some(code),
            } => write!(f, "transport error: [HTTP {}] {}", code, message),
            CareError::Transport { message, .. } => write!(f, "transport error: {}", message),
            CareError::Decode(msg) => write!(f, "decode error: {}", msg),
            CareError::Rpc(err) => write!(f, "remote agent error: {}", err),
            CareError::NotFound(msg) => write!(f, "not found: {}", msg),
            CareError::Reasoning(msg) => write!(f, "reasoning error: {}", msg),
        }
    }
}

impl std::error::Error for CareError {}

impl From<JsonRpcError> for CareError {
    fn from(err: JsonRpcError) -> Self {
        CareError::Rpc(err)
    }
}

pub type CareResult<T> = Result<T, CareError>;
