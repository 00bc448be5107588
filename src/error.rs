use std::fmt;
use thiserror::Error;

pub type Result<T, E = ArcadeError> = std::result::Result<T, E>;

/// Everything that can end a single arcade command.
#[derive(Debug, Error)]
pub enum ArcadeError {
    #[error(transparent)]
    Policy(#[from] PolicyViolation),
    #[error("arcade rejected the request: {message}")]
    UpstreamRejection { message: String },
    #[error("insufficient funds: {message}")]
    InsufficientFunds { message: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("local signing failed: {0}")]
    Signing(String),
    #[error("{0} is not available for this wallet")]
    CapabilityUnavailable(&'static str),
    #[error("permit owner {signer} does not match wallet {wallet}")]
    OwnerMismatch { wallet: String, signer: String },
    #[error("permit expired at {deadline}")]
    PermitExpired { deadline: u64 },
    #[error("malformed arcade response: {0}")]
    MalformedResponse(String),
}

impl ArcadeError {
    /// The request may or may not have been applied server-side.
    pub fn is_indeterminate(&self) -> bool {
        matches!(self, ArcadeError::Transport(_))
    }

    /// Detected locally, before anything was sent.
    pub fn is_client_side(&self) -> bool {
        matches!(
            self,
            ArcadeError::Policy(_)
                | ArcadeError::CapabilityUnavailable(_)
                | ArcadeError::OwnerMismatch { .. }
                | ArcadeError::PermitExpired { .. }
        )
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum PolicyViolation {
    #[error("bet amount {amount} is outside the allowed range [{min}, {max}]")]
    AmountOutOfBounds { amount: f64, min: f64, max: f64 },
    #[error("'{0}' is not a valid bet amount")]
    InvalidAmount(String),
    #[error("choice must be heads or tails (0 or 1), got '{0}'")]
    InvalidChoice(String),
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TransportErrorKind {
    Timeout,
    Connect,
    Status(u16),
    Decode,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TransportErrorKind::Timeout => write!(f, "timed out"),
            TransportErrorKind::Connect => write!(f, "connection failed"),
            TransportErrorKind::Status(code) => write!(f, "HTTP {code}"),
            TransportErrorKind::Decode => write!(f, "unreadable response"),
            TransportErrorKind::Other => write!(f, "transport error"),
        }
    }
}

#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Timeout, message)
    }

    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(TransportErrorKind::Decode, message)
    }
}

impl From<reqwest::Error> for TransportError {
    fn from(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            TransportErrorKind::Timeout
        } else if err.is_connect() {
            TransportErrorKind::Connect
        } else if err.is_decode() {
            TransportErrorKind::Decode
        } else if let Some(status) = err.status() {
            TransportErrorKind::Status(status.as_u16())
        } else {
            TransportErrorKind::Other
        };
        Self::new(kind, err.to_string())
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RejectionKind {
    InsufficientFunds,
    Other,
}

/// Machine-readable codes, checked before any message text.
const REJECTION_CODES: &[(&str, RejectionKind)] = &[
    ("INSUFFICIENT_FUNDS", RejectionKind::InsufficientFunds),
    ("INSUFFICIENT_BALANCE", RejectionKind::InsufficientFunds),
    ("INSUFFICIENT_ALLOWANCE", RejectionKind::InsufficientFunds),
];

/// Free-text heuristics, matched case-insensitively against the server message.
const REJECTION_PATTERNS: &[(&str, RejectionKind)] = &[
    ("insufficient", RejectionKind::InsufficientFunds),
    ("not enough", RejectionKind::InsufficientFunds),
    ("exceeds balance", RejectionKind::InsufficientFunds),
    ("balance too low", RejectionKind::InsufficientFunds),
];

pub fn classify_rejection(code: Option<&str>, message: &str) -> RejectionKind {
    if let Some(code) = code {
        if let Some((_, kind)) = REJECTION_CODES
            .iter()
            .find(|(known, _)| known.eq_ignore_ascii_case(code))
        {
            return *kind;
        }
    }
    let lowered = message.to_lowercase();
    REJECTION_PATTERNS
        .iter()
        .find(|(pattern, _)| lowered.contains(pattern))
        .map(|(_, kind)| *kind)
        .unwrap_or(RejectionKind::Other)
}

/// Turns a `success:false` envelope into the matching error.
pub fn rejection(code: Option<&str>, message: Option<String>) -> ArcadeError {
    let message = message.unwrap_or_else(|| "request rejected without a reason".to_string());
    match classify_rejection(code, &message) {
        RejectionKind::InsufficientFunds => ArcadeError::InsufficientFunds { message },
        RejectionKind::Other => ArcadeError::UpstreamRejection { message },
    }
}
