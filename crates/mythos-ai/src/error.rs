use thiserror::Error;

/// Errors raised by AI collaborators.
///
/// Every variant renders a message that is safe to show verbatim; the
/// batch pipeline copies it into a task's `error` field unchanged.
#[derive(Debug, Error)]
pub enum AiError {
    #[error("Quota exceeded (429): {0}")]
    QuotaExceeded(String),

    #[error("Blocked by content policy: {0}")]
    PolicyBlocked(String),

    #[error("Ambiguous input: {0}")]
    Ambiguous(String),

    #[error("{0} is not configured")]
    NotConfigured(&'static str),

    #[error("Request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Service returned {status}: {body}")]
    Status { status: u16, body: String },
}

/// Coarse classification used to choose a remediation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AiErrorKind {
    /// Wait and retry.
    Quota,
    /// Rewrite the prompt.
    Policy,
    Other,
}

impl AiError {
    /// Map a non-success HTTP response to an error, classifying by status
    /// first and by body text second.
    pub fn from_status(status: u16, body: String) -> Self {
        if status == 429 {
            return Self::QuotaExceeded(body);
        }
        match classify_message(&body) {
            AiErrorKind::Quota => Self::QuotaExceeded(body),
            AiErrorKind::Policy => Self::PolicyBlocked(body),
            AiErrorKind::Other => Self::Status { status, body },
        }
    }

    pub fn kind(&self) -> AiErrorKind {
        match self {
            Self::QuotaExceeded(_) => AiErrorKind::Quota,
            Self::PolicyBlocked(_) => AiErrorKind::Policy,
            other => classify_message(&other.to_string()),
        }
    }

    pub fn user_message(&self) -> &'static str {
        user_message_for(self.kind())
    }
}

/// Classify a free-form error message.
pub fn classify_message(message: &str) -> AiErrorKind {
    let lower = message.to_lowercase();
    if ["429", "quota", "rate limit", "resource_exhausted"]
        .iter()
        .any(|p| lower.contains(p))
    {
        AiErrorKind::Quota
    } else if ["safety", "policy", "blocked", "no image"]
        .iter()
        .any(|p| lower.contains(p))
    {
        AiErrorKind::Policy
    } else {
        AiErrorKind::Other
    }
}

pub fn user_message_for(kind: AiErrorKind) -> &'static str {
    match kind {
        AiErrorKind::Quota => {
            "The image service is rate limited right now. Wait a minute and retry."
        }
        AiErrorKind::Policy => {
            "The prompt was rejected by the content policy. Try the AI repair action or edit it."
        }
        AiErrorKind::Other => "The AI service failed to process this prompt.",
    }
}

pub type Result<T> = std::result::Result<T, AiError>;
