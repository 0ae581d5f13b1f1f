use anyhow::Error;
use serde::Serialize;

pub type StoryResult<T> = Result<T, StoryboardError>;

/// Every failure a generation attempt can surface to the user.
///
/// The `Display` text is the user-visible message; [`StoryboardError::code`]
/// is the stable identifier used by the JSON error envelope.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum StoryboardError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Configuration(String),

    #[error("{0}")]
    Network(String),

    #[error("{0}")]
    ResponseFormat(String),

    #[error("{0}")]
    Upstream(String),
}

impl StoryboardError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::Network(message.into())
    }

    pub fn response_format(message: impl Into<String>) -> Self {
        Self::ResponseFormat(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn empty_input() -> Self {
        Self::validation("Please enter a code explanation.")
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Configuration(_) => "E_CONFIG",
            Self::Network(_) => "E_NETWORK",
            Self::ResponseFormat(_) => "E_RESPONSE_FORMAT",
            Self::Upstream(_) => "E_UPSTREAM",
        }
    }

    pub fn envelope(&self) -> ErrorEnvelope {
        ErrorEnvelope {
            ok: false,
            error: ErrorEnvelopeBody {
                code: self.code().to_owned(),
                message: self.to_string(),
            },
        }
    }

    /// Classifies a transport error from the HTTP client.
    pub fn from_transport(service: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            return Self::network(format!(
                "The request to the {service} timed out. Please try again."
            ));
        }
        if error.is_connect() || error.is_request() {
            return Self::network(format!(
                "A network error occurred while trying to reach the {service}. Please check your internet connection."
            ));
        }
        Self::upstream(format!(
            "An error occurred while communicating with the {service}: {error}"
        ))
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelope {
    pub ok: bool,
    pub error: ErrorEnvelopeBody,
}

#[derive(Debug, Clone, Serialize)]
pub struct ErrorEnvelopeBody {
    pub code: String,
    pub message: String,
}

impl ErrorEnvelope {
    /// Builds an envelope for any CLI failure; untyped errors use `E_INTERNAL`.
    pub fn from_anyhow(error: &Error) -> Self {
        match find_storyboard_error(error) {
            Some(typed) => typed.envelope(),
            None => Self {
                ok: false,
                error: ErrorEnvelopeBody {
                    code: "E_INTERNAL".to_owned(),
                    message: format!("{error:#}"),
                },
            },
        }
    }
}

pub fn find_storyboard_error(error: &Error) -> Option<&StoryboardError> {
    error
        .chain()
        .find_map(|cause| cause.downcast_ref::<StoryboardError>())
}
