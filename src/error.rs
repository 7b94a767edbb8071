/// Errors raised while handling a single command.
///
/// Everything except [`RelayError::Transport`] is recovered at the request
/// level and reported back to the chat as text.
#[derive(Debug, thiserror::Error)]
pub enum RelayError {
    #[error("chat platform transport failure: {0}")]
    Transport(String),

    #[error("server error ({status}): {body}")]
    Service { status: u16, body: String },

    #[error("proving service unreachable: {0}")]
    Unreachable(#[source] reqwest::Error),

    #[error("malformed proof response: {0}")]
    Parse(#[source] serde_json::Error),

    #[error("{0}")]
    Storage(#[from] std::io::Error),

    #[error("proving service returned an empty proof")]
    EmptyProof,

    #[error("could not identify the sender of this command")]
    MissingSender,
}

impl RelayError {
    /// Transport failures mean the chat connection is gone.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayError::Transport(_))
    }

    /// Text sent back to the chat in place of an artifact.
    pub fn user_message(&self) -> String {
        match self {
            RelayError::Storage(e) => format!("Error saving proof to file: {}", e),
            RelayError::MissingSender => format!("Error: {}", self),
            _ => format!("Error generating proof: {}", self),
        }
    }
}
