//! Turn level failures.
//!
//! Frame and payload decoding never produce an error here: a frame
//! that can't be understood is skipped and only shows up as an
//! `EmptyResponse` if nothing usable arrived for the whole turn.

use thiserror::Error;

/// Prefix used when rendering a failure into the assistant slot
pub const ERROR_GLYPH: &str = "⚠️";

#[derive(Debug, Clone, Error, PartialEq)]
pub enum TurnError {
    /// No credential configured so the turn never reaches the network
    #[error("Please add your OpenAI API key in the settings before sending messages.")]
    MissingCredential,

    /// The endpoint answered with a non-success status. `message` is
    /// the server provided `error.message` or the status text.
    #[error("{message}")]
    HttpStatus { status: u16, message: String },

    /// Connection failures and errors while reading the body
    #[error("{0}")]
    Transport(String),

    #[error("Received an empty response from the API.")]
    EmptyResponse,
}

impl TurnError {
    /// Text shown in the assistant message slot for this failure.
    pub fn render(&self) -> String {
        match self {
            // Configuration problems are instructions, not failures
            TurnError::MissingCredential => self.to_string(),
            _ => format!("{} {}", ERROR_GLYPH, self),
        }
    }
}

impl From<reqwest::Error> for TurnError {
    fn from(err: reqwest::Error) -> Self {
        TurnError::Transport(err.to_string())
    }
}
