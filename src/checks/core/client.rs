//! Transport contract used by the check pipeline.
//!
//! The pipeline never talks to reqwest directly; it hands a borrowed
//! [`Session`] and a URL to a [`ProbeHttpClient`]. Tests swap in a stub
//! implementation, production uses [`super::ReqwestProbeClient`].

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use url::Url;

use super::outcome::CheckOutcome;
use super::types::ProbeResponse;
use crate::modules::session::Session;

/// Issues a single GET (redirects followed) within the given deadline.
#[async_trait]
pub trait ProbeHttpClient: Send + Sync {
    async fn get(
        &self,
        session: &Session,
        url: &Url,
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeHttpError>;
}

/// Transport failures, already narrowed to what the outcome taxonomy needs.
#[derive(Debug, Clone, Error)]
pub enum ProbeHttpError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("invalid url '{0}'")]
    InvalidUrl(String),
    #[error("http transport error: {0}")]
    Transport(String),
}

impl ProbeHttpError {
    /// Maps a transport failure onto exactly one inconclusive outcome.
    pub fn outcome(&self) -> CheckOutcome {
        match self {
            ProbeHttpError::Timeout(_) => CheckOutcome::Timeout,
            ProbeHttpError::Connect(_) => CheckOutcome::NetworkError,
            ProbeHttpError::InvalidUrl(_) | ProbeHttpError::Transport(_) => {
                CheckOutcome::UnknownError
            }
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            ProbeHttpError::Timeout(_) => "timeout",
            ProbeHttpError::Connect(_) => "connect",
            ProbeHttpError::InvalidUrl(_) => "invalid_url",
            ProbeHttpError::Transport(_) => "transport",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_to_outcome_mapping() {
        assert_eq!(
            ProbeHttpError::Timeout(Duration::from_secs(8)).outcome(),
            CheckOutcome::Timeout
        );
        assert_eq!(
            ProbeHttpError::Connect("refused".into()).outcome(),
            CheckOutcome::NetworkError
        );
        assert_eq!(
            ProbeHttpError::Transport("decode".into()).outcome(),
            CheckOutcome::UnknownError
        );
        assert_eq!(
            ProbeHttpError::InvalidUrl("::".into()).outcome(),
            CheckOutcome::UnknownError
        );
    }
}
