//! Reqwest-based implementation of the [`ProbeHttpClient`] trait.
//!
//! Uses the session's pooled `reqwest::Client` and converts reqwest failures
//! into [`ProbeHttpError`] at the narrowest point.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use url::Url;

use super::{ProbeHttpClient, ProbeHttpError, ProbeResponse};
use crate::modules::session::Session;

/// Production transport backed by each session's reqwest client.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReqwestProbeClient;

impl ReqwestProbeClient {
    pub fn new() -> Self {
        Self
    }

    async fn send_once(
        &self,
        session: &Session,
        url: &Url,
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeHttpError> {
        let response = session
            .client()
            .get(url.as_str())
            .timeout(timeout)
            .send()
            .await
            .map_err(|err| map_error(err, timeout))?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let final_url = response.url().clone();
        let body: Bytes = response
            .bytes()
            .await
            .map_err(|err| map_error(err, timeout))?;

        Ok(ProbeResponse::new(
            final_url,
            status,
            headers,
            String::from_utf8_lossy(&body).into_owned(),
        ))
    }
}

#[async_trait]
impl ProbeHttpClient for ReqwestProbeClient {
    async fn get(
        &self,
        session: &Session,
        url: &Url,
        timeout: Duration,
    ) -> Result<ProbeResponse, ProbeHttpError> {
        let mut attempt = 0u32;
        loop {
            match self.send_once(session, url, timeout).await {
                // Only connection establishment is retried; nothing reached the
                // server, so the limiter has nothing to record yet.
                Err(ProbeHttpError::Connect(reason)) if attempt < session.max_retries() => {
                    attempt += 1;
                    log::debug!(
                        "[{}] connect to {} failed ({}), retry {}/{}",
                        session.target(),
                        url,
                        reason,
                        attempt,
                        session.max_retries()
                    );
                }
                other => return other,
            }
        }
    }
}

fn map_error(err: reqwest::Error, timeout: Duration) -> ProbeHttpError {
    if err.is_timeout() {
        ProbeHttpError::Timeout(timeout)
    } else if err.is_connect() {
        ProbeHttpError::Connect(err.to_string())
    } else if err.is_builder() {
        ProbeHttpError::InvalidUrl(
            err.url()
                .map(|url| url.to_string())
                .unwrap_or_else(|| err.to_string()),
        )
    } else {
        ProbeHttpError::Transport(err.to_string())
    }
}
