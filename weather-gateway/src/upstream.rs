//! Shared HTTP plumbing for the upstream clients: timeout-bounded client
//! construction, cancellable GET, and failure classification.

use anyhow::Context;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::UpstreamFailure;

pub(crate) fn http_client(timeout: Duration) -> anyhow::Result<Client> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .context("Failed to build HTTP client")
}

/// Send `request` and decode a 2xx JSON body. Cancelling `cancel` drops the
/// in-flight request.
pub(crate) async fn get_json<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
    cancel: &CancellationToken,
) -> Result<T, UpstreamFailure> {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::debug!(service, "upstream call cancelled");
            Err(UpstreamFailure::Cancelled)
        }
        result = send(service, request) => result,
    }
}

async fn send<T: DeserializeOwned>(
    service: &'static str,
    request: RequestBuilder,
) -> Result<T, UpstreamFailure> {
    let res = request.send().await.map_err(|e| {
        let failure = UpstreamFailure::from_transport(e);
        tracing::warn!(service, error = %failure, "upstream request failed");
        failure
    })?;

    let status = res.status();
    let body = res.text().await.map_err(UpstreamFailure::from_transport)?;

    if !status.is_success() {
        tracing::warn!(service, status = status.as_u16(), "upstream returned error status");
        tracing::debug!(service, body = %truncate_body(&body));
        return Err(UpstreamFailure::Http {
            status: status.as_u16(),
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        tracing::debug!(service, body = %truncate_body(&body), "unparseable upstream body");
        UpstreamFailure::Parse(format!("{service}: {e}"))
    })
}

pub(crate) fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    match body.char_indices().nth(MAX) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
