//! Thin helpers over `reqwest` shared by the release sources and the downloader.
//!
//! Every transport error, non-2xx status and undecodable body is reported as
//! [`NmkupError::FetchFailure`] so callers never have to inspect `reqwest` errors.

use crate::core::NmkupError;
use anyhow::{Context, Result};
use reqwest::header::{HeaderMap, LINK};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

/// Upper bound on pages followed by [`get_json_pages`].
const MAX_PAGES: usize = 50;

/// Build the HTTP client used for one pipeline run.
pub fn build_client(user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .build()
        .context("Failed to build HTTP client")
}

/// `GET url`, failing on transport errors and non-success statuses.
pub async fn get_checked(client: &Client, url: &str) -> Result<Response> {
    debug!("GET {}", url);

    let response = client.get(url).send().await.map_err(|e| NmkupError::FetchFailure {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(NmkupError::FetchFailure {
            url: url.to_string(),
            reason: format!("HTTP {status}"),
        }
        .into());
    }

    Ok(response)
}

/// `GET url` and decode the body as JSON.
pub async fn get_json<T: DeserializeOwned>(client: &Client, url: &str) -> Result<T> {
    let response = get_checked(client, url).await?;
    decode(url, response).await
}

/// `GET url` for a paginated JSON array, following `Link: <..>; rel="next"`
/// headers and concatenating every page in order.
pub async fn get_json_pages<T: DeserializeOwned>(client: &Client, url: &str) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut next = Some(url.to_string());
    let mut pages = 0;

    while let Some(url) = next.take() {
        if pages == MAX_PAGES {
            warn!("Stopped after {} pages; next page was {}", MAX_PAGES, url);
            break;
        }
        pages += 1;

        let response = get_checked(client, &url).await?;
        next = next_link(response.headers());
        let page: Vec<T> = decode(&url, response).await?;
        items.extend(page);
    }

    debug!("Fetched {} items over {} page(s)", items.len(), pages);
    Ok(items)
}

async fn decode<T: DeserializeOwned>(url: &str, response: Response) -> Result<T> {
    let body = response.bytes().await.map_err(|e| NmkupError::FetchFailure {
        url: url.to_string(),
        reason: e.to_string(),
    })?;

    serde_json::from_slice(&body).map_err(|e| {
        NmkupError::FetchFailure {
            url: url.to_string(),
            reason: format!("malformed response: {e}"),
        }
        .into()
    })
}

/// The `rel="next"` target of an RFC 8288 `Link` header.
fn next_link(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(LINK)?.to_str().ok()?;
    value.split(',').find_map(|link| {
        let (target, params) = link.split_once(';')?;
        params
            .split(';')
            .any(|param| matches!(param.trim(), r#"rel="next""# | "rel=next"))
            .then(|| target.trim().trim_start_matches('<').trim_end_matches('>').to_string())
    })
}
