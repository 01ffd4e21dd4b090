mod basic;
mod client;
mod retry;
pub mod auth;

pub use basic::BasicClient;
pub use client::HttpClient;
pub use retry::{RETRY_STATUSES, Retry};

use anyhow::{Context, Result, anyhow};
use serde::Serialize;
use serde::de::DeserializeOwned;

/// GETs `url` and decodes the JSON body, failing on non-success statuses.
pub async fn fetch_json<C: HttpClient + ?Sized, T: DeserializeOwned>(
    client: &C,
    url: &str,
) -> Result<T> {
    let req = reqwest::Request::new(reqwest::Method::GET, url.parse()?);
    let resp = client.execute(req).await?;
    decode(resp, url).await
}

/// POSTs `body` as JSON to `url` and decodes the JSON response.
pub async fn post_json<C: HttpClient + ?Sized, B: Serialize + ?Sized, T: DeserializeOwned>(
    client: &C,
    url: &str,
    body: &B,
) -> Result<T> {
    let mut req = reqwest::Request::new(reqwest::Method::POST, url.parse()?);
    req.headers_mut().insert(
        reqwest::header::CONTENT_TYPE,
        reqwest::header::HeaderValue::from_static("application/json"),
    );
    *req.body_mut() = Some(serde_json::to_vec(body)?.into());

    let resp = client.execute(req).await?;
    decode(resp, url).await
}

async fn decode<T: DeserializeOwned>(resp: reqwest::Response, url: &str) -> Result<T> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        return Err(anyhow!("{url} returned status {status}: {body}"));
    }

    let bytes = resp.bytes().await?;
    serde_json::from_slice(&bytes).with_context(|| format!("Failed to parse response from {url}"))
}
