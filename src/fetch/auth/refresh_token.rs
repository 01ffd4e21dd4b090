use crate::fetch::client::HttpClient;
use async_trait::async_trait;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderValue};
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Tokens are renewed this long before the provider says they expire.
const EXPIRY_MARGIN: Duration = Duration::from_secs(60);

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

/// How the token endpoint wants its parameters encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenEncoding {
    Form,
    Json,
}

/// Where and how to trade a refresh token for an access token.
///
/// `params` must include `grant_type=refresh_token` and the provider's client
/// identification alongside the refresh token itself.
#[derive(Debug, Clone)]
pub struct TokenEndpoint {
    pub url: String,
    pub params: Vec<(String, String)>,
    pub encoding: TokenEncoding,
}

impl TokenEndpoint {
    pub fn new(url: &str, params: &[(&str, &str)], encoding: TokenEncoding) -> Self {
        Self {
            url: url.to_string(),
            params: params
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            encoding,
        }
    }

    fn request(&self) -> reqwest::Result<reqwest::Request> {
        let builder = reqwest::Client::new().post(&self.url);
        let builder = match self.encoding {
            TokenEncoding::Form => builder.form(&self.params),
            TokenEncoding::Json => {
                let body: serde_json::Map<String, serde_json::Value> = self
                    .params
                    .iter()
                    .map(|(k, v)| (k.clone(), serde_json::Value::from(v.as_str())))
                    .collect();
                builder.json(&body)
            }
        };
        builder.build()
    }
}

struct AccessToken {
    header: HeaderValue,
    expires_at: Option<Instant>,
}

impl AccessToken {
    fn is_usable(&self) -> bool {
        self.expires_at
            .is_none_or(|expires_at| Instant::now() + EXPIRY_MARGIN < expires_at)
    }
}

/// An [`HttpClient`] wrapper that authenticates with an OAuth access token
/// obtained from a refresh token.
///
/// The token is fetched on first use and kept until shortly before its
/// `expires_in`. A `401` drops the cached token, fetches a new one and sends
/// the request once more.
pub struct RefreshToken<C> {
    inner: C,
    endpoint: TokenEndpoint,
    token: Mutex<Option<AccessToken>>,
}

impl<C: HttpClient> RefreshToken<C> {
    pub fn new(inner: C, endpoint: TokenEndpoint) -> Self {
        Self {
            inner,
            endpoint,
            token: Mutex::new(None),
        }
    }

    /// Returns the cached `Authorization` header, exchanging the refresh token
    /// first when there is none or it is about to expire.
    async fn authorization(&self, force_refresh: bool) -> reqwest::Result<HeaderValue> {
        let mut token = self.token.lock().await;
        if !force_refresh {
            if let Some(cached) = token.as_ref().filter(|t| t.is_usable()) {
                return Ok(cached.header.clone());
            }
        }

        let fresh = self.exchange().await?;
        let header = fresh.header.clone();
        *token = Some(fresh);
        Ok(header)
    }

    async fn exchange(&self) -> reqwest::Result<AccessToken> {
        let response = self.inner.execute(self.endpoint.request()?).await?;

        let rejected = response.error_for_status_ref().err();
        if let Some(e) = rejected {
            let body = response.text().await.unwrap_or_default();
            warn!(url = %self.endpoint.url, status = ?e.status(), body = %body, "Token exchange failed");
            return Err(e);
        }

        let token: TokenResponse = response.json().await?;
        let mut header = HeaderValue::from_str(&format!("Bearer {}", token.access_token))
            .unwrap_or_else(|e| {
                warn!(error = %e, "Access token is not a valid header value");
                HeaderValue::from_static("Bearer")
            });
        header.set_sensitive(true);

        debug!(expires_in = token.expires_in, "Access token refreshed");
        Ok(AccessToken {
            header,
            expires_at: token
                .expires_in
                .map(|seconds| Instant::now() + Duration::from_secs(seconds)),
        })
    }

    async fn send(
        &self,
        mut req: reqwest::Request,
        authorization: HeaderValue,
    ) -> reqwest::Result<reqwest::Response> {
        req.headers_mut().insert(AUTHORIZATION, authorization);
        self.inner.execute(req).await
    }
}

#[async_trait]
impl<C: HttpClient> HttpClient for RefreshToken<C> {
    async fn execute(&self, req: reqwest::Request) -> reqwest::Result<reqwest::Response> {
        let retry = req.try_clone();
        let resp = self.send(req, self.authorization(false).await?).await?;

        match retry {
            Some(retry) if resp.status() == StatusCode::UNAUTHORIZED => {
                info!(url = %retry.url(), "Access token rejected, refreshing");
                let authorization = self.authorization(true).await?;
                self.send(retry, authorization).await
            }
            _ => Ok(resp),
        }
    }
}
