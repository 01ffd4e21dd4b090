use async_trait::async_trait;
use reqwest::{Request, Response};

/// The one seam every provider client sends requests through.
///
/// Decorators in [`crate::fetch::auth`] and [`crate::fetch::Retry`] wrap an
/// inner client and add credentials or retries.
#[async_trait]
pub trait HttpClient: Send + Sync {
    async fn execute(&self, req: Request) -> reqwest::Result<Response>;
}
