//! Credential-injecting [`HttpClient`](crate::fetch::HttpClient) decorators.

mod api_key;
mod refresh_token;
mod url_param;

pub use api_key::ApiKey;
pub use refresh_token::{RefreshToken, TokenEncoding, TokenEndpoint};
pub use url_param::UrlParam;
