//! HTTP clients for the metadata service and the object store.
//!
//! [`ApiClient`] speaks to the metadata service with a cookie bundle;
//! [`OssClient`] speaks to the object store with temporary credentials and
//! signs every request. Both retry transport failures through a shared
//! [`RetryPolicy`].

pub mod api;
pub mod oss;
pub mod retry;

pub use api::ApiClient;
pub use oss::OssClient;
pub use retry::RetryPolicy;

use rapidup_protocol::ProtocolError;

/// Errors from the remote clients.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error {status}: {body}")]
    Api { status: u16, body: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::DeError),

    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("response is missing the {0} header")]
    MissingHeader(&'static str),

    #[error("upload callback rejected: {0}")]
    CallbackRejected(String),

    #[error("invalid header value for {0}")]
    InvalidHeader(&'static str),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if repeating the same request may succeed.
    ///
    /// Connection failures, server-side errors and malformed replies are
    /// retryable; explicit rejections and client errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::Json(_) | Error::Xml(_) | Error::MissingHeader(_) => true,
            Error::Api { status, .. } => *status >= 500 || *status == 408 || *status == 429,
            Error::Protocol(e) => e.is_malformed(),
            Error::CallbackRejected(_)
            | Error::InvalidHeader(_)
            | Error::InvalidEndpoint(_)
            | Error::Io(_) => false,
        }
    }
}

/// Reads a response body, turning non-2xx statuses into [`Error::Api`].
pub(crate) async fn read_body(resp: reqwest::Response) -> Result<Vec<u8>, Error> {
    let status = resp.status();
    if !status.is_success() {
        let body = resp.text().await.unwrap_or_default();
        let body = match rapidup_protocol::oss::parse_error(&body) {
            Some(doc) if !doc.code.is_empty() => format!("{}: {}", doc.code, doc.message),
            _ => body,
        };
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(resp.bytes().await?.to_vec())
}
