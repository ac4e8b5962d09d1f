//! Metadata service client.
//!
//! Every request carries the account's cookie bundle. Replies are JSON.

use rapidup_protocol::constants::{INIT_UPLOAD_URL, OSS_TOKEN_URL, USER_INFO_URL};
use rapidup_protocol::messages::OssTokenResponse;
use rapidup_protocol::{
    Credentials, InitUploadForm, InitUploadResponse, ProtocolError, RegistrationOutcome, UserInfo,
};
use reqwest::header::{COOKIE, HeaderMap, HeaderValue, USER_AGENT};
use tracing::debug;

use crate::{Error, RetryPolicy, read_body};

/// Metadata service client.
pub struct ApiClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    user_info_url: String,
    init_upload_url: String,
    oss_token_url: String,
}

impl ApiClient {
    /// Creates a client authenticated by `cookies` (a `Cookie` header value).
    pub fn new(cookies: &str, retry: RetryPolicy) -> Result<Self, Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(rapidup_protocol::constants::USER_AGENT),
        );
        headers.insert(
            COOKIE,
            HeaderValue::from_str(cookies.trim()).map_err(|_| Error::InvalidHeader("Cookie"))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            retry,
            user_info_url: USER_INFO_URL.to_string(),
            init_upload_url: INIT_UPLOAD_URL.to_string(),
            oss_token_url: OSS_TOKEN_URL.to_string(),
        })
    }

    /// Points every endpoint at `url` (for testing).
    #[cfg(test)]
    pub(crate) fn with_base_url(mut self, url: &str) -> Self {
        self.user_info_url = format!("{url}/app/uploadinfo");
        self.init_upload_url = format!("{url}/3.0/initupload.php");
        self.oss_token_url = format!("{url}/3.0/gettoken.php");
        self
    }

    /// Resolves the account identity behind the cookie bundle.
    pub async fn user_info(&self) -> Result<UserInfo, Error> {
        let info = self
            .retry
            .run("user_info", move || async move {
                let resp = self.http.get(&self.user_info_url).send().await?;
                let body = read_body(resp).await?;
                Ok::<_, Error>(serde_json::from_slice::<UserInfo>(&body)?)
            })
            .await?;

        if !info.is_valid() {
            return Err(Error::Protocol(ProtocolError::UnexpectedStatus {
                status: 0,
                status_code: 0,
                message: "cookies were not recognised".into(),
            }));
        }
        debug!(user_id = info.user_id, "resolved account");
        Ok(info)
    }

    /// Sends one registration round and classifies the reply.
    ///
    /// Malformed replies are retried with the transport failures; an
    /// explicit rejection is returned as [`ProtocolError::UnexpectedStatus`].
    pub async fn register(&self, form: &InitUploadForm) -> Result<RegistrationOutcome, Error> {
        self.retry
            .run("register", move || async move {
                let resp = self
                    .http
                    .post(&self.init_upload_url)
                    .query(&form.query())
                    .form(&form.fields())
                    .send()
                    .await?;
                let body = read_body(resp).await?;
                let reply: InitUploadResponse = serde_json::from_slice(&body)?;
                debug!(
                    file = %form.file_name,
                    status = reply.status,
                    status_code = reply.status_code,
                    challenge_answer = form.is_challenge_answer(),
                    "registration reply"
                );
                Ok::<_, Error>(reply.outcome()?)
            })
            .await
    }

    /// Fetches temporary object-store credentials.
    pub async fn oss_token(&self) -> Result<Credentials, Error> {
        let credentials = self
            .retry
            .run("oss_token", move || async move {
                let resp = self.http.get(&self.oss_token_url).send().await?;
                let body = read_body(resp).await?;
                let reply: OssTokenResponse = serde_json::from_slice(&body)?;
                Ok::<_, Error>(reply.into_credentials()?)
            })
            .await?;
        debug!(expires = %credentials.expiration, "fetched object-store credentials");
        Ok(credentials)
    }
}
