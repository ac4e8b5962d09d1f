//! Object-store client.
//!
//! Requests are signed with the temporary credentials issued by the
//! metadata service (HMAC-SHA1 over the canonical request, security token
//! in `x-oss-security-token`). Credentials are passed per call so the
//! caller can refresh them between parts.

use std::path::Path;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use rapidup_protocol::constants::OSS_USER_AGENT;
use rapidup_protocol::oss::parse_initiate;
use rapidup_protocol::signature::{authorization, hmac_sha1_base64, string_to_sign};
use rapidup_protocol::{
    CallbackDescriptor, CallbackReply, CompleteMultipartUpload, CompletedPart, Credentials,
    ProtocolError,
};
use reqwest::header::{
    AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE, DATE, ETAG, HeaderMap, HeaderValue, USER_AGENT,
};
use reqwest::{Body, Method, RequestBuilder, Url};
use tokio_util::io::ReaderStream;
use tracing::debug;

use crate::{Error, RetryPolicy, read_body};

const CONTENT_TYPE_OCTET: &str = "application/octet-stream";
const CONTENT_TYPE_XML: &str = "application/xml";

/// Object-store client.
pub struct OssClient {
    http: reqwest::Client,
    retry: RetryPolicy,
    endpoint: Url,
    path_style: bool,
}

impl OssClient {
    /// Creates a client for `endpoint` using virtual-hosted bucket URLs.
    pub fn new(endpoint: &str, retry: RetryPolicy) -> Result<Self, Error> {
        let endpoint =
            Url::parse(endpoint).map_err(|e| Error::InvalidEndpoint(format!("{endpoint}: {e}")))?;
        if endpoint.host_str().is_none() {
            return Err(Error::InvalidEndpoint(endpoint.to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static(OSS_USER_AGENT));
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            retry,
            endpoint,
            path_style: false,
        })
    }

    /// Addresses buckets as `/{bucket}/{object}` paths (for testing).
    #[cfg(test)]
    pub(crate) fn with_path_style(mut self) -> Self {
        self.path_style = true;
        self
    }

    /// Opens a multipart transaction and returns its upload id.
    pub async fn initiate_multipart(
        &self,
        bucket: &str,
        object: &str,
        credentials: &Credentials,
    ) -> Result<String, Error> {
        let upload_id = self
            .retry
            .run("initiate_multipart", move || async move {
                let req = self.signed(
                    Method::POST,
                    bucket,
                    object,
                    "uploads",
                    "",
                    Vec::new(),
                    credentials,
                )?;
                let body = read_body(req.send().await?).await?;
                let reply = parse_initiate(&String::from_utf8_lossy(&body))?;
                if reply.upload_id.is_empty() {
                    return Err(Error::Protocol(ProtocolError::MissingField("UploadId")));
                }
                Ok::<_, Error>(reply.upload_id)
            })
            .await?;
        debug!(bucket, object, upload_id = %upload_id, "multipart transaction opened");
        Ok(upload_id)
    }

    /// Uploads one part and returns the integrity tag (`ETag`) assigned to it.
    pub async fn upload_part(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        part_number: u32,
        data: &[u8],
        credentials: &Credentials,
    ) -> Result<String, Error> {
        let sub = format!("partNumber={part_number}&uploadId={upload_id}");
        let sub = sub.as_str();
        self.retry
            .run("upload_part", move || async move {
                let req = self
                    .signed(
                        Method::PUT,
                        bucket,
                        object,
                        sub,
                        CONTENT_TYPE_OCTET,
                        Vec::new(),
                        credentials,
                    )?
                    .body(data.to_vec());
                let resp = req.send().await?;
                let etag = resp
                    .headers()
                    .get(ETAG)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_string);
                read_body(resp).await?;
                let etag = etag.filter(|t| !t.is_empty()).ok_or(Error::MissingHeader("ETag"))?;
                debug!(part = part_number, bytes = data.len(), etag = %etag, "part uploaded");
                Ok::<_, Error>(etag)
            })
            .await
    }

    /// Completes a multipart transaction.
    ///
    /// `parts` must be in ascending part-number order. The object store
    /// relays the metadata service callback; its reply must report success.
    pub async fn complete_multipart(
        &self,
        bucket: &str,
        object: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        callback: &CallbackDescriptor,
        credentials: &Credentials,
    ) -> Result<CallbackReply, Error> {
        let xml = CompleteMultipartUpload {
            parts: parts.to_vec(),
        }
        .to_xml()?;
        let sub = format!("uploadId={upload_id}");
        let (sub, xml) = (sub.as_str(), xml.as_str());
        let reply = self
            .retry
            .run("complete_multipart", move || async move {
                let req = self
                    .signed(
                        Method::POST,
                        bucket,
                        object,
                        sub,
                        CONTENT_TYPE_XML,
                        callback_headers(callback),
                        credentials,
                    )?
                    .body(xml.to_string());
                let body = read_body(req.send().await?).await?;
                Ok::<_, Error>(serde_json::from_slice::<CallbackReply>(&body)?)
            })
            .await?;
        check_callback(reply)
    }

    /// Uploads a whole object in one request, streaming the body from `path`.
    ///
    /// The file is reopened for every attempt and must be `size` bytes long.
    #[allow(clippy::too_many_arguments)]
    pub async fn put_object(
        &self,
        bucket: &str,
        object: &str,
        path: &Path,
        size: u64,
        callback: &CallbackDescriptor,
        credentials: &Credentials,
    ) -> Result<CallbackReply, Error> {
        let reply = self
            .retry
            .run("put_object", move || async move {
                let file = tokio::fs::File::open(path).await?;
                let req = self
                    .signed(
                        Method::PUT,
                        bucket,
                        object,
                        "",
                        CONTENT_TYPE_OCTET,
                        callback_headers(callback),
                        credentials,
                    )?
                    .header(CONTENT_LENGTH, size)
                    .body(Body::wrap_stream(ReaderStream::new(file)));
                let body = read_body(req.send().await?).await?;
                Ok::<_, Error>(serde_json::from_slice::<CallbackReply>(&body)?)
            })
            .await?;
        debug!(bucket, object, bytes = size, "object uploaded");
        check_callback(reply)
    }

    /// URL of `object` in `bucket`, with `sub_resource` as the query.
    fn object_url(&self, bucket: &str, object: &str, sub_resource: &str) -> Result<Url, Error> {
        let mut url = self.endpoint.clone();
        if self.path_style {
            url.set_path(&format!("/{bucket}/{object}"));
        } else {
            let host = url
                .host_str()
                .ok_or_else(|| Error::InvalidEndpoint(self.endpoint.to_string()))?;
            let host = format!("{bucket}.{host}");
            url.set_host(Some(&host))
                .map_err(|e| Error::InvalidEndpoint(format!("{host}: {e}")))?;
            url.set_path(&format!("/{object}"));
        }
        url.set_query((!sub_resource.is_empty()).then_some(sub_resource));
        Ok(url)
    }

    /// Builds a request carrying `Date` and `Authorization` headers.
    #[allow(clippy::too_many_arguments)]
    fn signed(
        &self,
        method: Method,
        bucket: &str,
        object: &str,
        sub_resource: &str,
        content_type: &str,
        mut oss_headers: Vec<(String, String)>,
        credentials: &Credentials,
    ) -> Result<RequestBuilder, Error> {
        oss_headers.push((
            "x-oss-security-token".to_string(),
            credentials.security_token.clone(),
        ));

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let mut resource = format!("/{bucket}/{object}");
        if !sub_resource.is_empty() {
            resource.push('?');
            resource.push_str(sub_resource);
        }
        let to_sign = string_to_sign(
            method.as_str(),
            "",
            content_type,
            &date,
            &oss_headers,
            &resource,
        );
        let signature = hmac_sha1_base64(&credentials.access_key_secret, &to_sign);

        let url = self.object_url(bucket, object, sub_resource)?;
        let mut req = self
            .http
            .request(method, url)
            .header(DATE, date)
            .header(
                AUTHORIZATION,
                authorization(&credentials.access_key_id, &signature),
            );
        if !content_type.is_empty() {
            req = req.header(CONTENT_TYPE, content_type);
        }
        for (name, value) in oss_headers {
            req = req.header(name, value);
        }
        Ok(req)
    }
}

/// Base64-encoded callback headers of a finalising request.
fn callback_headers(callback: &CallbackDescriptor) -> Vec<(String, String)> {
    let mut headers = vec![(
        "x-oss-callback".to_string(),
        STANDARD.encode(callback.callback.as_bytes()),
    )];
    if !callback.callback_var.is_empty() {
        headers.push((
            "x-oss-callback-var".to_string(),
            STANDARD.encode(callback.callback_var.as_bytes()),
        ));
    }
    headers
}

fn check_callback(reply: CallbackReply) -> Result<CallbackReply, Error> {
    if !reply.state {
        let message = if reply.message.is_empty() {
            "callback reported failure".to_string()
        } else {
            reply.message
        };
        return Err(Error::CallbackRejected(message));
    }
    Ok(reply)
}
