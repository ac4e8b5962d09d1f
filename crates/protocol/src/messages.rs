use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ProtocolError;
use crate::constants::{
    APP_VERSION, STATUS_CHALLENGE, STATUS_CODE_CHALLENGE, STATUS_DEDUP_HIT, STATUS_UPLOAD_REQUIRED,
};
use crate::signature::{upload_sig, upload_token};

// ---------------------------------------------------------------------------
// Account info
// ---------------------------------------------------------------------------

/// Account identity resolved from a cookie bundle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserInfo {
    #[serde(default)]
    pub user_id: u64,
    #[serde(default, rename = "userkey")]
    pub user_key: String,
}

impl UserInfo {
    /// Returns `true` when the server recognised the cookies.
    pub fn is_valid(&self) -> bool {
        self.user_id != 0 && !self.user_key.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Registration request
// ---------------------------------------------------------------------------

/// Form body of a registration (`initupload`) request.
///
/// The signature fields are derived at construction time; answering a
/// challenge produces a new form with a fresh token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitUploadForm {
    pub user_id: String,
    pub file_name: String,
    pub file_size: u64,
    /// Upper-hex SHA-1 of the whole file.
    pub file_id: String,
    /// Upper-hex SHA-1 of the leading 128 KiB.
    pub pre_id: String,
    pub target: String,
    pub sig: String,
    pub timestamp: i64,
    pub token: String,
    pub sign_key: String,
    pub sign_val: String,
}

impl InitUploadForm {
    /// Builds a first-round registration form.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        user_id: &str,
        user_key: &str,
        file_name: &str,
        file_size: u64,
        file_id: &str,
        pre_id: &str,
        target: &str,
        timestamp: i64,
    ) -> Self {
        let sig = upload_sig(user_id, user_key, file_id, target);
        let token = upload_token(file_id, file_size, "", "", user_id, timestamp);
        Self {
            user_id: user_id.to_string(),
            file_name: file_name.to_string(),
            file_size,
            file_id: file_id.to_string(),
            pre_id: pre_id.to_string(),
            target: target.to_string(),
            sig,
            timestamp,
            token,
            sign_key: String::new(),
            sign_val: String::new(),
        }
    }

    /// Returns a copy of this form carrying a challenge answer.
    pub fn answer_challenge(&self, sign_key: &str, sign_val: &str) -> Self {
        let token = upload_token(
            &self.file_id,
            self.file_size,
            sign_key,
            sign_val,
            &self.user_id,
            self.timestamp,
        );
        Self {
            token,
            sign_key: sign_key.to_string(),
            sign_val: sign_val.to_string(),
            ..self.clone()
        }
    }

    /// Returns `true` if this form answers a challenge.
    pub fn is_challenge_answer(&self) -> bool {
        !self.sign_key.is_empty()
    }

    /// Query-string parameters of the registration URL.
    pub fn query(&self) -> Vec<(&'static str, String)> {
        vec![
            ("isp", "0".into()),
            ("appid", "0".into()),
            ("appversion", APP_VERSION.into()),
            ("format", "json".into()),
            ("sig", self.sig.clone()),
        ]
    }

    /// Form-encoded body fields.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        let mut fields = vec![
            ("appid", "0".to_string()),
            ("appversion", APP_VERSION.to_string()),
            ("userid", self.user_id.clone()),
            ("filename", self.file_name.clone()),
            ("filesize", self.file_size.to_string()),
            ("fileid", self.file_id.clone()),
            ("preid", self.pre_id.clone()),
            ("target", self.target.clone()),
            ("sig", self.sig.clone()),
            ("t", self.timestamp.to_string()),
            ("token", self.token.clone()),
        ];
        if self.is_challenge_answer() {
            fields.push(("sign_key", self.sign_key.clone()));
            fields.push(("sign_val", self.sign_val.clone()));
        }
        fields
    }
}

// ---------------------------------------------------------------------------
// Registration response
// ---------------------------------------------------------------------------

/// Opaque callback descriptor the object store forwards to the metadata service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallbackDescriptor {
    pub callback: String,
    pub callback_var: String,
}

/// Where the bytes of a registered file must be written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectLocation {
    pub bucket: String,
    pub object: String,
    pub callback: CallbackDescriptor,
}

/// Byte range the server wants hashed as proof of possession.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ByteRange {
    pub offset: u64,
    pub length: u64,
}

impl ByteRange {
    /// Parses the `"start-end"` form (inclusive end) used by `sign_check`.
    pub fn parse_sign_check(raw: &str) -> Result<Self, ProtocolError> {
        let (start, end) = raw
            .split_once('-')
            .ok_or_else(|| ProtocolError::InvalidRange(raw.to_string()))?;
        let start: u64 = start
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidRange(raw.to_string()))?;
        let end: u64 = end
            .trim()
            .parse()
            .map_err(|_| ProtocolError::InvalidRange(raw.to_string()))?;
        if end < start {
            return Err(ProtocolError::InvalidRange(raw.to_string()));
        }
        Ok(Self {
            offset: start,
            length: end - start + 1,
        })
    }
}

/// A proof-of-possession request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Challenge {
    pub sign_key: String,
    pub range: ByteRange,
}

/// Interpreted registration reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistrationOutcome {
    /// Identical content is already stored; nothing to transfer.
    DedupHit { pick_code: String },
    /// The server wants a hash over `range` before deciding.
    Challenge(Challenge),
    /// Bytes must be written to the returned location.
    UploadRequired(ObjectLocation),
}

/// Raw registration (`initupload`) reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitUploadResponse {
    #[serde(default)]
    pub status: i64,
    #[serde(default, rename = "statuscode")]
    pub status_code: i64,
    #[serde(default, rename = "statusmsg", skip_serializing_if = "String::is_empty")]
    pub status_msg: String,
    #[serde(default, rename = "pickcode", skip_serializing_if = "String::is_empty")]
    pub pick_code: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub target: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub bucket: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub callback: Option<CallbackDescriptor>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sign_key: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sign_check: String,
}

impl InitUploadResponse {
    /// Classifies the reply.
    ///
    /// Missing fields for the announced status are reported as malformed;
    /// an unknown status is an explicit rejection.
    pub fn outcome(&self) -> Result<RegistrationOutcome, ProtocolError> {
        match self.status {
            STATUS_DEDUP_HIT => Ok(RegistrationOutcome::DedupHit {
                pick_code: self.pick_code.clone(),
            }),
            STATUS_CHALLENGE if self.status_code == STATUS_CODE_CHALLENGE => {
                if self.sign_key.is_empty() {
                    return Err(ProtocolError::MissingField("sign_key"));
                }
                if self.sign_check.is_empty() {
                    return Err(ProtocolError::MissingField("sign_check"));
                }
                let range = ByteRange::parse_sign_check(&self.sign_check)?;
                Ok(RegistrationOutcome::Challenge(Challenge {
                    sign_key: self.sign_key.clone(),
                    range,
                }))
            }
            STATUS_UPLOAD_REQUIRED => {
                if self.bucket.is_empty() {
                    return Err(ProtocolError::MissingField("bucket"));
                }
                if self.object.is_empty() {
                    return Err(ProtocolError::MissingField("object"));
                }
                let callback = self
                    .callback
                    .clone()
                    .filter(|cb| !cb.callback.is_empty())
                    .ok_or(ProtocolError::MissingField("callback"))?;
                Ok(RegistrationOutcome::UploadRequired(ObjectLocation {
                    bucket: self.bucket.clone(),
                    object: self.object.clone(),
                    callback,
                }))
            }
            _ => Err(ProtocolError::UnexpectedStatus {
                status: self.status,
                status_code: self.status_code,
                message: self.status_msg.clone(),
            }),
        }
    }
}

// ---------------------------------------------------------------------------
// Object-store credentials
// ---------------------------------------------------------------------------

/// Raw temporary-credential reply.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OssTokenResponse {
    #[serde(default)]
    pub status_code: String,
    #[serde(default)]
    pub access_key_id: String,
    #[serde(default)]
    pub access_key_secret: String,
    #[serde(default)]
    pub security_token: String,
    #[serde(default)]
    pub expiration: String,
}

impl OssTokenResponse {
    /// Validates the reply and converts it into usable credentials.
    pub fn into_credentials(self) -> Result<Credentials, ProtocolError> {
        if self.access_key_id.is_empty() {
            return Err(ProtocolError::MissingField("AccessKeyId"));
        }
        if self.access_key_secret.is_empty() {
            return Err(ProtocolError::MissingField("AccessKeySecret"));
        }
        if self.security_token.is_empty() {
            return Err(ProtocolError::MissingField("SecurityToken"));
        }
        let expiration = DateTime::parse_from_rfc3339(&self.expiration)
            .map_err(|_| ProtocolError::InvalidTimestamp(self.expiration.clone()))?
            .with_timezone(&Utc);
        Ok(Credentials {
            access_key_id: self.access_key_id,
            access_key_secret: self.access_key_secret,
            security_token: self.security_token,
            expiration,
        })
    }
}

/// Temporary object-store credentials.
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub access_key_id: String,
    pub access_key_secret: String,
    pub security_token: String,
    pub expiration: DateTime<Utc>,
}

impl Credentials {
    /// Returns `true` if the credentials expire before `now + margin`.
    pub fn expires_within(&self, now: DateTime<Utc>, margin: chrono::Duration) -> bool {
        self.expiration <= now + margin
    }
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("access_key_secret", &"<redacted>")
            .field("security_token", &"<redacted>")
            .field("expiration", &self.expiration)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Finalisation callback
// ---------------------------------------------------------------------------

/// Reply relayed by the object store from the metadata service callback.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CallbackReply {
    #[serde(default)]
    pub state: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}
