//! Request signatures for the metadata service and the object store.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use hmac::{Hmac, Mac};
use md5::{Digest as _, Md5};
use sha1::Sha1;

use crate::constants::{APP_VERSION, SIG_SUFFIX, TOKEN_SALT};

type HmacSha1 = Hmac<Sha1>;

/// Upper-hex SHA-1 of `data`.
pub fn sha1_upper_hex(data: &[u8]) -> String {
    hex::encode_upper(Sha1::digest(data))
}

/// Registration signature: `SHA1(userKey ‖ sha1(userId ‖ fileId ‖ target ‖ "0") ‖ suffix)`.
pub fn upload_sig(user_id: &str, user_key: &str, file_id: &str, target: &str) -> String {
    let inner = hex::encode(Sha1::digest(format!("{user_id}{file_id}{target}0")));
    sha1_upper_hex(format!("{user_key}{inner}{SIG_SUFFIX}").as_bytes())
}

/// Registration token (lower-hex MD5 over the request parameters).
pub fn upload_token(
    file_id: &str,
    file_size: u64,
    sign_key: &str,
    sign_val: &str,
    user_id: &str,
    timestamp: i64,
) -> String {
    let user_md5 = hex::encode(Md5::digest(user_id.as_bytes()));
    let input = format!(
        "{TOKEN_SALT}{file_id}{file_size}{sign_key}{sign_val}{user_id}{timestamp}{user_md5}{APP_VERSION}"
    );
    hex::encode(Md5::digest(input.as_bytes()))
}

// ---------------------------------------------------------------------------
// Object-store request signing
// ---------------------------------------------------------------------------

/// Builds the canonical string an object-store request is signed over.
///
/// `oss_headers` must hold the `x-oss-*` headers; they are lower-cased and
/// sorted here. `resource` is `/bucket/object` plus any sub-resource query.
pub fn string_to_sign(
    verb: &str,
    content_md5: &str,
    content_type: &str,
    date: &str,
    oss_headers: &[(String, String)],
    resource: &str,
) -> String {
    let mut headers: Vec<(String, &str)> = oss_headers
        .iter()
        .map(|(k, v)| (k.to_ascii_lowercase(), v.trim()))
        .collect();
    headers.sort_by(|a, b| a.0.cmp(&b.0));

    let mut out = format!("{verb}\n{content_md5}\n{content_type}\n{date}\n");
    for (k, v) in headers {
        out.push_str(&k);
        out.push(':');
        out.push_str(v);
        out.push('\n');
    }
    out.push_str(resource);
    out
}

/// Base64 HMAC-SHA1 of `string_to_sign` under `secret`.
pub fn hmac_sha1_base64(secret: &str, string_to_sign: &str) -> String {
    let mut mac =
        HmacSha1::new_from_slice(secret.as_bytes()).expect("HMAC takes keys of any size");
    mac.update(string_to_sign.as_bytes());
    STANDARD.encode(mac.finalize().into_bytes())
}

/// `Authorization` header value for an object-store request.
pub fn authorization(access_key_id: &str, signature: &str) -> String {
    format!("OSS {access_key_id}:{signature}")
}
