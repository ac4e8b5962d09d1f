/// Account info endpoint (resolves `user_id` / `userkey` from cookies).
pub const USER_INFO_URL: &str = "https://proapi.115.com/app/uploadinfo";

/// Registration endpoint of the dedup protocol.
pub const INIT_UPLOAD_URL: &str = "https://uplb.115.com/3.0/initupload.php";

/// Temporary object-store credential endpoint.
pub const OSS_TOKEN_URL: &str = "https://uplb.115.com/3.0/gettoken.php";

/// Public object-store endpoint.
pub const OSS_ENDPOINT: &str = "https://oss-cn-shenzhen.aliyuncs.com";

/// Intranet object-store endpoint (only reachable from inside the provider's network).
pub const OSS_INTERNAL_ENDPOINT: &str = "https://oss-cn-shenzhen-internal.aliyuncs.com";

/// Client version announced to the metadata service.
pub const APP_VERSION: &str = "29.0.0";

/// User agent for metadata service requests.
pub const USER_AGENT: &str = concat!("Mozilla/5.0 115disk/", "29.0.0");

/// User agent for object-store requests.
pub const OSS_USER_AGENT: &str = "aliyun-sdk-android/2.9.1";

/// Suffix appended to the registration signature input.
pub const SIG_SUFFIX: &str = "000000";

/// Salt prefixed to the registration token input.
pub const TOKEN_SALT: &str = "Qclm8MGWUv59TnrR0XPg";

/// Prefix of the destination string sent at registration.
pub const TARGET_PREFIX: &str = "U_1_";

/// Number of leading bytes covered by the quick hash (128 KiB).
pub const QUICK_HASH_LEN: u64 = 128 * 1024;

/// Hard cap on the number of parts in one multipart transaction.
pub const MAX_PARTS: u32 = 10_000;

/// Registration status: content already stored remotely.
pub const STATUS_DEDUP_HIT: i64 = 2;

/// Registration status: bytes must be transferred.
pub const STATUS_UPLOAD_REQUIRED: i64 = 1;

/// Registration status: proof of possession requested.
pub const STATUS_CHALLENGE: i64 = 7;

/// Status code accompanying [`STATUS_CHALLENGE`].
pub const STATUS_CODE_CHALLENGE: i64 = 701;

/// Returns the destination string for a remote container id.
pub fn target_for(container_id: u64) -> String {
    format!("{TARGET_PREFIX}{container_id}")
}
