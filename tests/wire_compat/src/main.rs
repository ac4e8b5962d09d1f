fn main() {
    println!("Run `cargo test -p wire-compat` to execute wire compatibility tests.");
}

#[cfg(test)]
mod tests {
    use std::fs;
    use std::path::PathBuf;

    use rapidup_protocol::messages::OssTokenResponse;
    use rapidup_protocol::{CallbackReply, InitUploadResponse, RegistrationOutcome, UserInfo};
    use rapidup_transfer::{Checkpoint, SessionStatus};

    /// Returns the path to the fixtures directory.
    fn fixtures_dir() -> PathBuf {
        PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("fixtures")
    }

    /// Loads a fixture JSON file and returns it as a `serde_json::Value`.
    fn load_fixture(name: &str) -> serde_json::Value {
        let path = fixtures_dir().join(name);
        let data = fs::read_to_string(&path)
            .unwrap_or_else(|e| panic!("failed to read fixture {}: {e}", path.display()));
        serde_json::from_str(&data)
            .unwrap_or_else(|e| panic!("failed to parse fixture {}: {e}", path.display()))
    }

    fn parse<T: serde::de::DeserializeOwned>(name: &str) -> T {
        serde_json::from_value(load_fixture(name))
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"))
    }

    /// Deserializes a fixture into a Rust type, re-serializes it, and compares
    /// the JSON values (order-independent comparison).
    fn roundtrip_test<T>(name: &str)
    where
        T: serde::de::DeserializeOwned + serde::Serialize,
    {
        let fixture = load_fixture(name);
        let parsed: T = serde_json::from_value(fixture.clone())
            .unwrap_or_else(|e| panic!("failed to deserialize {name}: {e}"));
        let reserialized = serde_json::to_value(&parsed)
            .unwrap_or_else(|e| panic!("failed to re-serialize {name}: {e}"));
        assert_eq!(
            fixture, reserialized,
            "roundtrip mismatch for {name}:\n  wire: {fixture}\n  Rust: {reserialized}"
        );
    }

    // --- Registration replies ---

    #[test]
    fn fixture_init_upload_dedup_hit() {
        roundtrip_test::<InitUploadResponse>("init_upload_dedup_hit.json");
        let resp: InitUploadResponse = parse("init_upload_dedup_hit.json");
        assert_eq!(
            resp.outcome().unwrap(),
            RegistrationOutcome::DedupHit {
                pick_code: "ecjq9ichcb40lzlvx".into()
            }
        );
    }

    #[test]
    fn fixture_init_upload_challenge() {
        roundtrip_test::<InitUploadResponse>("init_upload_challenge.json");
        let resp: InitUploadResponse = parse("init_upload_challenge.json");
        let RegistrationOutcome::Challenge(challenge) = resp.outcome().unwrap() else {
            panic!("expected challenge");
        };
        assert_eq!(challenge.range.offset, 2_392_148);
        assert_eq!(challenge.range.length, 151);
    }

    #[test]
    fn fixture_init_upload_required() {
        roundtrip_test::<InitUploadResponse>("init_upload_required.json");
        let resp: InitUploadResponse = parse("init_upload_required.json");
        let RegistrationOutcome::UploadRequired(location) = resp.outcome().unwrap() else {
            panic!("expected upload location");
        };
        assert_eq!(location.bucket, "fhnfile");
        assert!(location.callback.callback.contains("callbackUrl"));
        assert!(location.callback.callback_var.contains("x:user_id"));
    }

    #[test]
    fn fixture_init_upload_rejected() {
        roundtrip_test::<InitUploadResponse>("init_upload_rejected.json");
        let resp: InitUploadResponse = parse("init_upload_rejected.json");
        let err = resp.outcome().unwrap_err();
        assert!(!err.is_malformed());
        assert!(err.to_string().contains("account limit"));
    }

    // --- Account and credentials ---

    #[test]
    fn fixture_user_info() {
        roundtrip_test::<UserInfo>("user_info.json");
        let info: UserInfo = parse("user_info.json");
        assert!(info.is_valid());
        assert_eq!(info.user_id, 123_456);
    }

    #[test]
    fn fixture_oss_token() {
        roundtrip_test::<OssTokenResponse>("oss_token.json");
        let creds = parse::<OssTokenResponse>("oss_token.json")
            .into_credentials()
            .unwrap();
        assert_eq!(creds.access_key_id, "STS.NTqRr5zZ9eZ3");
        assert_eq!(creds.expiration.to_rfc3339(), "2024-05-01T08:30:00+00:00");
    }

    #[test]
    fn fixture_callback_reply() {
        roundtrip_test::<CallbackReply>("callback_reply.json");
        let reply: CallbackReply = parse("callback_reply.json");
        assert!(reply.state);
    }

    // --- Checkpoint record ---

    #[test]
    fn fixture_checkpoint() {
        roundtrip_test::<Checkpoint>("checkpoint.json");
        let checkpoint: Checkpoint = parse("checkpoint.json");
        let session = checkpoint.to_session("movie.mkv").unwrap();
        assert_eq!(session.completed_count(), 4);
        assert_eq!(session.next_part(), Some(5));
        assert_eq!(session.status(), SessionStatus::Active);
        assert_eq!(session.part_range(10), Some((9 * 1_048_576, 1_048_576)));
    }
}
