use serde::{Deserialize, Serialize};

use crate::TransferError;
use crate::policy::PartLayout;

/// Lifecycle state of a transfer session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
}

/// Acknowledgement tag the object store returned for one part.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartTag {
    pub part_number: u32,
    pub tag: String,
}

/// In-memory state of one multipart transfer.
///
/// Completed parts always form the contiguous prefix `1..=k`; parts are
/// recorded strictly in order.
#[derive(Debug, Clone)]
pub struct Session {
    pub key: String,
    pub upload_id: String,
    pub layout: PartLayout,
    pub target_size: u64,
    completed: Vec<PartTag>,
    status: SessionStatus,
}

impl Session {
    /// Creates an active session with no completed parts.
    pub fn new(key: String, upload_id: String, layout: PartLayout, target_size: u64) -> Self {
        Self {
            key,
            upload_id,
            layout,
            target_size,
            completed: Vec::new(),
            status: SessionStatus::Active,
        }
    }

    /// Rebuilds an active session from previously completed parts.
    pub fn restore(
        key: String,
        upload_id: String,
        layout: PartLayout,
        target_size: u64,
        completed: Vec<PartTag>,
    ) -> Result<Self, TransferError> {
        if completed.len() > layout.total_parts as usize {
            return Err(TransferError::CorruptCheckpoint(format!(
                "{} completed parts but only {} planned",
                completed.len(),
                layout.total_parts
            )));
        }
        for (i, part) in completed.iter().enumerate() {
            let expected = i as u32 + 1;
            if part.part_number != expected {
                return Err(TransferError::CorruptCheckpoint(format!(
                    "completed parts are not a contiguous prefix: expected {expected}, found {}",
                    part.part_number
                )));
            }
            if part.tag.is_empty() {
                return Err(TransferError::CorruptCheckpoint(format!(
                    "part {expected} has an empty tag"
                )));
            }
        }

        let mut session = Self::new(key, upload_id, layout, target_size);
        session.completed = completed;
        Ok(session)
    }

    /// Next part to transfer, or `None` once every part is recorded.
    pub fn next_part(&self) -> Option<u32> {
        let next = self.completed_count() + 1;
        (next <= self.layout.total_parts).then_some(next)
    }

    /// Records the tag of the next part.
    pub fn record_part(&mut self, part_number: u32, tag: String) -> Result<(), TransferError> {
        let expected = self.completed_count() + 1;
        if part_number != expected || expected > self.layout.total_parts {
            return Err(TransferError::OutOfOrderPart {
                expected,
                got: part_number,
            });
        }
        self.completed.push(PartTag { part_number, tag });
        Ok(())
    }

    /// Byte range `(offset, length)` of a part.
    pub fn part_range(&self, part_number: u32) -> Option<(u64, u64)> {
        self.layout.range(part_number, self.target_size)
    }

    pub fn completed_parts(&self) -> &[PartTag] {
        &self.completed
    }

    pub fn completed_count(&self) -> u32 {
        self.completed.len() as u32
    }

    /// Bytes covered by the recorded parts.
    pub fn bytes_completed(&self) -> u64 {
        (u64::from(self.completed_count()) * self.layout.part_size).min(self.target_size)
    }

    pub fn is_complete(&self) -> bool {
        self.completed_count() == self.layout.total_parts
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn pause(&mut self) {
        self.status = SessionStatus::Paused;
    }

    pub fn fail(&mut self) {
        self.status = SessionStatus::Failed;
    }

    pub fn complete(&mut self) {
        self.status = SessionStatus::Completed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::PartPolicy;

    fn layout(size: u64, parts: u32) -> PartLayout {
        PartLayout::plan(size, PartPolicy::Fixed(parts), 10_000).unwrap()
    }

    fn tags(n: u32) -> Vec<PartTag> {
        (1..=n)
            .map(|i| PartTag {
                part_number: i,
                tag: format!("\"etag-{i}\""),
            })
            .collect()
    }

    #[test]
    fn new_session_is_active_and_empty() {
        let s = Session::new("f.bin".into(), "u1".into(), layout(100, 4), 100);
        assert_eq!(s.status(), SessionStatus::Active);
        assert_eq!(s.next_part(), Some(1));
        assert_eq!(s.completed_count(), 0);
        assert!(!s.is_complete());
    }

    #[test]
    fn record_parts_in_order() {
        let mut s = Session::new("f.bin".into(), "u1".into(), layout(100, 4), 100);
        for n in 1..=4 {
            assert_eq!(s.next_part(), Some(n));
            s.record_part(n, format!("t{n}")).unwrap();
        }
        assert!(s.is_complete());
        assert_eq!(s.next_part(), None);
        assert_eq!(s.bytes_completed(), 100);
    }

    #[test]
    fn record_out_of_order_rejected() {
        let mut s = Session::new("f.bin".into(), "u1".into(), layout(100, 4), 100);
        s.record_part(1, "t1".into()).unwrap();
        let err = s.record_part(3, "t3".into()).unwrap_err();
        assert!(matches!(
            err,
            TransferError::OutOfOrderPart {
                expected: 2,
                got: 3
            }
        ));
        assert_eq!(s.completed_count(), 1);
    }

    #[test]
    fn record_past_last_part_rejected() {
        let mut s = Session::new("f.bin".into(), "u1".into(), layout(10, 1), 10);
        s.record_part(1, "t".into()).unwrap();
        assert!(s.record_part(2, "t".into()).is_err());
    }

    #[test]
    fn restore_accepts_prefix() {
        let s = Session::restore("f".into(), "u".into(), layout(100, 4), 100, tags(2)).unwrap();
        assert_eq!(s.next_part(), Some(3));
        assert_eq!(s.bytes_completed(), 50);
        assert_eq!(s.status(), SessionStatus::Active);
    }

    #[test]
    fn restore_rejects_gap() {
        let mut parts = tags(3);
        parts.remove(1);
        let err = Session::restore("f".into(), "u".into(), layout(100, 4), 100, parts).unwrap_err();
        assert!(matches!(err, TransferError::CorruptCheckpoint(_)));
    }

    #[test]
    fn restore_rejects_too_many_parts() {
        let err =
            Session::restore("f".into(), "u".into(), layout(100, 4), 100, tags(5)).unwrap_err();
        assert!(matches!(err, TransferError::CorruptCheckpoint(_)));
    }

    #[test]
    fn status_transitions() {
        let mut s = Session::new("f".into(), "u".into(), layout(10, 1), 10);
        s.pause();
        assert_eq!(s.status(), SessionStatus::Paused);
        s.fail();
        assert_eq!(s.status(), SessionStatus::Failed);
        s.complete();
        assert_eq!(s.status(), SessionStatus::Completed);
    }

    #[test]
    fn part_tag_serializes_camel_case() {
        let json = serde_json::to_string(&PartTag {
            part_number: 3,
            tag: "abc".into(),
        })
        .unwrap();
        assert_eq!(json, r#"{"partNumber":3,"tag":"abc"}"#);
    }
}
