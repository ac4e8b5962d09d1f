use serde::{Deserialize, Serialize};

use crate::TransferError;

/// Automatic part sizes are multiples of this (1 MiB).
pub const PART_GRANULARITY: u64 = 1024 * 1024;

/// How a file is split into parts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PartPolicy {
    /// Smallest granular part size that keeps the count under the cap.
    #[default]
    Auto,
    /// Exactly this many parts (fewer if the file is too small to fill them).
    Fixed(u32),
}

impl PartPolicy {
    /// Maps a configured part count to a policy; `0` means automatic.
    pub fn from_count(count: u32) -> Self {
        if count == 0 {
            PartPolicy::Auto
        } else {
            PartPolicy::Fixed(count)
        }
    }

    /// Rejects explicit counts outside `[1, cap]`.
    pub fn validate(&self, cap: u32) -> Result<(), TransferError> {
        if cap == 0 {
            return Err(TransferError::InvalidConfiguration(
                "part cap must be at least 1".into(),
            ));
        }
        match *self {
            PartPolicy::Fixed(n) if n == 0 || n > cap => Err(TransferError::InvalidConfiguration(
                format!("part count {n} outside [1, {cap}]"),
            )),
            _ => Ok(()),
        }
    }
}

/// Part size and count for one file.
///
/// Holds `part_size * (total_parts - 1) < size <= part_size * total_parts`
/// for non-empty files; an empty file is a single empty part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartLayout {
    pub part_size: u64,
    pub total_parts: u32,
}

impl PartLayout {
    /// Plans the layout of a `size`-byte file.
    pub fn plan(size: u64, policy: PartPolicy, cap: u32) -> Result<Self, TransferError> {
        policy.validate(cap)?;

        let part_size = match policy {
            PartPolicy::Auto => {
                let minimum = size.div_ceil(u64::from(cap));
                (minimum.div_ceil(PART_GRANULARITY) * PART_GRANULARITY).max(PART_GRANULARITY)
            }
            PartPolicy::Fixed(n) => size.div_ceil(u64::from(n)).max(1),
        };

        let total_parts = size.div_ceil(part_size).max(1);
        let total_parts = u32::try_from(total_parts).map_err(|_| {
            TransferError::InvalidConfiguration(format!("{total_parts} parts exceed u32"))
        })?;

        Ok(Self {
            part_size,
            total_parts,
        })
    }

    /// Rebuilds a layout from persisted values, checking it still fits `size`.
    pub fn restore(part_size: u64, total_parts: u32, size: u64) -> Result<Self, TransferError> {
        let layout = Self {
            part_size,
            total_parts,
        };
        if !layout.holds_for(size) {
            return Err(TransferError::CorruptCheckpoint(format!(
                "{total_parts} parts of {part_size} bytes do not cover {size} bytes"
            )));
        }
        Ok(layout)
    }

    /// Checks the layout invariant against `size`.
    pub fn holds_for(&self, size: u64) -> bool {
        if self.part_size == 0 || self.total_parts == 0 {
            return false;
        }
        if size == 0 {
            return self.total_parts == 1;
        }
        let part_size = u128::from(self.part_size);
        let total = u128::from(self.total_parts);
        let size = u128::from(size);
        part_size * (total - 1) < size && size <= part_size * total
    }

    /// Byte range `(offset, length)` of a 1-based part number.
    pub fn range(&self, part_number: u32, size: u64) -> Option<(u64, u64)> {
        if part_number == 0 || part_number > self.total_parts {
            return None;
        }
        let offset = u64::from(part_number - 1) * self.part_size;
        let length = self.part_size.min(size.saturating_sub(offset));
        Some((offset, length))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIB: u64 = 1024 * 1024;
    const CAP: u32 = 10_000;

    #[test]
    fn fixed_count_even_split() {
        let layout = PartLayout::plan(10 * MIB, PartPolicy::Fixed(10), CAP).unwrap();
        assert_eq!(layout.part_size, MIB);
        assert_eq!(layout.total_parts, 10);
        assert!(layout.holds_for(10 * MIB));
    }

    #[test]
    fn auto_small_file_single_part() {
        let layout = PartLayout::plan(5_000, PartPolicy::Auto, CAP).unwrap();
        assert_eq!(layout.part_size, PART_GRANULARITY);
        assert_eq!(layout.total_parts, 1);
    }

    #[test]
    fn zero_byte_file_is_one_part() {
        for policy in [PartPolicy::Auto, PartPolicy::Fixed(1), PartPolicy::Fixed(50)] {
            let layout = PartLayout::plan(0, policy, CAP).unwrap();
            assert_eq!(layout.total_parts, 1, "{policy:?}");
            assert!(layout.holds_for(0));
            assert_eq!(layout.range(1, 0), Some((0, 0)));
        }
    }

    #[test]
    fn auto_large_file_respects_cap() {
        let size = 20 * 1024 * MIB;
        let layout = PartLayout::plan(size, PartPolicy::Auto, CAP).unwrap();
        assert_eq!(layout.part_size % PART_GRANULARITY, 0);
        assert!(layout.total_parts <= CAP);
        assert!(layout.holds_for(size));
        assert_eq!(layout.part_size, 3 * MIB);
    }

    #[test]
    fn auto_uses_smallest_granular_size() {
        let size = 10_000 * MIB + 1;
        let layout = PartLayout::plan(size, PartPolicy::Auto, CAP).unwrap();
        assert_eq!(layout.part_size, 2 * MIB);
        let below = PartLayout::plan(10_000 * MIB, PartPolicy::Auto, CAP).unwrap();
        assert_eq!(below.part_size, MIB);
        assert_eq!(below.total_parts, CAP);
    }

    #[test]
    fn fixed_count_outside_range_rejected() {
        assert!(matches!(
            PartLayout::plan(100, PartPolicy::Fixed(0), CAP),
            Err(TransferError::InvalidConfiguration(_))
        ));
        assert!(matches!(
            PartLayout::plan(100, PartPolicy::Fixed(CAP + 1), CAP),
            Err(TransferError::InvalidConfiguration(_))
        ));
        assert!(PartLayout::plan(100, PartPolicy::Fixed(CAP), CAP).is_ok());
    }

    #[test]
    fn fixed_count_larger_than_size_shrinks() {
        let layout = PartLayout::plan(3, PartPolicy::Fixed(10), CAP).unwrap();
        assert_eq!(layout.part_size, 1);
        assert_eq!(layout.total_parts, 3);
    }

    #[test]
    fn invariant_holds_across_sizes() {
        let sizes = [1, 2, 99, 100, 101, MIB - 1, MIB, MIB + 1, 7 * MIB, 7 * MIB + 3];
        for size in sizes {
            for policy in [
                PartPolicy::Auto,
                PartPolicy::Fixed(1),
                PartPolicy::Fixed(3),
                PartPolicy::Fixed(7),
                PartPolicy::Fixed(CAP),
            ] {
                let layout = PartLayout::plan(size, policy, CAP).unwrap();
                assert!(layout.holds_for(size), "{size} {policy:?} -> {layout:?}");
            }
        }
    }

    #[test]
    fn ranges_cover_file_exactly() {
        let size = 10 * MIB + 123;
        let layout = PartLayout::plan(size, PartPolicy::Fixed(4), CAP).unwrap();
        let mut expected_offset = 0;
        for n in 1..=layout.total_parts {
            let (offset, len) = layout.range(n, size).unwrap();
            assert_eq!(offset, expected_offset);
            expected_offset += len;
        }
        assert_eq!(expected_offset, size);
        assert!(layout.range(0, size).is_none());
        assert!(layout.range(layout.total_parts + 1, size).is_none());
    }

    #[test]
    fn restore_rejects_layout_that_no_longer_fits() {
        assert!(PartLayout::restore(MIB, 10, 10 * MIB).is_ok());
        assert!(matches!(
            PartLayout::restore(MIB, 10, 5 * MIB),
            Err(TransferError::CorruptCheckpoint(_))
        ));
        assert!(PartLayout::restore(0, 1, 0).is_err());
    }

    #[test]
    fn from_count_maps_zero_to_auto() {
        assert_eq!(PartPolicy::from_count(0), PartPolicy::Auto);
        assert_eq!(PartPolicy::from_count(5), PartPolicy::Fixed(5));
    }
}
