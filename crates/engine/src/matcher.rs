//! Exact-match fast path for repeat logins from an unchanged device.

use crate::fingerprint::{Fingerprint, RawEntry};

/// Find the lowest raw index whose stored vector is elementwise-identical
/// to the incoming fingerprint (same length, same values). Scans only
/// array-shaped slots in original order; placeholders and encoded strings
/// are skipped. A hit bypasses the classifier entirely.
pub fn exact_match(raw: &[RawEntry], incoming: &Fingerprint) -> Option<usize> {
    raw.iter().position(|entry| {
        entry
            .as_vector()
            .is_some_and(|stored| stored.as_slice() == incoming.as_slice())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::collection_from_value;
    use serde_json::json;

    #[test]
    fn test_exact_match_lowest_index() {
        let raw = collection_from_value(&json!([[9.0, 9.0], [1.0, 2.0], [1.0, 2.0]]));
        let incoming = Fingerprint(vec![1.0, 2.0]);

        assert_eq!(exact_match(&raw, &incoming), Some(1));
    }

    #[test]
    fn test_exact_match_skips_placeholders() {
        let raw = collection_from_value(&json!([null, "[1, 2]", [1.0, 2.0]]));
        let incoming = Fingerprint(vec![1.0, 2.0]);

        // The encoded string at index 1 is not scanned; only stored arrays are.
        assert_eq!(exact_match(&raw, &incoming), Some(2));
    }

    #[test]
    fn test_exact_match_requires_identical_length() {
        let raw = collection_from_value(&json!([[1.0, 2.0, 3.0]]));

        assert_eq!(exact_match(&raw, &Fingerprint(vec![1.0, 2.0])), None);
        assert_eq!(
            exact_match(&raw, &Fingerprint(vec![1.0, 2.0, 3.0, 4.0])),
            None
        );
    }

    #[test]
    fn test_exact_match_requires_every_feature_equal() {
        let raw = collection_from_value(&json!([[1.0, 2.0, 3.0]]));

        assert_eq!(exact_match(&raw, &Fingerprint(vec![1.0, 2.0, 30.0])), None);
        assert_eq!(
            exact_match(&raw, &Fingerprint(vec![1.0, 2.0, 3.0])),
            Some(0)
        );
    }

    #[test]
    fn test_exact_match_not_found() {
        assert_eq!(exact_match(&[], &Fingerprint(vec![1.0])), None);

        let raw = collection_from_value(&json!([null, "garbage"]));
        assert_eq!(exact_match(&raw, &Fingerprint(vec![1.0])), None);
    }
}
