//! Replace-or-append mutation of the stored fingerprint collection.

use crate::error::Result;
use crate::fingerprint::{Fingerprint, RawEntry};
use crate::store::AccountStore;

/// Produce an updated copy of the raw collection.
///
/// An in-bounds target overwrites only that slot; every other position,
/// placeholders included, is carried over untouched. No target (or an
/// out-of-bounds one, which callers produce when an index mapping is
/// absent) appends the fingerprint as a new final entry.
pub fn apply(raw: &[RawEntry], target: Option<usize>, fp: &Fingerprint) -> Vec<RawEntry> {
    let mut updated = raw.to_vec();
    match target {
        Some(idx) if idx < updated.len() => updated[idx] = RawEntry::Vector(fp.clone()),
        _ => updated.push(RawEntry::Vector(fp.clone())),
    }
    updated
}

/// Apply the mutation and persist the full updated collection in one store
/// call. Persistence failure propagates to the caller.
pub async fn persist(
    store: &dyn AccountStore,
    account_id: &str,
    raw: &[RawEntry],
    target: Option<usize>,
    fp: &Fingerprint,
) -> Result<Vec<RawEntry>> {
    let updated = apply(raw, target, fp);
    store.update_fingerprints(account_id, &updated).await?;
    tracing::debug!(
        account_id,
        slot = ?target,
        len = updated.len(),
        "fingerprint collection persisted"
    );
    Ok(updated)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::collection_from_value;
    use serde_json::json;

    #[test]
    fn test_replace_changes_only_target_slot() {
        let raw = collection_from_value(&json!([null, [1.0, 2.0], "junk", [3.0, 4.0]]));
        let fp = Fingerprint(vec![9.0, 9.0]);

        let updated = apply(&raw, Some(1), &fp);

        assert_eq!(updated.len(), raw.len());
        assert_eq!(updated[0], raw[0]);
        assert_eq!(updated[1], RawEntry::Vector(fp));
        assert_eq!(updated[2], raw[2]);
        assert_eq!(updated[3], raw[3]);
    }

    #[test]
    fn test_append_adds_exactly_one_entry() {
        let raw = collection_from_value(&json!([null, [1.0, 2.0]]));
        let fp = Fingerprint(vec![9.0]);

        let updated = apply(&raw, None, &fp);

        assert_eq!(updated.len(), raw.len() + 1);
        assert_eq!(&updated[..raw.len()], &raw[..]);
        assert_eq!(updated[2], RawEntry::Vector(fp));
    }

    #[test]
    fn test_out_of_bounds_target_appends() {
        let raw = collection_from_value(&json!([[1.0]]));
        let fp = Fingerprint(vec![2.0]);

        let updated = apply(&raw, Some(5), &fp);

        assert_eq!(updated.len(), 2);
        assert_eq!(updated[0], raw[0]);
        assert_eq!(updated[1], RawEntry::Vector(fp));
    }

    #[test]
    fn test_apply_on_empty_collection() {
        let fp = Fingerprint(vec![1.0]);
        let updated = apply(&[], None, &fp);
        assert_eq!(updated, vec![RawEntry::Vector(fp)]);
    }
}
