//! Read-consistency markers and transaction context reconciliation.
//!
//! A [`LinRead`] maps a group id to the highest index observed for that group.
//! Merging takes the per-key maximum, so merges from concurrent transactions
//! commute and converge regardless of arrival order.

use dgraph_proto::api::{LinRead, TxnContext};

use crate::error::{ClientError, ClientResult};

/// Merges two markers, keeping the highest index per group.
///
/// Groups present in only one input are copied through. Fields other than
/// `ids` are taken from `dst`.
pub fn merge_lin_reads(dst: &LinRead, src: &LinRead) -> LinRead {
    let mut result = dst.clone();
    for (&group, &index) in &src.ids {
        result
            .ids
            .entry(group)
            .and_modify(|current| *current = (*current).max(index))
            .or_insert(index);
    }
    result
}

/// Merges optional markers, treating a missing marker as empty.
pub(crate) fn merge_optional(dst: Option<&LinRead>, src: Option<&LinRead>) -> LinRead {
    match (dst, src) {
        (Some(dst), Some(src)) => merge_lin_reads(dst, src),
        (Some(only), None) | (None, Some(only)) => only.clone(),
        (None, None) => LinRead::default(),
    }
}

/// Comparison helpers for [`LinRead`].
pub trait LinReadExt {
    /// Returns the recorded index for `group`, or 0 if unseen.
    fn index_of(&self, group: u32) -> u64;

    /// Returns true if every group in `other` is matched or exceeded here.
    fn dominates(&self, other: &LinRead) -> bool;
}

impl LinReadExt for LinRead {
    fn index_of(&self, group: u32) -> u64 {
        self.ids.get(&group).copied().unwrap_or(0)
    }

    fn dominates(&self, other: &LinRead) -> bool {
        other
            .ids
            .iter()
            .all(|(&group, &index)| self.index_of(group) >= index)
    }
}

/// Adopts or checks a start timestamp reported by the server.
///
/// A zero local timestamp adopts the remote one. Two non-zero timestamps
/// that differ are a protocol violation.
pub(crate) fn reconcile_start_ts(local: u64, remote: u64) -> ClientResult<u64> {
    match (local, remote) {
        (0, remote) => Ok(remote),
        (local, 0) => Ok(local),
        (local, remote) if local == remote => Ok(local),
        (local, remote) => Err(ClientError::StartTsMismatch { local, remote }),
    }
}

/// Starts a fresh context seeded with `lin_read`.
pub(crate) fn seeded_context(lin_read: LinRead) -> TxnContext {
    TxnContext {
        lin_read: Some(lin_read),
        ..Default::default()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use proptest::prelude::*;

    use super::*;

    fn lin_read(pairs: &[(u32, u64)]) -> LinRead {
        LinRead {
            ids: pairs.iter().copied().collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_merge_lin_reads() {
        let dst = lin_read(&[(1, 10), (2, 15), (3, 10)]);
        let src = lin_read(&[(2, 10), (3, 15), (4, 10)]);

        let result = merge_lin_reads(&dst, &src);

        assert_eq!(result.ids.len(), 4);
        assert_eq!(result.ids[&1], 10);
        assert_eq!(result.ids[&2], 15);
        assert_eq!(result.ids[&3], 15);
        assert_eq!(result.ids[&4], 10);
    }

    #[test]
    fn test_merge_does_not_touch_inputs() {
        let dst = lin_read(&[(1, 1)]);
        let src = lin_read(&[(1, 9)]);
        let _ = merge_lin_reads(&dst, &src);
        assert_eq!(dst.ids[&1], 1);
        assert_eq!(src.ids[&1], 9);
    }

    #[test]
    fn test_merge_optional() {
        let a = lin_read(&[(1, 3)]);
        assert_eq!(merge_optional(Some(&a), None), a);
        assert_eq!(merge_optional(None, Some(&a)), a);
        assert!(merge_optional(None, None).ids.is_empty());
    }

    #[test]
    fn test_dominates() {
        let big = lin_read(&[(1, 10), (2, 20)]);
        let small = lin_read(&[(1, 5)]);
        assert!(big.dominates(&small));
        assert!(!small.dominates(&big));
        assert!(big.dominates(&LinRead::default()));
        assert_eq!(small.index_of(7), 0);
    }

    #[test]
    fn test_reconcile_start_ts() {
        assert_eq!(reconcile_start_ts(0, 42).unwrap(), 42);
        assert_eq!(reconcile_start_ts(42, 42).unwrap(), 42);
        assert_eq!(reconcile_start_ts(42, 0).unwrap(), 42);
        assert!(matches!(
            reconcile_start_ts(42, 43),
            Err(ClientError::StartTsMismatch { local: 42, remote: 43 })
        ));
    }

    fn arb_lin_read() -> impl Strategy<Value = LinRead> {
        proptest::collection::hash_map(0u32..8, 0u64..1_000, 0..8).prop_map(|ids: HashMap<u32, u64>| {
            LinRead {
                ids,
                ..Default::default()
            }
        })
    }

    proptest! {
        #[test]
        fn merge_is_commutative(a in arb_lin_read(), b in arb_lin_read()) {
            prop_assert_eq!(merge_lin_reads(&a, &b), merge_lin_reads(&b, &a));
        }

        #[test]
        fn merge_is_associative(a in arb_lin_read(), b in arb_lin_read(), c in arb_lin_read()) {
            let left = merge_lin_reads(&merge_lin_reads(&a, &b), &c);
            let right = merge_lin_reads(&a, &merge_lin_reads(&b, &c));
            prop_assert_eq!(left, right);
        }

        #[test]
        fn merge_is_idempotent(a in arb_lin_read()) {
            prop_assert_eq!(merge_lin_reads(&a, &a), a);
        }

        #[test]
        fn merge_dominates_both_inputs(a in arb_lin_read(), b in arb_lin_read()) {
            let merged = merge_lin_reads(&a, &b);
            prop_assert!(merged.dominates(&a));
            prop_assert!(merged.dominates(&b));
        }
    }
}
