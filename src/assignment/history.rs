//! Per-user assignment chains: insert-or-collapse writes and
//! point-in-time reads.
//!
//! Each user's history is a sentinel-terminated chain of packed facts,
//! newest first, kept in non-increasing order of effective-from
//! timestamp. Reads walk the chain and take the first fact that had
//! already taken effect; writes either overwrite the pending head fact
//! or prepend exactly one node.

use thiserror::Error;

use super::fact::{AssignmentFact, FACT_SENTINEL};
use super::{partners, PartnerId, Timestamp, UserId};
use crate::storage::StateStore;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum LogError {
    #[error("partner {0} is not registered")]
    PartnerNotRegistered(PartnerId),
    #[error("assignment for period {target} would precede the head fact at {head}")]
    OutOfOrderAssignment { target: Timestamp, head: Timestamp },
}

/// Result of a write against a user's chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// A fact took (or will take) effect at the contained period start.
    Recorded(Timestamp),
    /// The head fact already names this partner; nothing was written.
    Unchanged,
}

/// Partner in effect for `user` during the period starting at
/// `period_start`, or `None` if no fact had taken effect yet.
///
/// The walk exits on the first fact whose effective-from is at or before
/// the query, which is the most recent applicable one as long as the
/// chain's ordering invariant holds.
pub fn value_at<S: StateStore>(
    store: &S,
    user: UserId,
    period_start: Timestamp,
) -> Option<PartnerId> {
    let mut cursor = store.fact_link(user, FACT_SENTINEL)?;
    while cursor != FACT_SENTINEL {
        let fact = AssignmentFact::decode(cursor);
        if period_start >= fact.effective_from() {
            return Some(fact.partner());
        }
        cursor = store.fact_link(user, cursor).unwrap_or(FACT_SENTINEL);
    }
    None
}

/// Element-wise [`value_at`]; result index `i` answers for `users[i]`.
pub fn value_at_batch<S: StateStore>(
    store: &S,
    users: &[UserId],
    period_start: Timestamp,
) -> Vec<Option<PartnerId>> {
    users
        .iter()
        .map(|&user| value_at(store, user, period_start))
        .collect()
}

/// The subsequence of `users` whose value at `period_start` equals
/// `partner`. Preserves input order and does not deduplicate.
pub fn users_with_value_at<S: StateStore>(
    store: &S,
    users: &[UserId],
    partner: PartnerId,
    period_start: Timestamp,
) -> Vec<UserId> {
    users
        .iter()
        .copied()
        .filter(|&user| value_at(store, user, period_start) == Some(partner))
        .collect()
}

/// Number of facts in `user`'s chain.
pub fn chain_len<S: StateStore>(store: &S, user: UserId) -> usize {
    let mut len = 0;
    let mut cursor = match store.fact_link(user, FACT_SENTINEL) {
        Some(head) => head,
        None => return 0,
    };
    while cursor != FACT_SENTINEL {
        len += 1;
        cursor = store.fact_link(user, cursor).unwrap_or(FACT_SENTINEL);
    }
    len
}

/// Records that `partner` takes effect for `user` at `target_start`.
///
/// Collapse rules, judged against the head fact only:
/// - same partner: no-op ([`WriteOutcome::Unchanged`]);
/// - same period start: the pending head is replaced in place and the
///   chain length does not change;
/// - strictly newer period: a node is prepended;
/// - strictly older period: rejected, since accepting it would break the
///   chain's non-increasing ordering and make reads return stale facts.
pub fn record<S: StateStore>(
    store: &mut S,
    user: UserId,
    partner: PartnerId,
    target_start: Timestamp,
) -> Result<WriteOutcome, LogError> {
    if !partners::is_member(store, partner) {
        return Err(LogError::PartnerNotRegistered(partner));
    }

    let new_fact = AssignmentFact::new(partner, target_start).encode();
    let head = match store.fact_link(user, FACT_SENTINEL) {
        None => {
            store.set_fact_link(user, FACT_SENTINEL, new_fact);
            store.set_fact_link(user, new_fact, FACT_SENTINEL);
            return Ok(WriteOutcome::Recorded(target_start));
        }
        Some(head) => head,
    };

    let head_fact = AssignmentFact::decode(head);
    if head_fact.partner() == partner {
        return Ok(WriteOutcome::Unchanged);
    }

    if head_fact.effective_from() == target_start {
        // The head fact targets the same not-yet-effective period; swap
        // it out without growing the chain.
        let successor = store.fact_link(user, head).unwrap_or(FACT_SENTINEL);
        store.clear_fact_link(user, head);
        store.set_fact_link(user, new_fact, successor);
        store.set_fact_link(user, FACT_SENTINEL, new_fact);
    } else if head_fact.effective_from() < target_start {
        store.set_fact_link(user, new_fact, head);
        store.set_fact_link(user, FACT_SENTINEL, new_fact);
    } else {
        return Err(LogError::OutOfOrderAssignment {
            target: target_start,
            head: head_fact.effective_from(),
        });
    }

    Ok(WriteOutcome::Recorded(target_start))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn store_with_partners(ids: &[PartnerId]) -> MemoryStore {
        let mut store = MemoryStore::new();
        for &id in ids {
            partners::insert(&mut store, id).unwrap();
        }
        store
    }

    #[test]
    fn test_empty_history_has_no_value() {
        let store = MemoryStore::new();
        assert_eq!(value_at(&store, 1, 500), None);
        assert_eq!(chain_len(&store, 1), 0);
    }

    #[test]
    fn test_unregistered_partner_is_rejected() {
        let mut store = MemoryStore::new();
        assert_eq!(
            record(&mut store, 1, 10, 100),
            Err(LogError::PartnerNotRegistered(10))
        );
        assert_eq!(chain_len(&store, 1), 0);
    }

    #[test]
    fn test_first_fact_applies_from_its_period_onward() {
        let mut store = store_with_partners(&[10]);
        record(&mut store, 1, 10, 100).unwrap();

        assert_eq!(value_at(&store, 1, 99), None);
        assert_eq!(value_at(&store, 1, 100), Some(10));
        // Far-future queries inherit the last known fact.
        assert_eq!(value_at(&store, 1, 1_000_000), Some(10));
    }

    #[test]
    fn test_same_partner_write_is_a_no_op() {
        let mut store = store_with_partners(&[10]);
        assert_eq!(
            record(&mut store, 1, 10, 100).unwrap(),
            WriteOutcome::Recorded(100)
        );
        assert_eq!(record(&mut store, 1, 10, 100).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(record(&mut store, 1, 10, 200).unwrap(), WriteOutcome::Unchanged);
        assert_eq!(chain_len(&store, 1), 1);
    }

    #[test]
    fn test_pending_head_collapses_in_place() {
        let mut store = store_with_partners(&[10, 20]);
        record(&mut store, 1, 10, 100).unwrap();
        record(&mut store, 1, 20, 100).unwrap();

        assert_eq!(chain_len(&store, 1), 1);
        assert_eq!(value_at(&store, 1, 100), Some(20));
        // The replaced fact's link entry is gone.
        let old = AssignmentFact::new(10, 100).encode();
        assert_eq!(store.fact_link(1, old), None);
    }

    #[test]
    fn test_new_period_prepends() {
        let mut store = store_with_partners(&[10, 20]);
        record(&mut store, 1, 10, 100).unwrap();
        record(&mut store, 1, 20, 900).unwrap();

        assert_eq!(chain_len(&store, 1), 2);
        assert_eq!(value_at(&store, 1, 100), Some(10));
        assert_eq!(value_at(&store, 1, 899), Some(10));
        assert_eq!(value_at(&store, 1, 900), Some(20));
    }

    #[test]
    fn test_out_of_order_write_is_rejected_without_side_effects() {
        let mut store = store_with_partners(&[10, 20]);
        record(&mut store, 1, 10, 900).unwrap();
        assert_eq!(
            record(&mut store, 1, 20, 100),
            Err(LogError::OutOfOrderAssignment { target: 100, head: 900 })
        );
        assert_eq!(chain_len(&store, 1), 1);
        assert_eq!(value_at(&store, 1, 900), Some(10));
    }

    #[test]
    fn test_chain_survives_partner_unregistration() {
        // Removing a partner from the set blocks new assignments to it
        // but leaves recorded history readable.
        let mut store = store_with_partners(&[10]);
        record(&mut store, 1, 10, 100).unwrap();
        partners::remove(&mut store, 10).unwrap();

        assert_eq!(value_at(&store, 1, 100), Some(10));
        assert_eq!(
            record(&mut store, 2, 10, 100),
            Err(LogError::PartnerNotRegistered(10))
        );
    }

    #[test]
    fn test_batch_and_reverse_filter() {
        let mut store = store_with_partners(&[10, 20]);
        record(&mut store, 1, 10, 100).unwrap();
        record(&mut store, 2, 20, 100).unwrap();
        record(&mut store, 3, 10, 100).unwrap();

        assert_eq!(
            value_at_batch(&store, &[1, 2, 3, 4], 100),
            vec![Some(10), Some(20), Some(10), None]
        );
        assert_eq!(users_with_value_at(&store, &[1, 2, 3, 4], 10, 100), vec![1, 3]);
        assert_eq!(
            users_with_value_at(&store, &[3, 1, 3], 10, 100),
            vec![3, 1, 3]
        );
        assert_eq!(
            users_with_value_at(&store, &[1, 2], 99, 100),
            Vec::<UserId>::new()
        );
    }

    #[test]
    fn test_chain_length_never_decreases() {
        let mut store = store_with_partners(&[10, 20, 30]);
        let writes = [(10, 100), (20, 100), (30, 200), (10, 300), (10, 400)];
        let mut last_len = 0;
        for (partner, start) in writes {
            let _ = record(&mut store, 1, partner, start);
            let len = chain_len(&store, 1);
            assert!(len >= last_len);
            last_len = len;
        }
        assert_eq!(last_len, 3); // 100 collapsed, 400 was a no-op
    }
}
