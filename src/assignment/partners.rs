//! Sentinel-rooted linked set of admissible partner identifiers.
//!
//! The set lives entirely in the store's partner-link table:
//! `link(SENTINEL)` points at the newest member and the last member links
//! back to the sentinel. A partner is a member iff it has a link entry.

use thiserror::Error;

use super::{PartnerId, NO_ID, PARTNER_SENTINEL};
use crate::storage::StateStore;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PartnerSetError {
    #[error("identifier {0} is not usable as a partner")]
    InvalidIdentifier(PartnerId),
    #[error("partner {0} is already registered")]
    AlreadyRegistered(PartnerId),
    #[error("partner {0} is not registered")]
    NotRegistered(PartnerId),
    #[error("no predecessor found for partner {0}: membership list is corrupt")]
    NoSuchPredecessor(PartnerId),
}

/// True iff `id` is linked into the set. The sentinel and the absent
/// identifier are never members.
pub fn is_member<S: StateStore>(store: &S, id: PartnerId) -> bool {
    id != NO_ID && id != PARTNER_SENTINEL && store.partner_link(id).is_some()
}

/// Links `id` at the head of the set. O(1).
pub fn insert<S: StateStore>(store: &mut S, id: PartnerId) -> Result<(), PartnerSetError> {
    if id == NO_ID || id == PARTNER_SENTINEL {
        return Err(PartnerSetError::InvalidIdentifier(id));
    }
    if is_member(store, id) {
        return Err(PartnerSetError::AlreadyRegistered(id));
    }
    let old_head = store.partner_link(PARTNER_SENTINEL).unwrap_or(PARTNER_SENTINEL);
    store.set_partner_link(id, old_head);
    store.set_partner_link(PARTNER_SENTINEL, id);
    Ok(())
}

/// Splices `id` out of the set. O(n) in the current set size: the scan
/// walks from the sentinel until it finds the predecessor.
pub fn remove<S: StateStore>(store: &mut S, id: PartnerId) -> Result<(), PartnerSetError> {
    if id == PARTNER_SENTINEL {
        return Err(PartnerSetError::InvalidIdentifier(id));
    }
    if !is_member(store, id) {
        return Err(PartnerSetError::NotRegistered(id));
    }

    let mut predecessor = PARTNER_SENTINEL;
    loop {
        let next = store
            .partner_link(predecessor)
            .ok_or(PartnerSetError::NoSuchPredecessor(id))?;
        if next == id {
            break;
        }
        if next == PARTNER_SENTINEL {
            // Walked the whole list without passing `id` even though the
            // membership check saw a link entry for it.
            return Err(PartnerSetError::NoSuchPredecessor(id));
        }
        predecessor = next;
    }

    let successor = store.partner_link(id).unwrap_or(PARTNER_SENTINEL);
    store.set_partner_link(predecessor, successor);
    store.clear_partner_link(id);
    Ok(())
}

/// Members in list order, newest first. Used by tests and introspection.
pub fn members<S: StateStore>(store: &S) -> Vec<PartnerId> {
    let mut out = Vec::new();
    let mut cursor = PARTNER_SENTINEL;
    while let Some(next) = store.partner_link(cursor) {
        if next == PARTNER_SENTINEL {
            break;
        }
        out.push(next);
        cursor = next;
    }
    out
}
