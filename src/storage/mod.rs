//! Abstract state store and its in-memory implementation.
//!
//! All chain structure lives in three logical tables: partner membership
//! links, per-user fact links, and the small clock record. Components
//! receive the store by reference; there is exactly one store instance
//! per deployment and no hidden globals.

pub mod snapshot;

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::assignment::{ClockRecord, FactId, PartnerId, UserId};

pub use snapshot::SnapshotError;

/// The three logical tables the assignment core is specified against.
///
/// Links are adjacency entries: `partner_link(a) == Some(b)` means `b`
/// follows `a` in the membership list, and `fact_link(u, f) == Some(g)`
/// means fact `g` is the next-older fact after `f` in user `u`'s chain.
/// The sentinel keys double as head pointers.
pub trait StateStore {
    fn partner_link(&self, id: PartnerId) -> Option<PartnerId>;
    fn set_partner_link(&mut self, id: PartnerId, next: PartnerId);
    fn clear_partner_link(&mut self, id: PartnerId);

    fn fact_link(&self, user: UserId, from: FactId) -> Option<FactId>;
    fn set_fact_link(&mut self, user: UserId, from: FactId, to: FactId);
    fn clear_fact_link(&mut self, user: UserId, from: FactId);

    fn clock(&self) -> Option<ClockRecord>;
    fn set_clock(&mut self, record: ClockRecord);
}

/// BTreeMap-backed store. The whole struct serializes wholesale, which is
/// what the snapshot layer persists.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryStore {
    partner_links: BTreeMap<PartnerId, PartnerId>,
    fact_links: BTreeMap<(UserId, FactId), FactId>,
    clock: Option<ClockRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of fact-link entries across all users, head pointers
    /// included. Used by tests and introspection only.
    pub fn fact_link_count(&self) -> usize {
        self.fact_links.len()
    }
}

impl StateStore for MemoryStore {
    fn partner_link(&self, id: PartnerId) -> Option<PartnerId> {
        self.partner_links.get(&id).copied()
    }

    fn set_partner_link(&mut self, id: PartnerId, next: PartnerId) {
        self.partner_links.insert(id, next);
    }

    fn clear_partner_link(&mut self, id: PartnerId) {
        self.partner_links.remove(&id);
    }

    fn fact_link(&self, user: UserId, from: FactId) -> Option<FactId> {
        self.fact_links.get(&(user, from)).copied()
    }

    fn set_fact_link(&mut self, user: UserId, from: FactId, to: FactId) {
        self.fact_links.insert((user, from), to);
    }

    fn clear_fact_link(&mut self, user: UserId, from: FactId) {
        self.fact_links.remove(&(user, from));
    }

    fn clock(&self) -> Option<ClockRecord> {
        self.clock
    }

    fn set_clock(&mut self, record: ClockRecord) {
        self.clock = Some(record);
    }
}
