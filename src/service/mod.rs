//! Facade tying the clock, the partner set, and the assignment log
//! together behind one authorized, serialized surface.
//!
//! Every mutating call takes the store's write lock for its whole
//! duration, so writes are atomic with respect to readers and to each
//! other. The caller supplies the current timestamp on each invocation;
//! the service owns no clock of its own.

use log::info;
use parking_lot::RwLock;
use std::path::Path;
use thiserror::Error;

use crate::assignment::{
    history, partners, ClockRecord, LogError, PartnerId, PartnerSetError, Period, Timestamp, UserId,
    WriteOutcome,
};
use crate::storage::snapshot::{self, Compression};
use crate::storage::{MemoryStore, SnapshotError, StateStore};

#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("caller is not authorized for this operation")]
    Unauthorized,
    #[error("period duration must be positive, got {0}")]
    InvalidDuration(u64),
    #[error("store has no clock record")]
    ClockNotInitialized,
    #[error(transparent)]
    Partner(#[from] PartnerSetError),
    #[error(transparent)]
    Log(#[from] LogError),
    #[error(transparent)]
    Snapshot(#[from] SnapshotError),
}

/// Who is invoking an operation. Authorization itself is an external
/// concern; the facade only needs the resolved identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Caller {
    /// The single administrative capability.
    Admin,
    /// An ordinary user acting on their own history.
    User(UserId),
}

/// Which period a write targets. Self-service writes take effect next
/// period; the administrative bootstrap path targets the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WriteScope {
    NextPeriod,
    CurrentPeriod,
}

/// Notifications handed to the external indexing collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    PartnerRegistered {
        partner: PartnerId,
    },
    PartnerUnregistered {
        partner: PartnerId,
    },
    AssignmentRecorded {
        user: UserId,
        partner: PartnerId,
        effective_from: Timestamp,
    },
    DurationChanged {
        old: u64,
        new: u64,
    },
}

/// Receives every emitted [`Event`], after the store mutation has
/// committed and its lock is released.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: &Event);
}

/// Default sink: structured log records, no off-system delivery.
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: &Event) {
        match event {
            Event::PartnerRegistered { partner } => info!("partner {partner} registered"),
            Event::PartnerUnregistered { partner } => info!("partner {partner} unregistered"),
            Event::AssignmentRecorded {
                user,
                partner,
                effective_from,
            } => info!("user {user} assigned to partner {partner} from {effective_from}"),
            Event::DurationChanged { old, new } => {
                info!("period duration changed from {old} to {new}")
            }
        }
    }
}

pub struct AssignmentService<S: StateStore = MemoryStore> {
    store: RwLock<S>,
    events: Box<dyn EventSink>,
}

impl AssignmentService<MemoryStore> {
    /// Fresh deployment: empty tables, periods of `duration` seconds
    /// starting at `genesis`.
    pub fn new(genesis: Timestamp, duration: u64) -> Result<Self, ServiceError> {
        if duration == 0 {
            return Err(ServiceError::InvalidDuration(duration));
        }
        let mut store = MemoryStore::new();
        store.set_clock(ClockRecord::new(genesis, duration));
        Self::with_store(store)
    }

    /// Resumes from a snapshot written by [`save_snapshot`].
    ///
    /// [`save_snapshot`]: AssignmentService::save_snapshot
    pub fn from_snapshot(path: &Path) -> Result<Self, ServiceError> {
        Self::with_store(snapshot::load(path)?)
    }

    pub fn save_snapshot(&self, path: &Path, compression: Compression) -> Result<(), ServiceError> {
        snapshot::save(&self.store.read(), path, compression)?;
        Ok(())
    }
}

impl<S: StateStore> AssignmentService<S> {
    /// Wraps an existing store. The store must already carry a clock
    /// record.
    pub fn with_store(store: S) -> Result<Self, ServiceError> {
        if store.clock().is_none() {
            return Err(ServiceError::ClockNotInitialized);
        }
        Ok(Self {
            store: RwLock::new(store),
            events: Box::new(LogSink),
        })
    }

    /// Replaces the default logging sink.
    pub fn with_event_sink(mut self, sink: Box<dyn EventSink>) -> Self {
        self.events = sink;
        self
    }

    fn require_admin(caller: Caller) -> Result<(), ServiceError> {
        match caller {
            Caller::Admin => Ok(()),
            Caller::User(_) => Err(ServiceError::Unauthorized),
        }
    }

    fn clock_of(store: &S) -> Result<ClockRecord, ServiceError> {
        store.clock().ok_or(ServiceError::ClockNotInitialized)
    }

    // Write paths

    pub fn register_partner(&self, caller: Caller, id: PartnerId) -> Result<(), ServiceError> {
        Self::require_admin(caller)?;
        partners::insert(&mut *self.store.write(), id)?;
        self.events.emit(&Event::PartnerRegistered { partner: id });
        Ok(())
    }

    pub fn unregister_partner(&self, caller: Caller, id: PartnerId) -> Result<(), ServiceError> {
        Self::require_admin(caller)?;
        partners::remove(&mut *self.store.write(), id)?;
        self.events.emit(&Event::PartnerUnregistered { partner: id });
        Ok(())
    }

    /// Records `partner` for `user`. A user writes their own history and
    /// the write takes effect next period; the admin writes on a user's
    /// behalf into the *current* period (bootstrap).
    pub fn set_assignment(
        &self,
        caller: Caller,
        user: UserId,
        partner: PartnerId,
        now: Timestamp,
    ) -> Result<WriteOutcome, ServiceError> {
        let scope = match caller {
            Caller::Admin => WriteScope::CurrentPeriod,
            Caller::User(id) if id == user => WriteScope::NextPeriod,
            Caller::User(_) => return Err(ServiceError::Unauthorized),
        };

        let mut store = self.store.write();
        let clock = Self::clock_of(&store)?;
        let target_start = match scope {
            WriteScope::CurrentPeriod => clock.current_period(now).start,
            WriteScope::NextPeriod => clock.current_period(now).end + 1,
        };

        let outcome = history::record(&mut *store, user, partner, target_start)?;
        drop(store);

        if let WriteOutcome::Recorded(effective_from) = outcome {
            self.events.emit(&Event::AssignmentRecorded {
                user,
                partner,
                effective_from,
            });
        }
        Ok(outcome)
    }

    /// Changes the period duration starting with the next period
    /// boundary. Admin only.
    pub fn set_period_duration(
        &self,
        caller: Caller,
        new_duration: u64,
        now: Timestamp,
    ) -> Result<(), ServiceError> {
        Self::require_admin(caller)?;
        if new_duration == 0 {
            return Err(ServiceError::InvalidDuration(new_duration));
        }

        let mut store = self.store.write();
        let mut clock = Self::clock_of(&store)?;
        let old = clock.current_duration();
        clock.change_duration(now, new_duration);
        store.set_clock(clock);
        drop(store);

        self.events.emit(&Event::DurationChanged {
            old,
            new: new_duration,
        });
        Ok(())
    }

    // Read paths (side-effect-free)

    pub fn current_period(&self, now: Timestamp) -> Result<Period, ServiceError> {
        Ok(Self::clock_of(&self.store.read())?.current_period(now))
    }

    pub fn period_at(&self, ts: Timestamp) -> Result<Period, ServiceError> {
        Ok(Self::clock_of(&self.store.read())?.period_at(ts))
    }

    pub fn is_registered(&self, id: PartnerId) -> bool {
        partners::is_member(&*self.store.read(), id)
    }

    /// Partner in effect for `user` at wall time `ts`, or `None`.
    pub fn value_at(&self, user: UserId, ts: Timestamp) -> Result<Option<PartnerId>, ServiceError> {
        let store = self.store.read();
        let period = Self::clock_of(&store)?.period_at(ts);
        Ok(history::value_at(&*store, user, period.start))
    }

    pub fn value_at_batch(
        &self,
        users: &[UserId],
        ts: Timestamp,
    ) -> Result<Vec<Option<PartnerId>>, ServiceError> {
        let store = self.store.read();
        let period = Self::clock_of(&store)?.period_at(ts);
        Ok(history::value_at_batch(&*store, users, period.start))
    }

    /// The subsequence of `users` assigned to `partner` at `ts`.
    pub fn users_with_value_at(
        &self,
        users: &[UserId],
        partner: PartnerId,
        ts: Timestamp,
    ) -> Result<Vec<UserId>, ServiceError> {
        let store = self.store.read();
        let period = Self::clock_of(&store)?.period_at(ts);
        Ok(history::users_with_value_at(&*store, users, partner, period.start))
    }

    /// Number of facts recorded for `user`.
    pub fn chain_len(&self, user: UserId) -> usize {
        history::chain_len(&*self.store.read(), user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_admin_gate_on_partner_management() {
        let service = AssignmentService::new(0, 100).unwrap();
        assert!(matches!(
            service.register_partner(Caller::User(1), 10),
            Err(ServiceError::Unauthorized)
        ));
        service.register_partner(Caller::Admin, 10).unwrap();
        assert!(service.is_registered(10));

        assert!(matches!(
            service.unregister_partner(Caller::User(1), 10),
            Err(ServiceError::Unauthorized)
        ));
        service.unregister_partner(Caller::Admin, 10).unwrap();
        assert!(!service.is_registered(10));
    }

    #[test]
    fn test_user_cannot_write_someone_elses_history() {
        let service = AssignmentService::new(0, 100).unwrap();
        service.register_partner(Caller::Admin, 10).unwrap();
        assert!(matches!(
            service.set_assignment(Caller::User(2), 1, 10, 50),
            Err(ServiceError::Unauthorized)
        ));
        assert_eq!(service.chain_len(1), 0);
    }

    #[test]
    fn test_self_service_targets_next_period() {
        let service = AssignmentService::new(0, 100).unwrap();
        service.register_partner(Caller::Admin, 10).unwrap();

        let outcome = service.set_assignment(Caller::User(1), 1, 10, 50).unwrap();
        assert_eq!(outcome, WriteOutcome::Recorded(100));
        assert_eq!(service.value_at(1, 50).unwrap(), None);
        assert_eq!(service.value_at(1, 100).unwrap(), Some(10));
    }

    #[test]
    fn test_admin_bootstrap_targets_current_period() {
        let service = AssignmentService::new(0, 100).unwrap();
        service.register_partner(Caller::Admin, 10).unwrap();

        let outcome = service.set_assignment(Caller::Admin, 1, 10, 50).unwrap();
        assert_eq!(outcome, WriteOutcome::Recorded(0));
        assert_eq!(service.value_at(1, 50).unwrap(), Some(10));
    }

    #[test]
    fn test_zero_duration_is_rejected() {
        assert!(matches!(
            AssignmentService::new(0, 0),
            Err(ServiceError::InvalidDuration(0))
        ));
        let service = AssignmentService::new(0, 100).unwrap();
        assert!(matches!(
            service.set_period_duration(Caller::Admin, 0, 50),
            Err(ServiceError::InvalidDuration(0))
        ));
    }

    #[test]
    fn test_store_without_clock_is_refused() {
        let store = MemoryStore::new();
        assert!(matches!(
            AssignmentService::with_store(store),
            Err(ServiceError::ClockNotInitialized)
        ));
    }
}
