//! Per-user temporal partner-assignment histories.
//!
//! `tenure` tracks, for many independent users, which single partner was
//! in effect during each accounting period, using compact sentinel-linked
//! chains over an injected key-value store. Reads answer "who was the
//! partner at time T"; writes either collapse into the pending head fact
//! or prepend exactly one node.

pub mod assignment;
pub mod service;
pub mod storage;

pub use assignment::{AssignmentFact, PartnerId, Period, Timestamp, UserId, WriteOutcome};
pub use service::{AssignmentService, Caller, Event, EventSink, ServiceError};
pub use storage::{MemoryStore, StateStore};
