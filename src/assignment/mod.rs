//! Core logic for partner-assignment chains and period arithmetic.

pub mod clock;
pub mod fact;
pub mod history;
pub mod partners;

pub use clock::{ClockRecord, Period};
pub use fact::{AssignmentFact, FactId, FACT_SENTINEL};
pub use history::{LogError, WriteOutcome};
pub use partners::PartnerSetError;

/// User identifier. `0` is reserved as the absent value.
pub type UserId = u64;

/// Partner identifier. `0` is reserved as the absent value and
/// [`PARTNER_SENTINEL`] roots the membership list.
pub type PartnerId = u64;

/// Seconds since the deployment epoch.
pub type Timestamp = u64;

/// Absent partner/user identifier.
pub const NO_ID: u64 = 0;

/// Roots the partner membership list; never a valid member.
pub const PARTNER_SENTINEL: PartnerId = u64::MAX;
