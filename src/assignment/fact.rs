use serde::{Deserialize, Serialize};

use super::{PartnerId, Timestamp};

/// Packed fact identity: partner in the high 64 bits, effective-from
/// timestamp in the low 64 bits. Doubles as the stable key under which a
/// fact's "next" link is stored.
pub type FactId = u128;

/// Terminates every fact chain and keys the per-user head pointer.
/// `encode` never produces it: the sentinel partner is not encodable.
pub const FACT_SENTINEL: FactId = u128::MAX;

/// A single immutable assignment fact: from `effective_from` onward this
/// partner is in effect for the owning user, until superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssignmentFact {
    partner: PartnerId,
    effective_from: Timestamp,
}

impl AssignmentFact {
    pub fn new(partner: PartnerId, effective_from: Timestamp) -> Self {
        Self {
            partner,
            effective_from,
        }
    }

    // Getters
    pub fn partner(&self) -> PartnerId {
        self.partner
    }
    pub fn effective_from(&self) -> Timestamp {
        self.effective_from
    }

    /// Packs this fact into its stable identity.
    pub fn encode(&self) -> FactId {
        ((self.partner as u128) << 64) | self.effective_from as u128
    }

    /// Unpacks a fact identity. Must never be called on [`FACT_SENTINEL`].
    pub fn decode(id: FactId) -> Self {
        Self {
            partner: (id >> 64) as PartnerId,
            effective_from: id as Timestamp,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assignment::PARTNER_SENTINEL;
    use proptest::prelude::*;

    #[test]
    fn test_fact_round_trip() {
        let fact = AssignmentFact::new(42, 9_000);
        assert_eq!(AssignmentFact::decode(fact.encode()), fact);
    }

    #[test]
    fn test_sentinel_is_not_encodable() {
        // The largest encodable fact uses the last valid partner id, which
        // is one below the sentinel partner.
        let fact = AssignmentFact::new(PARTNER_SENTINEL - 1, u64::MAX);
        assert_ne!(fact.encode(), FACT_SENTINEL);
    }

    proptest! {
        #[test]
        fn prop_encode_decode_round_trip(partner in 1..u64::MAX, ts in 0..=u64::MAX) {
            let fact = AssignmentFact::new(partner, ts);
            let decoded = AssignmentFact::decode(fact.encode());
            prop_assert_eq!(decoded.partner(), partner);
            prop_assert_eq!(decoded.effective_from(), ts);
        }
    }
}
