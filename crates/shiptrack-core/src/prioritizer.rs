//! Deterministic provider ordering.
//!
//! Providers fall into the first tier whose rule they match, then sort by
//! descending reliability with the provider name as tie-breaker:
//!
//! | Tier | Rule |
//! |------|------|
//! | 1 | free |
//! | 2 | paid, reliability >= 0.90 |
//! | 3 | paid, 0.80 <= reliability < 0.90 |
//! | 4 | freemium |
//! | 5 | aggregator |
//! | 6 | everything else |

use std::cmp::Ordering;

use crate::registry::{CostTier, ProviderDescriptor};
use crate::IdentifierType;

const HIGH_RELIABILITY: f64 = 0.90;
const MEDIUM_RELIABILITY: f64 = 0.80;

/// Priority tier; lower ranks are tried first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PriorityTier {
    Free = 1,
    PaidHighReliability = 2,
    PaidMediumReliability = 3,
    Freemium = 4,
    Aggregator = 5,
    Remaining = 6,
}

impl PriorityTier {
    pub fn of(descriptor: &ProviderDescriptor) -> Self {
        let reliability = descriptor.reliability;
        match descriptor.cost_tier {
            CostTier::Free => Self::Free,
            CostTier::Paid if reliability >= HIGH_RELIABILITY => Self::PaidHighReliability,
            CostTier::Paid if reliability >= MEDIUM_RELIABILITY => Self::PaidMediumReliability,
            CostTier::Freemium => Self::Freemium,
            _ if descriptor.is_aggregator => Self::Aggregator,
            _ => Self::Remaining,
        }
    }
}

/// Orders `providers` for `identifier_type`, dropping providers that lack a
/// credential or do not support the type.
pub fn prioritize(
    providers: &[ProviderDescriptor],
    identifier_type: IdentifierType,
) -> Vec<ProviderDescriptor> {
    let mut ranked = providers
        .iter()
        .filter(|descriptor| descriptor.has_credential && descriptor.supports(identifier_type))
        .map(|descriptor| (PriorityTier::of(descriptor), descriptor))
        .collect::<Vec<_>>();

    ranked.sort_by(|(left_tier, left), (right_tier, right)| {
        left_tier
            .cmp(right_tier)
            .then_with(|| {
                right
                    .reliability
                    .partial_cmp(&left.reliability)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| left.name.cmp(&right.name))
    });

    ranked
        .into_iter()
        .map(|(_, descriptor)| descriptor.clone())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn descriptor(name: &str, tier: CostTier, reliability: f64) -> ProviderDescriptor {
        ProviderDescriptor::new(name, format!("https://{name}.test"))
            .with_credential(true)
            .with_cost_tier(tier)
            .with_reliability(reliability)
    }

    fn names(ordered: &[ProviderDescriptor]) -> Vec<&str> {
        ordered.iter().map(|descriptor| descriptor.name.as_str()).collect()
    }

    #[test]
    fn orders_by_tier_then_reliability() {
        let providers = vec![
            descriptor("paid_low", CostTier::Paid, 0.70),
            descriptor("freemium", CostTier::Freemium, 0.99),
            descriptor("paid_mid", CostTier::Paid, 0.85),
            descriptor("free_b", CostTier::Free, 0.60),
            descriptor("paid_high", CostTier::Paid, 0.93),
            descriptor("aggregator", CostTier::Paid, 0.75).with_aggregator(true),
            descriptor("free_a", CostTier::Free, 0.91),
        ];

        let ordered = prioritize(&providers, IdentifierType::Container);

        assert_eq!(
            names(&ordered),
            vec![
                "free_a",
                "free_b",
                "paid_high",
                "paid_mid",
                "freemium",
                "aggregator",
                "paid_low"
            ]
        );
    }

    #[test]
    fn tier_boundaries_are_inclusive_at_lower_bound() {
        assert_eq!(
            PriorityTier::of(&descriptor("exact_high", CostTier::Paid, 0.90)),
            PriorityTier::PaidHighReliability
        );
        assert_eq!(
            PriorityTier::of(&descriptor("exact_mid", CostTier::Paid, 0.80)),
            PriorityTier::PaidMediumReliability
        );
        assert_eq!(
            PriorityTier::of(&descriptor("below_mid", CostTier::Paid, 0.7999)),
            PriorityTier::Remaining
        );
    }

    #[test]
    fn first_matching_tier_wins_for_aggregators() {
        let free_aggregator = descriptor("agg_free", CostTier::Free, 0.50).with_aggregator(true);
        let paid_aggregator = descriptor("agg_paid", CostTier::Paid, 0.95).with_aggregator(true);

        assert_eq!(PriorityTier::of(&free_aggregator), PriorityTier::Free);
        assert_eq!(
            PriorityTier::of(&paid_aggregator),
            PriorityTier::PaidHighReliability
        );
    }

    #[test]
    fn ordering_is_deterministic_for_ties() {
        let providers = vec![
            descriptor("zeta", CostTier::Free, 0.80),
            descriptor("alpha", CostTier::Free, 0.80),
            descriptor("mid", CostTier::Free, 0.80),
        ];

        let first = prioritize(&providers, IdentifierType::Booking);
        let mut reversed = providers.clone();
        reversed.reverse();
        let second = prioritize(&reversed, IdentifierType::Booking);

        assert_eq!(names(&first), vec!["alpha", "mid", "zeta"]);
        assert_eq!(first, second);
    }

    #[test]
    fn skips_uncredentialed_and_unsupported_providers() {
        let providers = vec![
            descriptor("keyless", CostTier::Free, 0.99).with_credential(false),
            descriptor("vessels_only", CostTier::Free, 0.98)
                .with_supported_types(vec![IdentifierType::Vessel]),
            descriptor("kept", CostTier::Paid, 0.81),
        ];

        let ordered = prioritize(&providers, IdentifierType::Container);
        assert_eq!(names(&ordered), vec!["kept"]);
    }
}
