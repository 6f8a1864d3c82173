//! Expected dues for an attendee's package selection.

use std::collections::BTreeMap;

use crate::attendee::Attendee;
use crate::config::ServiceConfig;

/// Computes what an attendee owes for their current selection.
pub trait DuesPricing: Send + Sync + std::fmt::Debug {
    /// Total dues in minor units.
    fn expected_dues(&self, attendee: &Attendee) -> i64;

    /// Whether `key` names a known package.
    fn knows_package(&self, key: &str) -> bool;
}

/// Sum of configured package prices. Unknown keys cost nothing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PackagePricing {
    prices: BTreeMap<String, i64>,
}

impl PackagePricing {
    /// Pricing from explicit `(key, price)` pairs.
    pub fn new<I, K>(prices: I) -> Self
    where
        I: IntoIterator<Item = (K, i64)>,
        K: Into<String>,
    {
        Self {
            prices: prices.into_iter().map(|(k, p)| (k.into(), p)).collect(),
        }
    }

    /// Pricing from the `packages` configuration section.
    pub fn from_config(config: &ServiceConfig) -> Self {
        Self::new(config.packages.iter().map(|(k, p)| (k.clone(), p.price)))
    }
}

impl DuesPricing for PackagePricing {
    fn expected_dues(&self, attendee: &Attendee) -> i64 {
        attendee
            .packages
            .iter()
            .filter_map(|key| self.prices.get(key))
            .fold(0i64, |total, price| total.saturating_add(*price))
    }

    fn knows_package(&self, key: &str) -> bool {
        self.prices.contains_key(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use attreg_core::{AttendeeId, Status, Subject, Timestamp};

    fn attendee(packages: &[&str]) -> Attendee {
        Attendee {
            id: AttendeeId::new(1).unwrap(),
            owner: Subject::new("sub").unwrap(),
            nickname: "Snep".into(),
            email: "snep@example.com".into(),
            packages: packages.iter().map(|p| p.to_string()).collect(),
            flags: Default::default(),
            status: Status::New,
            registered_at: Timestamp::now(),
        }
    }

    #[test]
    fn test_sum_of_selected_packages() {
        let pricing = PackagePricing::new([("attendance", 25500), ("stage", 500), ("sponsor", 6500)]);
        assert_eq!(pricing.expected_dues(&attendee(&["attendance"])), 25500);
        assert_eq!(pricing.expected_dues(&attendee(&["attendance", "sponsor"])), 32000);
        assert_eq!(pricing.expected_dues(&attendee(&[])), 0);
    }

    #[test]
    fn test_unknown_package_costs_nothing() {
        let pricing = PackagePricing::new([("attendance", 25500)]);
        assert_eq!(pricing.expected_dues(&attendee(&["attendance", "ghost"])), 25500);
        assert!(!pricing.knows_package("ghost"));
        assert!(pricing.knows_package("attendance"));
    }

    #[test]
    fn test_from_config() {
        let config = ServiceConfig::from_yaml_str(
            "packages:\n  attendance:\n    description: Ticket\n    price: 25500\n",
        )
        .unwrap();
        let pricing = PackagePricing::from_config(&config);
        assert_eq!(pricing.expected_dues(&attendee(&["attendance"])), 25500);
    }
}
