//! Parcel tariff lookup.
//!
//! Parcel prices come from a short list of size tiers. A parcel pays the
//! price of the first tier (in ascending price order) whose bounding box
//! contains it in some orientation, or the oversize price if none does.

use serde::{Deserialize, Serialize};

use crate::domain::{BoxDimensions, Money};

/// Error returned when a tariff table is inconsistent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TariffError {
    #[error("tariff must contain at least one size tier")]
    NoTiers,

    #[error("oversize price must be greater than zero")]
    ZeroOversizePrice,

    #[error("tier {index} is smaller than the cheaper tier before it")]
    NotMonotonic { index: usize },

    #[error("oversize price is below the most expensive tier")]
    OversizeTooCheap,
}

/// One size tier: a maximum bounding box and its flat price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TariffTier {
    pub max: BoxDimensions,
    pub price: Money,
}

impl TariffTier {
    pub const fn new(width: u32, height: u32, length: u32, price: Money) -> Self {
        Self {
            max: BoxDimensions::new(width, height, length),
            price,
        }
    }
}

/// Validated, price-sorted tariff table.
///
/// Invariant: tiers are sorted by price and every tier's canonical box
/// dominates the previous one, and the oversize price is at least the last
/// tier price. Together these make [`ParcelTariff::price`] monotonic in each
/// dimension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParcelTariff {
    tiers: Vec<TariffTier>,
    oversize_price: Money,
}

impl ParcelTariff {
    /// Build a tariff, sorting tiers by price and checking the invariants.
    ///
    /// ```
    /// use booking_server::domain::{BoxDimensions, Money};
    /// use booking_server::tariff::{ParcelTariff, TariffTier};
    ///
    /// let tariff = ParcelTariff::new(
    ///     vec![
    ///         TariffTier::new(30, 30, 30, Money::from_minor(9000)),
    ///         TariffTier::new(20, 20, 20, Money::from_minor(8000)),
    ///     ],
    ///     Money::from_minor(15000),
    /// )
    /// .unwrap();
    ///
    /// assert_eq!(tariff.price(&BoxDimensions::new(25, 15, 18)), Money::from_minor(9000));
    /// ```
    pub fn new(mut tiers: Vec<TariffTier>, oversize_price: Money) -> Result<Self, TariffError> {
        if tiers.is_empty() {
            return Err(TariffError::NoTiers);
        }
        if oversize_price == Money::ZERO {
            return Err(TariffError::ZeroOversizePrice);
        }

        tiers.sort_by_key(|t| t.price);

        for (index, pair) in tiers.windows(2).enumerate() {
            if !pair[1].max.contains(&pair[0].max) {
                return Err(TariffError::NotMonotonic { index: index + 1 });
            }
        }

        if tiers.last().is_some_and(|t| t.price > oversize_price) {
            return Err(TariffError::OversizeTooCheap);
        }

        Ok(Self {
            tiers,
            oversize_price,
        })
    }

    /// Price of a parcel with the given outer dimensions.
    ///
    /// First fit in price order, not nearest fit.
    pub fn price(&self, parcel: &BoxDimensions) -> Money {
        self.tiers
            .iter()
            .find(|tier| tier.max.contains(parcel))
            .map_or(self.oversize_price, |tier| tier.price)
    }

    pub fn tiers(&self) -> &[TariffTier] {
        &self.tiers
    }

    pub fn oversize_price(&self) -> Money {
        self.oversize_price
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn tariff() -> ParcelTariff {
        ParcelTariff::new(
            vec![
                TariffTier::new(15, 10, 20, Money::from_minor(5000)),
                TariffTier::new(25, 20, 35, Money::from_minor(7500)),
                TariffTier::new(40, 30, 50, Money::from_minor(10000)),
                TariffTier::new(50, 40, 70, Money::from_minor(13000)),
                TariffTier::new(60, 60, 100, Money::from_minor(18000)),
            ],
            Money::from_minor(25000),
        )
        .unwrap()
    }

    proptest! {
        /// Same input, same price.
        #[test]
        fn idempotent(w in 1u32..120, h in 1u32..120, l in 1u32..120) {
            let t = tariff();
            let dims = BoxDimensions::new(w, h, l);
            prop_assert_eq!(t.price(&dims), t.price(&dims));
        }

        /// Growing any one dimension never lowers the price.
        #[test]
        fn monotonic_in_each_dimension(
            w in 1u32..120, h in 1u32..120, l in 1u32..120,
            grow in 0u32..60, axis in 0usize..3,
        ) {
            let t = tariff();
            let before = BoxDimensions::new(w, h, l);
            let mut after = before;
            match axis {
                0 => after.width += grow,
                1 => after.height += grow,
                _ => after.length += grow,
            }
            prop_assert!(t.price(&after) >= t.price(&before));
        }

        /// Permuting the dimensions does not change the price.
        #[test]
        fn orientation_invariant(w in 1u32..120, h in 1u32..120, l in 1u32..120) {
            let t = tariff();
            let a = t.price(&BoxDimensions::new(w, h, l));
            prop_assert_eq!(a, t.price(&BoxDimensions::new(l, w, h)));
            prop_assert_eq!(a, t.price(&BoxDimensions::new(h, l, w)));
        }
    }
}
