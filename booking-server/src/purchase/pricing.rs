//! Ticket pricing.
//!
//! A passenger pays the connection fare plus extra luggage. The first
//! backpack and the first small bag ride free, matching the allowance every
//! seat already reserves in the luggage compartment. Anything beyond that
//! is charged from the luggage price table; items declared by dimensions
//! are charged as large luggage.

use crate::config::LuggagePrices;
use crate::domain::{LuggageDeclaration, Money};

/// Price of one passenger's ticket.
///
/// Returns `None` on overflow.
pub fn ticket_price(fare: Money, luggage: &LuggageDeclaration, prices: &LuggagePrices) -> Option<Money> {
    let extras = [
        (u64::from(luggage.backpacks.saturating_sub(1)), prices.backpack),
        (u64::from(luggage.small.saturating_sub(1)), prices.small),
        (u64::from(luggage.large), prices.large),
        (luggage.custom.len() as u64, prices.large),
    ];
    extras
        .into_iter()
        .try_fold(fare, |total, (count, unit)| total.checked_add(unit.checked_mul(count)?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::BoxDimensions;

    fn prices() -> LuggagePrices {
        LuggagePrices {
            backpack: Money::from_minor(1000),
            small: Money::from_minor(3000),
            large: Money::from_minor(7000),
        }
    }

    fn fare() -> Money {
        Money::from_minor(4500)
    }

    #[test]
    fn allowance_is_free() {
        let luggage = LuggageDeclaration {
            backpacks: 1,
            small: 1,
            ..Default::default()
        };
        assert_eq!(ticket_price(fare(), &luggage, &prices()), Some(fare()));
        assert_eq!(
            ticket_price(fare(), &LuggageDeclaration::default(), &prices()),
            Some(fare())
        );
    }

    #[test]
    fn extras_are_charged() {
        let luggage = LuggageDeclaration {
            backpacks: 2,
            small: 3,
            large: 1,
            custom: vec![BoxDimensions::new(100, 40, 40)],
        };
        // 4500 + 1 * 1000 + 2 * 3000 + 1 * 7000 + 1 * 7000
        assert_eq!(
            ticket_price(fare(), &luggage, &prices()),
            Some(Money::from_minor(25_500))
        );
    }

    #[test]
    fn overflow_is_reported() {
        let luggage = LuggageDeclaration {
            large: u32::MAX,
            ..Default::default()
        };
        let prices = LuggagePrices {
            large: Money::from_minor(u64::MAX / 2),
            ..prices()
        };
        assert_eq!(ticket_price(fare(), &luggage, &prices), None);
    }
}
