//! Luggage volumes and the per-seat allowance policy.

use std::fmt;
use std::iter::Sum;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// A volume in cubic centimetres.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct Volume(u64);

impl Volume {
    /// Zero volume.
    pub const ZERO: Volume = Volume(0);

    /// Create from cubic centimetres.
    pub const fn from_cm3(cm3: u64) -> Self {
        Self(cm3)
    }

    /// Returns the volume in cubic centimetres.
    pub const fn cm3(&self) -> u64 {
        self.0
    }
}

impl Add for Volume {
    type Output = Volume;

    fn add(self, rhs: Volume) -> Volume {
        Volume(self.0.saturating_add(rhs.0))
    }
}

impl Sum for Volume {
    fn sum<I: Iterator<Item = Volume>>(iter: I) -> Volume {
        iter.fold(Volume::ZERO, Add::add)
    }
}

impl fmt::Display for Volume {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} cm3", self.0)
    }
}

/// Outer dimensions of a box, in centimetres.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BoxDimensions {
    pub width: u32,
    pub height: u32,
    pub length: u32,
}

impl BoxDimensions {
    /// Create a new set of dimensions.
    pub const fn new(width: u32, height: u32, length: u32) -> Self {
        Self {
            width,
            height,
            length,
        }
    }

    /// The dimensions sorted ascending, so that orientation does not matter.
    ///
    /// ```
    /// use booking_server::domain::BoxDimensions;
    ///
    /// assert_eq!(BoxDimensions::new(25, 15, 18).canonical(), [15, 18, 25]);
    /// ```
    pub fn canonical(&self) -> [u32; 3] {
        let mut dims = [self.width, self.height, self.length];
        dims.sort_unstable();
        dims
    }

    /// Whether this box, in some orientation, contains `other`.
    pub fn contains(&self, other: &BoxDimensions) -> bool {
        let outer = self.canonical();
        let inner = other.canonical();
        outer.iter().zip(inner.iter()).all(|(o, i)| o >= i)
    }

    /// The volume of the bounding box.
    pub fn volume(&self) -> Volume {
        Volume(u64::from(self.width) * u64::from(self.height) * u64::from(self.length))
    }
}

/// Fixed luggage categories with their reserved volumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LuggageCategory {
    Backpack,
    Small,
    Large,
}

impl LuggageCategory {
    /// Volume reserved in the luggage compartment for one item of this category.
    pub const fn volume(self) -> Volume {
        match self {
            LuggageCategory::Backpack => Volume(24_000),
            LuggageCategory::Small => Volume(60_000),
            LuggageCategory::Large => Volume(200_000),
        }
    }
}

/// Volume still reserved for every seat that has not been sold yet.
///
/// Each seat comes with one free backpack and one free small bag. Keeping that
/// space aside for unsold seats means that "seat available" always implies
/// "allowance available" for whoever buys it later, at the cost of some
/// compartment space that parcels could otherwise use.
pub const fn free_allowance_per_unoccupied_seat() -> Volume {
    Volume(LuggageCategory::Backpack.volume().0 + LuggageCategory::Small.volume().0)
}

/// Luggage declared by one passenger at purchase time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LuggageDeclaration {
    #[serde(default)]
    pub backpacks: u32,
    #[serde(default)]
    pub small: u32,
    #[serde(default)]
    pub large: u32,
    /// Items outside the standard categories, declared by their dimensions.
    #[serde(default)]
    pub custom: Vec<BoxDimensions>,
}

impl LuggageDeclaration {
    /// Count of items in a category.
    pub fn count(&self, category: LuggageCategory) -> u32 {
        match category {
            LuggageCategory::Backpack => self.backpacks,
            LuggageCategory::Small => self.small,
            LuggageCategory::Large => self.large,
        }
    }

    /// Total compartment volume this declaration consumes.
    pub fn volume(&self) -> Volume {
        let categories = [
            LuggageCategory::Backpack,
            LuggageCategory::Small,
            LuggageCategory::Large,
        ];
        let standard: Volume = categories
            .into_iter()
            .map(|c| Volume(c.volume().0.saturating_mul(u64::from(self.count(c)))))
            .sum();
        let custom: Volume = self.custom.iter().map(BoxDimensions::volume).sum();
        standard + custom
    }
}
