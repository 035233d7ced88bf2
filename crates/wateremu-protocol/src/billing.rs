//! Billing arithmetic.
//!
//! The meter reports volume as a 24-bit little-endian tally. The app prices
//! it as `round((raw / 10) * tariff / 1000, 2)`, rounding half up. Everything
//! here is done in integers so `0.445` really rounds to `0.45`.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::InvalidTariff;

/// Default tariff, in currency units per 1000 volume units.
pub const DEFAULT_TARIFF: u32 = 25;

/// Largest value a 3-byte volume field can carry.
pub const MAX_VOLUME: u32 = 0x00FF_FFFF;

/// A raw 24-bit volume tally.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Volume(u32);

impl Volume {
    /// Zero volume.
    pub const ZERO: Volume = Volume(0);

    /// Create a volume, or `None` if `raw` does not fit in 24 bits.
    pub const fn new(raw: u32) -> Option<Self> {
        if raw > MAX_VOLUME {
            None
        } else {
            Some(Volume(raw))
        }
    }

    /// Decode a 3-byte little-endian field.
    pub const fn from_le_bytes(bytes: [u8; 3]) -> Self {
        Volume(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], 0]))
    }

    /// Encode as a 3-byte little-endian field.
    pub const fn to_le_bytes(self) -> [u8; 3] {
        let [b0, b1, b2, _] = self.0.to_le_bytes();
        [b0, b1, b2]
    }

    /// The raw tally.
    pub const fn raw(self) -> u32 {
        self.0
    }
}

/// Price per unit volume, held exactly in thousandths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "f64", into = "f64")]
pub struct Tariff {
    milli: u32,
}

impl Tariff {
    /// A whole-unit tariff such as the default `25`.
    pub const fn from_units(units: u32) -> Self {
        Tariff {
            milli: units.saturating_mul(1000),
        }
    }

    /// A tariff given in thousandths of a unit.
    pub const fn from_milli(milli: u32) -> Self {
        Tariff { milli }
    }

    /// Thousandths of a unit.
    pub const fn milli(self) -> u32 {
        self.milli
    }

    /// The tariff as a decimal number.
    pub fn as_f64(self) -> f64 {
        f64::from(self.milli) / 1000.0
    }
}

impl Default for Tariff {
    fn default() -> Self {
        Tariff::from_units(DEFAULT_TARIFF)
    }
}

impl TryFrom<f64> for Tariff {
    type Error = InvalidTariff;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        let milli = (value * 1000.0).round();
        if !milli.is_finite() || milli < 0.0 || milli > f64::from(u32::MAX) {
            return Err(InvalidTariff(value));
        }
        Ok(Tariff::from_milli(milli as u32))
    }
}

impl From<Tariff> for f64 {
    fn from(tariff: Tariff) -> Self {
        tariff.as_f64()
    }
}

impl fmt::Display for Tariff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_f64())
    }
}

/// A billed amount with two decimal places.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Cost {
    cents: u64,
}

impl Cost {
    /// Amount in hundredths of the currency unit.
    pub const fn cents(self) -> u64 {
        self.cents
    }

    /// Amount as a decimal number.
    pub fn as_f64(self) -> f64 {
        self.cents as f64 / 100.0
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.cents / 100, self.cents % 100)
    }
}

/// Price a raw volume tally.
///
/// `(raw / 10) * (milli / 1000) / 1000` units equals `raw * milli / 100_000`
/// hundredths, rounded half up.
pub fn cost(volume: Volume, tariff: Tariff) -> Cost {
    let scaled = u64::from(volume.raw()) * u64::from(tariff.milli());
    Cost {
        cents: (scaled + 50_000) / 100_000,
    }
}
