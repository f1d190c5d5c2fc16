//! Fixed-point arithmetic for prices and quantities.
//!
//! Prices are integer ticks so that level lookup and sort order never
//! depend on floating-point equality.

use core::fmt;
use core::ops::{Add, Sub};

use serde::{Deserialize, Serialize};

/// Fixed-point price representation.
///
/// Internally stores price as raw units, `TICK_SIZE` raw units per tick.
/// Example: 123.45 with TICK_SIZE=100 → Price(12345)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Price(pub u64);

impl Price {
    /// Minimum price increment in raw units.
    pub const TICK_SIZE: u64 = 100;

    /// Number of decimal places rendered by `Display`.
    pub const DECIMAL_PLACES: u32 = 2;

    /// Zero price (never valid for an order).
    pub const ZERO: Self = Self(0);

    /// Maximum price.
    pub const MAX: Self = Self(u64::MAX);

    /// Create a price from a number of ticks.
    #[inline(always)]
    pub const fn from_ticks(ticks: u64) -> Self {
        Self(ticks.saturating_mul(Self::TICK_SIZE))
    }

    /// Convert price to number of whole ticks.
    #[inline(always)]
    pub const fn to_ticks(self) -> u64 {
        self.0 / Self::TICK_SIZE
    }

    /// Get raw internal value.
    #[inline(always)]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Create from raw value (no conversion).
    #[inline(always)]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Check if price is zero.
    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Saturating subtraction.
    #[inline(always)]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }
}

impl fmt::Display for Price {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let scale = 10u64.pow(Self::DECIMAL_PLACES);
        write!(
            f,
            "{}.{:0width$}",
            self.0 / scale,
            self.0 % scale,
            width = Self::DECIMAL_PLACES as usize
        )
    }
}

/// Quantity in base units (shares, contracts, satoshis, etc.).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
#[repr(transparent)]
pub struct Quantity(pub u64);

impl Quantity {
    /// Zero quantity.
    pub const ZERO: Self = Self(0);

    /// Largest representable quantity.
    pub const MAX: Self = Self(u64::MAX);

    /// Check if quantity is zero.
    #[inline(always)]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Get raw value.
    #[inline(always)]
    pub const fn as_raw(self) -> u64 {
        self.0
    }

    /// Saturating addition.
    #[inline(always)]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Saturating subtraction.
    #[inline(always)]
    pub const fn saturating_sub(self, other: Self) -> Self {
        Self(self.0.saturating_sub(other.0))
    }

    /// Checked subtraction.
    #[inline(always)]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Minimum of two quantities.
    #[inline(always)]
    pub const fn min(self, other: Self) -> Self {
        if self.0 < other.0 { self } else { other }
    }
}

impl Add for Quantity {
    type Output = Self;

    #[inline(always)]
    fn add(self, other: Self) -> Self {
        Self(self.0 + other.0)
    }
}

impl Sub for Quantity {
    type Output = Self;

    #[inline(always)]
    fn sub(self, other: Self) -> Self {
        Self(self.0 - other.0)
    }
}

impl core::iter::Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, q| acc + q)
    }
}

impl fmt::Display for Quantity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
