//! Distances in metres.
//!
//! Capture ranges, Gaussian bandwidths and POI-to-demand separations are
//! carried as [`Meters`] so they cannot be confused with port counts, which
//! stay plain `f64` supply and `u32` ports.
//!
//! ```
//! use evcs_core::units::Meters;
//!
//! let capture = Meters(3000.0);
//! let bandwidth = Meters(1000.0);
//! assert!(bandwidth < capture);
//! assert_eq!(capture.to_km(), 3.0);
//! ```

use serde::{Deserialize, Serialize};
use std::ops::{Add, Div, Mul, Neg, Sub};

macro_rules! impl_unit_ops {
    ($type:ty, $unit_name:literal) => {
        impl Add for $type {
            type Output = Self;
            fn add(self, rhs: Self) -> Self::Output {
                Self(self.0 + rhs.0)
            }
        }

        impl Sub for $type {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self::Output {
                Self(self.0 - rhs.0)
            }
        }

        impl Neg for $type {
            type Output = Self;
            fn neg(self) -> Self::Output {
                Self(-self.0)
            }
        }

        impl Mul<f64> for $type {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self::Output {
                Self(self.0 * rhs)
            }
        }

        impl Mul<$type> for f64 {
            type Output = $type;
            fn mul(self, rhs: $type) -> Self::Output {
                <$type>::new(self * rhs.0)
            }
        }

        impl Div<f64> for $type {
            type Output = Self;
            fn div(self, rhs: f64) -> Self::Output {
                Self(self.0 / rhs)
            }
        }

        impl Div<$type> for $type {
            type Output = f64;
            fn div(self, rhs: $type) -> Self::Output {
                self.0 / rhs.0
            }
        }

        impl std::fmt::Display for $type {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{:.4} {}", self.0, $unit_name)
            }
        }

        impl $type {
            /// Create a new value
            #[inline]
            pub const fn new(value: f64) -> Self {
                Self(value)
            }

            /// Get the raw numeric value
            #[inline]
            pub const fn value(self) -> f64 {
                self.0
            }

            #[inline]
            pub fn is_finite(self) -> bool {
                self.0.is_finite()
            }

            #[inline]
            pub fn min(self, other: Self) -> Self {
                Self(self.0.min(other.0))
            }

            #[inline]
            pub fn max(self, other: Self) -> Self {
                Self(self.0.max(other.0))
            }

            #[inline]
            pub fn clamp(self, min: Self, max: Self) -> Self {
                Self(self.0.clamp(min.0, max.0))
            }
        }

        impl std::iter::Sum for $type {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }

        impl<'a> std::iter::Sum<&'a $type> for $type {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                Self(iter.map(|x| x.0).sum())
            }
        }
    };
}

/// Planar distance in metres (EPSG:3857).
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[repr(transparent)]
pub struct Meters(pub f64);

impl_unit_ops!(Meters, "m");

impl Meters {
    pub fn from_km(km: f64) -> Self {
        Self(km * 1000.0)
    }

    pub fn to_km(self) -> f64 {
        self.0 / 1000.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_km_conversion() {
        assert_eq!(Meters::from_km(3.0), Meters(3000.0));
        assert!((Meters(1500.0).to_km() - 1.5).abs() < 1e-12);
    }

    #[test]
    fn test_sum_iterator() {
        let legs = vec![Meters(200.0), Meters(300.0), Meters(2500.0)];
        let total: Meters = legs.iter().sum();
        assert_eq!(total.value(), 3000.0);
    }

    #[test]
    fn test_min_max_clamp() {
        assert_eq!(Meters(5000.0).clamp(Meters(0.0), Meters(4000.0)), Meters(4000.0));
        assert_eq!(Meters(10.0).min(Meters(5.0)), Meters(5.0));
        assert_eq!(Meters(10.0).max(Meters(5.0)), Meters(10.0));
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Meters(3000.0)), "3000.0000 m");
    }
}
