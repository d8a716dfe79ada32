//! Gaussian distance decay with a hard catchment cutoff.
//!
//! ```text
//! f(d) = exp(-d² / (2·h²))   for d < capture_range
//!      = 0                    otherwise
//! ```
//!
//! `h` is the bandwidth. Urban catchments use h = 1 km with a 3 km cutoff;
//! suburban, rural and highway catchments use h = 1.5 km with a 4 km cutoff.

use evcs_core::Meters;

#[inline]
pub fn gaussian_decay(distance: f64, bandwidth: Meters, capture_range: Meters) -> f64 {
    if distance >= capture_range.value() {
        return 0.0;
    }
    let h = bandwidth.value();
    (-(distance * distance) / (2.0 * h * h)).exp()
}

/// Element-wise decay of a distance matrix.
pub fn decay_matrix(distances: &[Vec<f64>], bandwidth: Meters, capture_range: Meters) -> Vec<Vec<f64>> {
    distances
        .iter()
        .map(|row| {
            row.iter()
                .map(|d| gaussian_decay(*d, bandwidth, capture_range))
                .collect()
        })
        .collect()
}
