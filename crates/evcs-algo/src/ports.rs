//! Rounding continuous supply into whole charging ports.
//!
//! The QP returns fractional supply. Stations are built with whole ports, so
//! the final allocation is rounded with the largest-remainder method: floor
//! every value, clamp into the per-site bounds, then hand out (or take back)
//! single ports by fractional remainder until the total matches
//! `round(Σ supply)`. When the bounds make the target unreachable the
//! closest reachable total is returned; bounds always win.

use evcs_core::PortBounds;

pub fn round_to_ports(supply: &[f64], bounds: PortBounds) -> Vec<u32> {
    if supply.is_empty() {
        return Vec::new();
    }
    let lower = bounds.min.ceil().max(0.0) as i64;
    let upper = bounds.max.map(|m| m.floor() as i64).unwrap_or(i64::MAX);
    let target = supply.iter().sum::<f64>().round() as i64;

    let mut ports: Vec<i64> = supply
        .iter()
        .map(|s| (s.max(0.0).floor() as i64).clamp(lower, upper.max(lower)))
        .collect();
    let remainders: Vec<f64> = supply.iter().map(|s| s - s.floor()).collect();

    // largest remainder first; ties go to the lower index
    let mut order: Vec<usize> = (0..supply.len()).collect();
    order.sort_by(|a, b| remainders[*b].total_cmp(&remainders[*a]).then(a.cmp(b)));

    let mut diff = target - ports.iter().sum::<i64>();
    while diff > 0 {
        let mut progressed = false;
        for &j in &order {
            if diff == 0 {
                break;
            }
            if ports[j] < upper {
                ports[j] += 1;
                diff -= 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }
    while diff < 0 {
        let mut progressed = false;
        for &j in order.iter().rev() {
            if diff == 0 {
                break;
            }
            if ports[j] > lower {
                ports[j] -= 1;
                diff += 1;
                progressed = true;
            }
        }
        if !progressed {
            break;
        }
    }

    ports.into_iter().map(|p| p.max(0) as u32).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn largest_remainder_preserves_total() {
        let ports = round_to_ports(&[2.4, 3.6, 4.0], PortBounds::default());
        assert_eq!(ports, vec![2, 4, 4]);
    }

    #[test]
    fn solver_noise_rounds_cleanly() {
        let ports = round_to_ports(&[1.999_999_9, 25.000_000_1, 13.0], PortBounds::new(2.0, Some(25.0)));
        assert_eq!(ports, vec![2, 25, 13]);
    }

    #[test]
    fn bounds_win_over_total() {
        // three sites at min 2 cannot share 5 ports
        let ports = round_to_ports(&[1.5, 1.5, 2.0], PortBounds::new(2.0, Some(25.0)));
        assert_eq!(ports, vec![2, 2, 2]);
    }

    #[test]
    fn surplus_is_removed_from_smallest_remainders() {
        // floors clamp up to the minimum, overshooting the target of 5
        let ports = round_to_ports(&[0.4, 0.4, 4.2], PortBounds::default());
        assert_eq!(ports.iter().sum::<u32>(), 5);
        assert!(ports.iter().all(|p| *p >= 1));
        assert_eq!(ports, vec![1, 1, 3]);
    }

    #[test]
    fn empty_supply() {
        assert!(round_to_ports(&[], PortBounds::default()).is_empty());
    }
}
