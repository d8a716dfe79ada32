//! Planar geometry helpers.
//!
//! Everything runs in a projected metric CRS (EPSG:3857), so distances are
//! plain Euclidean. Buffering a region by the capture range is expressed as
//! a distance test against the region instead of constructing a buffered
//! polygon.

use geo::{BoundingRect, Closest, ClosestPoint, Contains, Coord, MultiPolygon, Point, Rect};

use crate::units::Meters;

#[inline]
pub fn distance(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

/// Distance from `point` to the region; zero inside or on the boundary.
///
/// Multipolygon parts are treated as their union.
pub fn distance_to_region(point: Coord<f64>, region: &MultiPolygon<f64>) -> f64 {
    let p = Point::from(point);
    if region.contains(&p) {
        return 0.0;
    }
    region
        .0
        .iter()
        .filter_map(|polygon| match polygon.closest_point(&p) {
            Closest::Intersection(_) => Some(0.0),
            Closest::SinglePoint(q) => Some(distance(point, q.0)),
            Closest::Indeterminate => None,
        })
        .fold(f64::INFINITY, f64::min)
}

pub fn within_buffer(point: Coord<f64>, region: &MultiPolygon<f64>, radius: Meters) -> bool {
    distance_to_region(point, region) <= radius.value()
}

pub fn contains(region: &MultiPolygon<f64>, point: Coord<f64>) -> bool {
    region.contains(&Point::from(point))
}

/// Bounding box of the region grown by `radius` on every side.
pub fn buffered_bounds(region: &MultiPolygon<f64>, radius: Meters) -> Option<Rect<f64>> {
    region.bounding_rect().map(|rect| {
        let r = radius.value();
        Rect::new(
            Coord {
                x: rect.min().x - r,
                y: rect.min().y - r,
            },
            Coord {
                x: rect.max().x + r,
                y: rect.max().y + r,
            },
        )
    })
}

/// Dense `rows.len() × cols.len()` Euclidean distance matrix.
pub fn distance_matrix(rows: &[Coord<f64>], cols: &[Coord<f64>]) -> Vec<Vec<f64>> {
    rows.iter()
        .map(|r| cols.iter().map(|c| distance(*r, *c)).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn unit_square(size: f64) -> MultiPolygon<f64> {
        let square: Polygon<f64> = polygon![
            (x: 0.0, y: 0.0),
            (x: size, y: 0.0),
            (x: size, y: size),
            (x: 0.0, y: size),
            (x: 0.0, y: 0.0),
        ];
        MultiPolygon::new(vec![square])
    }

    #[test]
    fn inside_point_has_zero_distance() {
        let region = unit_square(100.0);
        assert_eq!(distance_to_region(Coord { x: 50.0, y: 50.0 }, &region), 0.0);
    }

    #[test]
    fn outside_point_measures_to_edge() {
        let region = unit_square(100.0);
        let d = distance_to_region(Coord { x: 130.0, y: 50.0 }, &region);
        assert!((d - 30.0).abs() < 1e-9);
        let corner = distance_to_region(Coord { x: 103.0, y: 104.0 }, &region);
        assert!((corner - 5.0).abs() < 1e-9);
    }

    #[test]
    fn buffer_test_is_inclusive() {
        let region = unit_square(100.0);
        assert!(within_buffer(Coord { x: 130.0, y: 50.0 }, &region, Meters(30.0)));
        assert!(!within_buffer(Coord { x: 131.0, y: 50.0 }, &region, Meters(30.0)));
    }

    #[test]
    fn buffered_bounds_grow_each_side() {
        let rect = buffered_bounds(&unit_square(10.0), Meters(5.0)).unwrap();
        assert_eq!(rect.min(), Coord { x: -5.0, y: -5.0 });
        assert_eq!(rect.max(), Coord { x: 15.0, y: 15.0 });
    }

    #[test]
    fn matrix_shape_and_values() {
        let rows = [Coord { x: 0.0, y: 0.0 }, Coord { x: 3.0, y: 0.0 }];
        let cols = [Coord { x: 0.0, y: 4.0 }];
        let m = distance_matrix(&rows, &cols);
        assert_eq!(m.len(), 2);
        assert_eq!(m[0].len(), 1);
        assert!((m[1][0] - 5.0).abs() < 1e-12);
    }
}
