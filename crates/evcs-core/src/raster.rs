//! North-up raster grids for demand and capacity maps.
//!
//! Row 0 is the northern edge. Cell coordinates returned by
//! [`Raster::cell_center`] are cell centres in the raster CRS.

use std::ops::Range;

use geo::{Coord, MultiPolygon, Rect};
use serde::{Deserialize, Serialize};

use crate::error::{EvcsError, EvcsResult};
use crate::geometry::{buffered_bounds, contains, distance, within_buffer};
use crate::units::Meters;
use crate::DemandPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Raster {
    pub ncols: usize,
    pub nrows: usize,
    /// Western edge of column 0
    pub x_min: f64,
    /// Northern edge of row 0
    pub y_max: f64,
    pub cell_size: f64,
    pub nodata: Option<f64>,
    values: Vec<f64>,
}

impl Raster {
    /// Zero-filled grid.
    pub fn new(
        ncols: usize,
        nrows: usize,
        x_min: f64,
        y_max: f64,
        cell_size: f64,
        nodata: Option<f64>,
    ) -> EvcsResult<Self> {
        Self::from_values(
            ncols,
            nrows,
            x_min,
            y_max,
            cell_size,
            nodata,
            vec![0.0; ncols * nrows],
        )
    }

    pub fn from_values(
        ncols: usize,
        nrows: usize,
        x_min: f64,
        y_max: f64,
        cell_size: f64,
        nodata: Option<f64>,
        values: Vec<f64>,
    ) -> EvcsResult<Self> {
        if ncols == 0 || nrows == 0 {
            return Err(EvcsError::Validation(format!(
                "raster must have at least one cell (got {ncols}x{nrows})"
            )));
        }
        if !(cell_size.is_finite() && cell_size > 0.0) {
            return Err(EvcsError::Validation(format!(
                "raster cell size must be positive (got {cell_size})"
            )));
        }
        if values.len() != ncols * nrows {
            return Err(EvcsError::Validation(format!(
                "raster expects {} values, got {}",
                ncols * nrows,
                values.len()
            )));
        }
        Ok(Self {
            ncols,
            nrows,
            x_min,
            y_max,
            cell_size,
            nodata,
            values,
        })
    }

    /// Same geometry, all cells zero.
    pub fn zeros_like(&self) -> Self {
        Self {
            values: vec![0.0; self.values.len()],
            ..self.clone()
        }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn x_max(&self) -> f64 {
        self.x_min + self.ncols as f64 * self.cell_size
    }

    pub fn y_min(&self) -> f64 {
        self.y_max - self.nrows as f64 * self.cell_size
    }

    fn is_valid(&self, value: f64) -> bool {
        value.is_finite() && self.nodata.map_or(true, |nd| value != nd)
    }

    /// Cell value, `None` for nodata or out-of-range indices.
    pub fn get(&self, row: usize, col: usize) -> Option<f64> {
        if row >= self.nrows || col >= self.ncols {
            return None;
        }
        let value = self.values[row * self.ncols + col];
        self.is_valid(value).then_some(value)
    }

    pub fn set(&mut self, row: usize, col: usize, value: f64) -> EvcsResult<()> {
        if row >= self.nrows || col >= self.ncols {
            return Err(EvcsError::Validation(format!(
                "cell ({row}, {col}) outside {}x{} raster",
                self.nrows, self.ncols
            )));
        }
        self.values[row * self.ncols + col] = value;
        Ok(())
    }

    pub fn cell_center(&self, row: usize, col: usize) -> Coord<f64> {
        Coord {
            x: self.x_min + (col as f64 + 0.5) * self.cell_size,
            y: self.y_max - (row as f64 + 0.5) * self.cell_size,
        }
    }

    /// Cell containing `(x, y)`, if inside the grid.
    pub fn cell_at(&self, x: f64, y: f64) -> Option<(usize, usize)> {
        if x < self.x_min || x >= self.x_max() || y <= self.y_min() || y > self.y_max {
            return None;
        }
        let col = ((x - self.x_min) / self.cell_size).floor() as usize;
        let row = ((self.y_max - y) / self.cell_size).floor() as usize;
        (row < self.nrows && col < self.ncols).then_some((row, col))
    }

    pub fn same_grid(&self, other: &Raster) -> bool {
        const TOL: f64 = 1e-6;
        self.ncols == other.ncols
            && self.nrows == other.nrows
            && (self.x_min - other.x_min).abs() < TOL
            && (self.y_max - other.y_max).abs() < TOL
            && (self.cell_size - other.cell_size).abs() < TOL
    }

    /// Valid cells as `(row, col, value)`.
    pub fn cells(&self) -> impl Iterator<Item = (usize, usize, f64)> + '_ {
        self.values
            .iter()
            .enumerate()
            .filter(|(_, v)| self.is_valid(**v))
            .map(|(idx, v)| (idx / self.ncols, idx % self.ncols, *v))
    }

    fn window(&self, rect: Rect<f64>) -> (Range<usize>, Range<usize>) {
        let clamp = |v: f64, n: usize| -> usize {
            if v <= 0.0 {
                0
            } else {
                (v as usize).min(n)
            }
        };
        let cs = self.cell_size;
        let rows = clamp(((self.y_max - rect.max().y) / cs).floor(), self.nrows)
            ..clamp(((self.y_max - rect.min().y) / cs).ceil(), self.nrows);
        let cols = clamp(((rect.min().x - self.x_min) / cs).floor(), self.ncols)
            ..clamp(((rect.max().x - self.x_min) / cs).ceil(), self.ncols);
        (rows, cols)
    }

    /// Sum of valid cells whose centre lies inside the region.
    pub fn sum_within(&self, region: &MultiPolygon<f64>) -> f64 {
        let Some(bounds) = buffered_bounds(region, Meters(0.0)) else {
            return 0.0;
        };
        let (rows, cols) = self.window(bounds);
        let mut total = 0.0;
        for row in rows {
            for col in cols.clone() {
                if let Some(v) = self.get(row, col) {
                    if contains(region, self.cell_center(row, col)) {
                        total += v;
                    }
                }
            }
        }
        total
    }

    /// Positive cells whose centre is within `radius` of the region,
    /// in row-major order.
    pub fn demand_points_near(&self, region: &MultiPolygon<f64>, radius: Meters) -> Vec<DemandPoint> {
        let Some(bounds) = buffered_bounds(region, radius) else {
            return Vec::new();
        };
        let (rows, cols) = self.window(bounds);
        let mut points = Vec::new();
        for row in rows {
            for col in cols.clone() {
                let Some(v) = self.get(row, col) else {
                    continue;
                };
                if v <= 0.0 {
                    continue;
                }
                let center = self.cell_center(row, col);
                if within_buffer(center, region, radius) {
                    points.push(DemandPoint {
                        x: center.x,
                        y: center.y,
                        demand: v,
                    });
                }
            }
        }
        points
    }

    /// Positive cells whose centre lies within `radius` of `center`.
    pub fn points_within(&self, center: Coord<f64>, radius: Meters) -> Vec<DemandPoint> {
        let r = radius.value();
        let rect = Rect::new(
            Coord { x: center.x - r, y: center.y - r },
            Coord { x: center.x + r, y: center.y + r },
        );
        let (rows, cols) = self.window(rect);
        let mut points = Vec::new();
        for row in rows {
            for col in cols.clone() {
                match self.get(row, col) {
                    Some(v) if v > 0.0 => {
                        let c = self.cell_center(row, col);
                        if distance(c, center) <= r {
                            points.push(DemandPoint { x: c.x, y: c.y, demand: v });
                        }
                    }
                    _ => {}
                }
            }
        }
        points
    }

    /// Min-max normalisation of valid cells into `[0, 1]`.
    ///
    /// A constant layer normalises to all zeros; nodata cells are kept.
    pub fn normalized(&self) -> Self {
        let (lo, hi) = self
            .cells()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), (_, _, v)| {
                (lo.min(v), hi.max(v))
            });
        let span = hi - lo;
        let values = self
            .values
            .iter()
            .map(|v| {
                if !self.is_valid(*v) {
                    *v
                } else if span > 0.0 {
                    (v - lo) / span
                } else {
                    0.0
                }
            })
            .collect();
        Self {
            values,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{polygon, Polygon};

    fn grid() -> Raster {
        // 4x4 grid of 100 m cells covering x in [0, 400], y in [0, 400]
        let values = (0..16).map(|v| v as f64).collect();
        Raster::from_values(4, 4, 0.0, 400.0, 100.0, Some(-9999.0), values).unwrap()
    }

    fn square(x0: f64, y0: f64, size: f64) -> MultiPolygon<f64> {
        let p: Polygon<f64> = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        MultiPolygon::new(vec![p])
    }

    #[test]
    fn rejects_mismatched_value_count() {
        let err = Raster::from_values(2, 2, 0.0, 0.0, 1.0, None, vec![1.0; 3]).unwrap_err();
        assert!(matches!(err, EvcsError::Validation(_)));
    }

    #[test]
    fn cell_center_and_lookup_agree() {
        let r = grid();
        let c = r.cell_center(1, 2);
        assert_eq!(c, Coord { x: 250.0, y: 250.0 });
        assert_eq!(r.cell_at(c.x, c.y), Some((1, 2)));
        assert_eq!(r.cell_at(-1.0, 10.0), None);
    }

    #[test]
    fn points_within_radius_of_a_point() {
        let r = grid();
        let values: Vec<f64> = r
            .points_within(Coord { x: 200.0, y: 200.0 }, Meters(100.0))
            .iter()
            .map(|p| p.demand)
            .collect();
        assert_eq!(values, vec![5.0, 6.0, 9.0, 10.0]);
    }

    #[test]
    fn nodata_cells_are_skipped() {
        let mut r = grid();
        r.set(0, 0, -9999.0).unwrap();
        assert_eq!(r.get(0, 0), None);
        assert_eq!(r.cells().count(), 15);
    }

    #[test]
    fn sums_cells_inside_region() {
        let r = grid();
        // covers cells (row 2..4, col 0..2) -> values 8, 9, 12, 13
        let region = square(0.0, 0.0, 200.0);
        assert!((r.sum_within(&region) - 42.0).abs() < 1e-12);
    }

    #[test]
    fn demand_points_respect_buffer_and_positivity() {
        let r = grid();
        let region = square(0.0, 0.0, 100.0);
        // cell (3, 0) is inside, (2, 0) and (3, 1) sit 50 m off an edge,
        // (2, 1) is ~70.7 m off the corner
        let points = r.demand_points_near(&region, Meters(50.0));
        let values: Vec<f64> = points.iter().map(|p| p.demand).collect();
        assert_eq!(values, vec![8.0, 12.0, 13.0]);

        let tight = r.demand_points_near(&region, Meters(0.0));
        assert_eq!(tight.len(), 1);
        assert_eq!(tight[0].demand, 12.0);
    }

    #[test]
    fn normalized_spans_unit_interval() {
        let n = grid().normalized();
        assert_eq!(n.get(0, 0), Some(0.0));
        assert_eq!(n.get(3, 3), Some(1.0));
    }
}
