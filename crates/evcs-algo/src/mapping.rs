//! Demand and capacity map construction.
//!
//! Both maps live on a template grid. The demand map is a weighted sum of
//! min-max normalised layers; the capacity map scales vehicle registrations
//! into projected charging ports.

use geo::Coord;
use rstar::RTree;
use serde::{Deserialize, Serialize};
use tracing::debug;

use evcs_core::{ChargerType, EvcsError, EvcsResult, Meters, Raster};

/// Layer weights for the demand map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerWeights {
    pub od: f64,
    pub poi_density: f64,
    pub road_proximity: f64,
}

impl Default for LayerWeights {
    fn default() -> Self {
        Self {
            od: 0.5,
            poi_density: 0.3,
            road_proximity: 0.2,
        }
    }
}

impl LayerWeights {
    fn validate(&self) -> EvcsResult<()> {
        let all = [self.od, self.poi_density, self.road_proximity];
        if all.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(EvcsError::Validation(format!(
                "layer weights must be finite and non-negative: {self:?}"
            )));
        }
        Ok(())
    }
}

pub struct DemandMapBuilder {
    grid: Raster,
    od: Option<Raster>,
    pois: Vec<Coord<f64>>,
    roads: Vec<Coord<f64>>,
    weights: LayerWeights,
    road_scale: Meters,
}

impl DemandMapBuilder {
    /// Start from the grid every layer must share.
    pub fn new(grid: &Raster) -> Self {
        Self {
            grid: grid.zeros_like(),
            od: None,
            pois: Vec::new(),
            roads: Vec::new(),
            weights: LayerWeights::default(),
            road_scale: Meters(1000.0),
        }
    }

    /// Origin-destination trip-end layer.
    pub fn od(mut self, od: Raster) -> EvcsResult<Self> {
        if !od.same_grid(&self.grid) {
            return Err(EvcsError::Validation(format!(
                "OD raster grid {}x{} @ {} does not match the template {}x{} @ {}",
                od.ncols, od.nrows, od.cell_size, self.grid.ncols, self.grid.nrows, self.grid.cell_size
            )));
        }
        self.od = Some(od);
        Ok(self)
    }

    pub fn pois(mut self, pois: impl IntoIterator<Item = Coord<f64>>) -> Self {
        self.pois.extend(pois);
        self
    }

    /// Road network vertices.
    pub fn roads(mut self, roads: impl IntoIterator<Item = Coord<f64>>) -> Self {
        self.roads.extend(roads);
        self
    }

    pub fn weights(mut self, weights: LayerWeights) -> Self {
        self.weights = weights;
        self
    }

    /// Distance at which road proximity decays to `1/e`.
    pub fn road_scale(mut self, scale: Meters) -> Self {
        self.road_scale = scale;
        self
    }

    fn poi_density(&self) -> EvcsResult<Raster> {
        let mut layer = self.grid.zeros_like();
        for p in &self.pois {
            if let Some((row, col)) = layer.cell_at(p.x, p.y) {
                let current = layer.get(row, col).unwrap_or(0.0);
                layer.set(row, col, current + 1.0)?;
            }
        }
        Ok(layer)
    }

    fn road_proximity(&self) -> EvcsResult<Raster> {
        let mut layer = self.grid.zeros_like();
        if self.roads.is_empty() {
            return Ok(layer);
        }
        let tree = RTree::bulk_load(self.roads.iter().map(|c| [c.x, c.y]).collect::<Vec<_>>());
        let scale = self.road_scale.value();
        for row in 0..layer.nrows {
            for col in 0..layer.ncols {
                let c = layer.cell_center(row, col);
                if let Some(nearest) = tree.nearest_neighbor(&[c.x, c.y]) {
                    let d = (nearest[0] - c.x).hypot(nearest[1] - c.y);
                    layer.set(row, col, (-d / scale).exp())?;
                }
            }
        }
        Ok(layer)
    }

    pub fn build(self) -> EvcsResult<Raster> {
        self.weights.validate()?;
        if !(self.road_scale.value() > 0.0) {
            return Err(EvcsError::Validation(format!(
                "road proximity scale must be positive (got {})",
                self.road_scale
            )));
        }

        let mut layers: Vec<(f64, Raster)> = Vec::new();
        if let Some(od) = &self.od {
            layers.push((self.weights.od, od.normalized()));
        }
        if !self.pois.is_empty() {
            layers.push((self.weights.poi_density, self.poi_density()?.normalized()));
        }
        if !self.roads.is_empty() {
            layers.push((self.weights.road_proximity, self.road_proximity()?.normalized()));
        }
        if layers.is_empty() {
            return Err(EvcsError::EmptyInput(
                "demand map needs at least one input layer".into(),
            ));
        }
        debug!(layers = layers.len(), cells = self.grid.values().len(), "building demand map");

        let mut out = self.grid.zeros_like();
        for row in 0..out.nrows {
            for col in 0..out.ncols {
                let value: f64 = layers
                    .iter()
                    .map(|(w, layer)| w * layer.get(row, col).unwrap_or(0.0))
                    .sum();
                out.set(row, col, value)?;
            }
        }
        Ok(out)
    }
}

/// Registered vehicles per charging port, by charger type.
pub fn default_vehicles_per_port(charger: ChargerType) -> f64 {
    match charger {
        ChargerType::Lv2 => 20.0,
        ChargerType::Dcfc => 100.0,
    }
}

/// Scales a registration raster into projected ports per cell.
#[derive(Debug, Clone)]
pub struct CapacityMapBuilder {
    registrations: Raster,
    growth: f64,
    penetration: f64,
}

impl CapacityMapBuilder {
    pub fn new(registrations: Raster) -> Self {
        Self {
            registrations,
            growth: 1.0,
            penetration: 1.0,
        }
    }

    /// Projected growth factor in total registrations.
    pub fn growth(mut self, growth: f64) -> Self {
        self.growth = growth;
        self
    }

    /// Projected EV share of registrations.
    pub fn penetration(mut self, rate: f64) -> Self {
        self.penetration = rate;
        self
    }

    pub fn build(&self, charger: ChargerType, vehicles_per_port: Option<f64>) -> EvcsResult<Raster> {
        let vpp = vehicles_per_port.unwrap_or_else(|| default_vehicles_per_port(charger));
        if !(vpp > 0.0 && vpp.is_finite()) {
            return Err(EvcsError::Validation(format!(
                "vehicles per port must be positive (got {vpp})"
            )));
        }
        if !(self.growth >= 0.0 && self.growth.is_finite()) {
            return Err(EvcsError::Validation(format!(
                "growth factor must be non-negative (got {})",
                self.growth
            )));
        }
        if !(0.0..=1.0).contains(&self.penetration) {
            return Err(EvcsError::Validation(format!(
                "penetration rate must be within [0, 1] (got {})",
                self.penetration
            )));
        }

        let factor = self.growth * self.penetration / vpp;
        let mut out = self.registrations.clone();
        for (row, col, v) in self.registrations.cells() {
            out.set(row, col, (v * factor).max(0.0))?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> Raster {
        Raster::new(3, 1, 0.0, 100.0, 100.0, None).unwrap()
    }

    #[test]
    fn od_only_map_is_normalised_and_weighted() {
        let od = Raster::from_values(3, 1, 0.0, 100.0, 100.0, None, vec![10.0, 20.0, 30.0]).unwrap();
        let map = DemandMapBuilder::new(&grid()).od(od).unwrap().build().unwrap();
        assert_eq!(map.values(), &[0.0, 0.25, 0.5]);
    }

    #[test]
    fn mismatched_grid_is_rejected() {
        let od = Raster::new(2, 1, 0.0, 100.0, 100.0, None).unwrap();
        assert!(matches!(
            DemandMapBuilder::new(&grid()).od(od),
            Err(EvcsError::Validation(_))
        ));
    }

    #[test]
    fn poi_density_counts_points_per_cell() {
        let pois = vec![
            Coord { x: 10.0, y: 50.0 },
            Coord { x: 20.0, y: 50.0 },
            Coord { x: 150.0, y: 50.0 },
            Coord { x: 900.0, y: 50.0 },
        ];
        let map = DemandMapBuilder::new(&grid())
            .pois(pois)
            .weights(LayerWeights {
                od: 0.0,
                poi_density: 1.0,
                road_proximity: 0.0,
            })
            .build()
            .unwrap();
        assert_eq!(map.values(), &[1.0, 0.5, 0.0]);
    }

    #[test]
    fn road_proximity_decays_with_distance() {
        let map = DemandMapBuilder::new(&grid())
            .roads([Coord { x: 50.0, y: 50.0 }])
            .weights(LayerWeights {
                od: 0.0,
                poi_density: 0.0,
                road_proximity: 1.0,
            })
            .build()
            .unwrap();
        let v = map.values();
        assert_eq!(v[0], 1.0);
        assert!(v[0] > v[1] && v[1] > v[2]);
        assert_eq!(v[2], 0.0);
    }

    #[test]
    fn no_layers_is_empty_input() {
        assert!(matches!(
            DemandMapBuilder::new(&grid()).build(),
            Err(EvcsError::EmptyInput(_))
        ));
    }

    #[test]
    fn capacity_scales_registrations() {
        let reg = Raster::from_values(3, 1, 0.0, 100.0, 100.0, None, vec![1000.0, 0.0, 400.0]).unwrap();
        let map = CapacityMapBuilder::new(reg)
            .growth(1.5)
            .penetration(0.2)
            .build(ChargerType::Lv2, None)
            .unwrap();
        let expected = [15.0, 0.0, 6.0];
        for (v, e) in map.values().iter().zip(expected) {
            assert!((v - e).abs() < 1e-9);
        }

        let bad = CapacityMapBuilder::new(grid()).penetration(1.5);
        assert!(bad.build(ChargerType::Dcfc, None).is_err());
    }
}
