use std::collections::HashSet;

use evcs_core::geometry::distance_matrix;
use evcs_core::{DemandPoint, EvcsError, EvcsResult, Meters, Poi, Raster, Region};
use tracing::debug;

use crate::accessibility::TwoStepFca;

/// Everything the optimizer needs for one region, cut out of the inputs.
#[derive(Debug, Clone)]
pub struct RegionProblem {
    pub region_id: String,
    pub total_supply: f64,
    pub max_sites: usize,
    pub demand_points: Vec<DemandPoint>,
    /// Candidate sites inside the region
    pub candidates: Vec<Poi>,
    /// `demand_points × candidates` distances in metres
    pub distances: Vec<Vec<f64>>,
    /// Indices into `candidates` of existing stations
    pub initial_sites: Vec<usize>,
}

impl RegionProblem {
    /// Cut a region out of the demand map and candidate set.
    ///
    /// Demand comes from positive cells within `capture_range` of the region,
    /// so stations near the border still see demand across it. Candidates
    /// must lie inside the region.
    pub fn prepare(
        region: &Region,
        demand: &Raster,
        pois: &[Poi],
        capture_range: Meters,
    ) -> EvcsResult<Self> {
        let total_supply = region.total_supply.ok_or_else(|| {
            EvcsError::Config(format!(
                "region '{}' has no total supply; plan candidates first",
                region.id
            ))
        })?;
        let max_sites = region.max_sites.ok_or_else(|| {
            EvcsError::Config(format!(
                "region '{}' has no site budget; plan candidates first",
                region.id
            ))
        })?;

        let demand_points = demand.demand_points_near(&region.geometry, capture_range);
        if demand_points.is_empty() {
            return Err(EvcsError::EmptyInput(format!(
                "region '{}' has no demand within {}",
                region.id, capture_range
            )));
        }

        let candidates: Vec<Poi> = pois
            .iter()
            .filter(|poi| region.contains(poi.coord()))
            .cloned()
            .collect();
        if candidates.is_empty() {
            return Err(EvcsError::EmptyInput(format!(
                "region '{}' has no candidate sites",
                region.id
            )));
        }

        let initial: HashSet<&str> = region.initial_osm_ids.iter().map(String::as_str).collect();
        let initial_sites: Vec<usize> = candidates
            .iter()
            .enumerate()
            .filter(|(_, poi)| initial.contains(poi.osm_id.as_str()))
            .map(|(idx, _)| idx)
            .collect();

        let demand_coords: Vec<_> = demand_points.iter().map(DemandPoint::coord).collect();
        let candidate_coords: Vec<_> = candidates.iter().map(Poi::coord).collect();
        let distances = distance_matrix(&demand_coords, &candidate_coords);

        debug!(
            region = %region.id,
            demand_points = demand_points.len(),
            candidates = candidates.len(),
            initial = initial_sites.len(),
            "prepared region"
        );

        Ok(Self {
            region_id: region.id.clone(),
            total_supply,
            max_sites,
            demand_points,
            candidates,
            distances,
            initial_sites,
        })
    }

    pub fn demand_values(&self) -> Vec<f64> {
        self.demand_points.iter().map(|p| p.demand).collect()
    }

    pub fn model(&self, bandwidth: Meters, capture_range: Meters) -> EvcsResult<TwoStepFca> {
        TwoStepFca::new(
            self.distances.clone(),
            self.demand_values(),
            self.total_supply,
            bandwidth,
            capture_range,
        )
    }
}
