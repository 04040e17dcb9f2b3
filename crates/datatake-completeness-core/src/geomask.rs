//! Footprint repair and geo mask intersection.
//!
//! Footprints arrive as raw `[lon, lat]` rings straight from acquisition
//! plans. Before any area computation they are validated, repaired into a
//! valid multipolygon and, when they cross the antimeridian, split into an
//! eastern and a western part.
//!
//! Areas are planar in degrees². Only ratios are reported, so the unit
//! cancels out.

use std::collections::{BTreeMap, HashMap};

use geo::{Area, BooleanOps, Coord, LineString, MultiPolygon, Polygon, Rect, Translate};

use crate::error::GeometryError;

const AREA_EPSILON: f64 = 1e-12;

/// A named region (ocean, polar zone, ...) used to gate product types.
#[derive(Debug, Clone)]
pub struct GeoMask {
    name: String,
    shape: MultiPolygon<f64>,
}

impl GeoMask {
    pub fn new(name: impl Into<String>, shape: MultiPolygon<f64>) -> Self {
        Self {
            name: name.into(),
            shape,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn shape(&self) -> &MultiPolygon<f64> {
        &self.shape
    }

    pub fn polygon_count(&self) -> usize {
        self.shape.0.len()
    }
}

/// Holds the loaded masks and computes footprint coverage against them.
#[derive(Debug, Clone, Default)]
pub struct GeoMaskIntersector {
    masks: HashMap<String, GeoMask>,
}

impl GeoMaskIntersector {
    pub fn new(masks: impl IntoIterator<Item = GeoMask>) -> Self {
        Self {
            masks: masks
                .into_iter()
                .map(|mask| (mask.name.clone(), mask))
                .collect(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&GeoMask> {
        self.masks.get(name)
    }

    pub fn mask_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.masks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Percentage of the footprint's area covered by each named mask,
    /// clamped to `[0, 100]`.
    pub fn intersect_with_masks(
        &self,
        footprint: &[[f64; 2]],
        mask_names: &[&str],
    ) -> Result<BTreeMap<String, f64>, GeometryError> {
        let footprint = normalize_footprint(footprint)?;
        let footprint_area = footprint.unsigned_area();

        let mut coverage = BTreeMap::new();
        for &name in mask_names {
            let mask = self
                .masks
                .get(name)
                .ok_or_else(|| GeometryError::UnknownMask(name.to_string()))?;
            let overlap = footprint.intersection(&mask.shape).unsigned_area();
            let percentage = (overlap / footprint_area * 100.0).clamp(0.0, 100.0);
            coverage.insert(name.to_string(), percentage);
        }
        Ok(coverage)
    }

    pub fn coverage(&self, footprint: &[[f64; 2]], mask_name: &str) -> Result<f64, GeometryError> {
        let coverage = self.intersect_with_masks(footprint, &[mask_name])?;
        Ok(coverage.get(mask_name).copied().unwrap_or(0.0))
    }
}

/// Validate and repair a raw footprint ring.
///
/// The result is a valid multipolygon in `[-180, 180]` longitude space
/// with a strictly positive area.
pub fn normalize_footprint(ring: &[[f64; 2]]) -> Result<MultiPolygon<f64>, GeometryError> {
    let mut coords = clean_ring(ring)?;

    let crosses = crosses_antimeridian(&coords);
    if crosses {
        for c in coords.iter_mut() {
            if c.x < 0.0 {
                c.x += 360.0;
            }
        }
    }

    let raw = MultiPolygon::new(vec![Polygon::new(LineString::from(coords), vec![])]);
    // Self-union resolves self-intersections (bowties) into valid parts.
    let mut shape = raw.union(&MultiPolygon::new(vec![]));
    if crosses {
        shape = split_at_antimeridian(&shape);
    }

    if shape.unsigned_area() <= AREA_EPSILON {
        return Err(GeometryError::Degenerate);
    }
    Ok(shape)
}

fn clean_ring(ring: &[[f64; 2]]) -> Result<Vec<Coord<f64>>, GeometryError> {
    let mut coords: Vec<Coord<f64>> = Vec::with_capacity(ring.len());
    for &[lon, lat] in ring {
        if !lon.is_finite() || !lat.is_finite() {
            return Err(GeometryError::NonFinite);
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(GeometryError::LatitudeOutOfRange(lat));
        }
        let c = Coord {
            x: wrap_longitude(lon),
            y: lat,
        };
        if coords.last() != Some(&c) {
            coords.push(c);
        }
    }
    // Polygon::new closes the ring itself.
    if coords.len() > 1 && coords.first() == coords.last() {
        coords.pop();
    }
    if coords.len() < 3 {
        return Err(GeometryError::TooFewPoints(coords.len()));
    }
    Ok(coords)
}

fn wrap_longitude(lon: f64) -> f64 {
    if (-180.0..=180.0).contains(&lon) {
        lon
    } else {
        (lon + 180.0).rem_euclid(360.0) - 180.0
    }
}

/// A ring crosses the antimeridian when one of its edges, closing edge
/// included, jumps by more than half the globe.
fn crosses_antimeridian(coords: &[Coord<f64>]) -> bool {
    (0..coords.len()).any(|i| {
        let next = coords[(i + 1) % coords.len()];
        (next.x - coords[i].x).abs() > 180.0
    })
}

/// Split a shape expressed in `[0, 360]` longitude space back into
/// `[-180, 180]`.
fn split_at_antimeridian(shape: &MultiPolygon<f64>) -> MultiPolygon<f64> {
    let eastern_band = MultiPolygon::new(vec![Rect::new(
        Coord { x: 0.0, y: -90.0 },
        Coord { x: 180.0, y: 90.0 },
    )
    .to_polygon()]);
    let western_band = MultiPolygon::new(vec![Rect::new(
        Coord { x: 180.0, y: -90.0 },
        Coord { x: 360.0, y: 90.0 },
    )
    .to_polygon()]);

    let eastern = shape.intersection(&eastern_band);
    let western = shape.intersection(&western_band).translate(-360.0, 0.0);
    eastern.union(&western)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rect(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(
            Coord {
                x: min_lon,
                y: min_lat,
            },
            Coord {
                x: max_lon,
                y: max_lat,
            },
        )
        .to_polygon()])
    }

    fn ring(min_lon: f64, min_lat: f64, max_lon: f64, max_lat: f64) -> Vec<[f64; 2]> {
        vec![
            [min_lon, min_lat],
            [max_lon, min_lat],
            [max_lon, max_lat],
            [min_lon, max_lat],
            [min_lon, min_lat],
        ]
    }

    fn intersector() -> GeoMaskIntersector {
        GeoMaskIntersector::new([
            GeoMask::new("OCN", rect(94.47, 0.0, 120.0, 30.0)),
            GeoMask::new("SLC", rect(-60.0, 60.0, -30.0, 80.0)),
        ])
    }

    // The footprint spans 93..96 E; the ocean mask starts at 94.47 E, so
    // 1.53 of its 3 degrees of width are covered.
    #[test]
    fn partial_ocean_coverage() {
        let coverage = intersector()
            .intersect_with_masks(&ring(93.0, 15.0, 96.0, 17.0), &["OCN", "SLC"])
            .unwrap();
        assert!((coverage["OCN"] - 51.0).abs() < 0.01, "{:?}", coverage);
        assert_eq!(coverage["SLC"], 0.0);
    }

    #[test]
    fn landlocked_footprint_has_no_coverage() {
        let coverage = intersector()
            .intersect_with_masks(&ring(20.0, 10.0, 22.0, 12.0), &["OCN", "SLC"])
            .unwrap();
        assert_eq!(coverage["OCN"], 0.0);
        assert_eq!(coverage["SLC"], 0.0);
    }

    #[test]
    fn fully_covered_footprint_is_clamped_to_100() {
        let pct = intersector()
            .coverage(&ring(100.0, 5.0, 101.0, 6.0), "OCN")
            .unwrap();
        assert!((pct - 100.0).abs() < 1e-6);
        assert!(pct <= 100.0);
    }

    #[test]
    fn antimeridian_footprint_is_split() {
        let footprint = vec![[179.0, 0.0], [-179.0, 0.0], [-179.0, 1.0], [179.0, 1.0]];
        let shape = normalize_footprint(&footprint).unwrap();
        assert_eq!(shape.0.len(), 2);
        assert!((shape.unsigned_area() - 2.0).abs() < 1e-6);

        let masks = GeoMaskIntersector::new([GeoMask::new("WEST", rect(-180.0, -10.0, -170.0, 10.0))]);
        let pct = masks.coverage(&footprint, "WEST").unwrap();
        assert!((pct - 50.0).abs() < 1e-6, "{}", pct);
    }

    #[test]
    fn bowtie_is_repaired() {
        let bowtie = vec![[0.0, 0.0], [2.0, 2.0], [2.0, 0.0], [0.0, 2.0]];
        let shape = normalize_footprint(&bowtie).unwrap();
        assert!((shape.unsigned_area() - 2.0).abs() < 1e-6);
    }

    #[test]
    fn collinear_ring_is_degenerate() {
        let line = vec![[0.0, 0.0], [1.0, 1.0], [2.0, 2.0]];
        assert_eq!(normalize_footprint(&line), Err(GeometryError::Degenerate));
    }

    #[test]
    fn invalid_coordinates_are_rejected() {
        assert_eq!(
            normalize_footprint(&[[0.0, 0.0], [f64::NAN, 1.0], [1.0, 1.0]]),
            Err(GeometryError::NonFinite)
        );
        assert_eq!(
            normalize_footprint(&[[0.0, 0.0], [1.0, 91.0], [1.0, 1.0]]),
            Err(GeometryError::LatitudeOutOfRange(91.0))
        );
        assert_eq!(
            normalize_footprint(&[[0.0, 0.0], [0.0, 0.0], [1.0, 1.0], [0.0, 0.0]]),
            Err(GeometryError::TooFewPoints(2))
        );
    }

    #[test]
    fn unknown_mask_is_an_error() {
        let err = intersector()
            .intersect_with_masks(&ring(0.0, 0.0, 1.0, 1.0), &["LAND"])
            .unwrap_err();
        assert_eq!(err, GeometryError::UnknownMask("LAND".into()));
    }

    #[test]
    fn mask_names_are_sorted() {
        assert_eq!(intersector().mask_names(), vec!["OCN", "SLC"]);
    }
}
