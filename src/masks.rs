//! Geo mask loading and the `dtc masks` command.
//!
//! Masks are GeoJSON files (a bare geometry, a feature or a feature
//! collection) whose polygons and multipolygons are merged into one
//! multipolygon per mask name.

use anyhow::{bail, Context, Result};
use geo::{Geometry, MultiPolygon, Polygon};
use geojson::GeoJson;
use std::path::Path;

use datatake_completeness_core::geomask::{GeoMask, GeoMaskIntersector};

use crate::config::MasksConfig;

pub fn load_masks(config: &MasksConfig) -> Result<GeoMaskIntersector> {
    let mut masks = Vec::with_capacity(config.files.len());
    for (name, path) in &config.files {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read mask '{}': {}", name, path.display()))?;
        let mask = parse_mask(name, &text)
            .with_context(|| format!("Invalid mask '{}': {}", name, path.display()))?;
        tracing::debug!(mask = %name, polygons = mask.polygon_count(), "loaded geo mask");
        masks.push(mask);
    }
    Ok(GeoMaskIntersector::new(masks))
}

pub fn parse_mask(name: &str, text: &str) -> Result<GeoMask> {
    let polygons = polygons_from_geojson(text)?;
    if polygons.is_empty() {
        bail!("no polygon in GeoJSON");
    }
    Ok(GeoMask::new(name, MultiPolygon::new(polygons)))
}

fn polygons_from_geojson(text: &str) -> Result<Vec<Polygon<f64>>> {
    let geojson: GeoJson = text.parse()?;
    let geometries: Vec<geojson::Geometry> = match geojson {
        GeoJson::Geometry(g) => vec![g],
        GeoJson::Feature(f) => f.geometry.into_iter().collect(),
        GeoJson::FeatureCollection(fc) => fc
            .features
            .into_iter()
            .filter_map(|f| f.geometry)
            .collect(),
    };

    let mut polygons = Vec::new();
    for geometry in geometries {
        collect_polygons(Geometry::<f64>::try_from(geometry)?, &mut polygons)?;
    }
    Ok(polygons)
}

fn collect_polygons(geometry: Geometry<f64>, out: &mut Vec<Polygon<f64>>) -> Result<()> {
    match geometry {
        Geometry::Polygon(p) => out.push(p),
        Geometry::MultiPolygon(mp) => out.extend(mp.0),
        Geometry::GeometryCollection(gc) => {
            for g in gc.0 {
                collect_polygons(g, out)?;
            }
        }
        _ => bail!("only Polygon and MultiPolygon geometries are supported"),
    }
    Ok(())
}

/// Exterior ring of the first polygon in a GeoJSON file, as `[lon, lat]`.
pub fn read_footprint(path: &Path) -> Result<Vec<[f64; 2]>> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read footprint: {}", path.display()))?;
    let polygons = polygons_from_geojson(&text)?;
    let Some(first) = polygons.first() else {
        bail!("no polygon in footprint file: {}", path.display());
    };
    Ok(first.exterior().coords().map(|c| [c.x, c.y]).collect())
}

pub fn run_masks(config: &MasksConfig, footprint: Option<&Path>) -> Result<()> {
    let intersector = load_masks(config)?;
    let names = intersector.mask_names();

    println!("masks: {}", names.len());
    for name in &names {
        let polygons = intersector.get(name).map_or(0, GeoMask::polygon_count);
        let threshold = config.thresholds.get(*name).copied();
        match threshold {
            Some(t) => println!("  {:<8} polygons: {:<6} threshold: {}%", name, polygons, t),
            None => println!("  {:<8} polygons: {}", name, polygons),
        }
    }

    if let Some(path) = footprint {
        let ring = read_footprint(path)?;
        let coverage = intersector.intersect_with_masks(&ring, &names)?;
        println!("coverage of {}:", path.display());
        for (name, pct) in coverage {
            println!("  {:<8} {:.2}%", name, pct);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const OCEAN: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {}, "geometry": {"type": "Polygon",
             "coordinates": [[[94.47, 0.0], [120.0, 0.0], [120.0, 30.0], [94.47, 30.0], [94.47, 0.0]]]}},
            {"type": "Feature", "properties": {}, "geometry": {"type": "MultiPolygon",
             "coordinates": [[[[-40.0, -30.0], [-10.0, -30.0], [-10.0, 30.0], [-40.0, 30.0], [-40.0, -30.0]]]]}}
        ]
    }"#;

    #[test]
    fn feature_collection_merges_polygons() {
        let mask = parse_mask("OCN", OCEAN).unwrap();
        assert_eq!(mask.name(), "OCN");
        assert_eq!(mask.polygon_count(), 2);
    }

    #[test]
    fn non_polygon_geometry_is_rejected() {
        let point = r#"{"type": "Point", "coordinates": [1.0, 2.0]}"#;
        assert!(parse_mask("X", point).is_err());
    }

    #[test]
    fn loaded_mask_intersects_footprint() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ocean.geojson");
        std::fs::write(&path, OCEAN).unwrap();

        let mut config = MasksConfig::default();
        config.files.insert("OCN".to_string(), path);
        let intersector = load_masks(&config).unwrap();

        let footprint = [[93.0, 15.0], [96.0, 15.0], [96.0, 17.0], [93.0, 17.0]];
        let pct = intersector.coverage(&footprint, "OCN").unwrap();
        assert!((pct - 51.0).abs() < 0.01);
    }

    #[test]
    fn footprint_reads_first_exterior_ring() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fp.geojson");
        std::fs::write(
            &path,
            r#"{"type": "Feature", "properties": {}, "geometry": {"type": "Polygon",
                "coordinates": [[[1.0, 1.0], [2.0, 1.0], [2.0, 2.0], [1.0, 1.0]]]}}"#,
        )
        .unwrap();
        let ring = read_footprint(&path).unwrap();
        assert_eq!(ring.first(), Some(&[1.0, 1.0]));
        assert_eq!(ring.len(), 4);
    }
}
