//! Optional boundary outlines drawn beneath the crime markers.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use geojson::{GeoJson, Geometry, Value};

use crate::map::{LineString, MapRenderer};

/// Load neighborhood or city boundaries from a GeoJSON file into the
/// renderer. Returns the number of outlines added.
pub fn load_basemap(renderer: &mut MapRenderer, path: &Path) -> Result<usize> {
    let content =
        fs::read_to_string(path).with_context(|| format!("reading basemap {}", path.display()))?;
    let geojson: GeoJson = content
        .parse()
        .with_context(|| format!("parsing GeoJSON in {}", path.display()))?;

    let before = renderer.outlines.len();
    process_geojson_lines(&geojson, |line| renderer.add_outline(line));
    let added = renderer.outlines.len() - before;
    log::info!("Loaded {added} outlines from {}", path.display());
    Ok(added)
}

/// Like [`load_basemap`], but a failure only logs a warning: the
/// dashboard works without boundaries.
pub fn load_basemap_or_warn(renderer: &mut MapRenderer, path: &Path) {
    if let Err(e) = load_basemap(renderer, path) {
        log::warn!("Basemap unavailable: {e:#}");
    }
}

fn process_geojson_lines<F>(geojson: &GeoJson, mut add_line: F)
where
    F: FnMut(LineString),
{
    match geojson {
        GeoJson::FeatureCollection(fc) => {
            for feature in &fc.features {
                if let Some(ref geometry) = feature.geometry {
                    process_geometry_lines(geometry, &mut add_line);
                }
            }
        }
        GeoJson::Feature(f) => {
            if let Some(ref geometry) = f.geometry {
                process_geometry_lines(geometry, &mut add_line);
            }
        }
        GeoJson::Geometry(geometry) => {
            process_geometry_lines(geometry, &mut add_line);
        }
    }
}

fn to_line(coords: &[Vec<f64>]) -> LineString {
    coords
        .iter()
        .filter(|c| c.len() >= 2)
        .map(|c| (c[0], c[1]))
        .collect()
}

fn process_geometry_lines<F>(geometry: &Geometry, add_line: &mut F)
where
    F: FnMut(LineString),
{
    match &geometry.value {
        Value::LineString(coords) => add_line(to_line(coords)),
        Value::MultiLineString(lines) => {
            for coords in lines {
                add_line(to_line(coords));
            }
        }
        // Exterior rings only; holes add clutter at city scale
        Value::Polygon(rings) => {
            if let Some(exterior) = rings.first() {
                add_line(to_line(exterior));
            }
        }
        Value::MultiPolygon(polygons) => {
            for rings in polygons {
                if let Some(exterior) = rings.first() {
                    add_line(to_line(exterior));
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                process_geometry_lines(g, add_line);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BAIRROS: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "properties": {"name": "Boa Viagem"},
                "geometry": {
                    "type": "Polygon",
                    "coordinates": [
                        [[-34.92, -8.10], [-34.89, -8.10], [-34.89, -8.13], [-34.92, -8.10]],
                        [[-34.91, -8.11], [-34.90, -8.11], [-34.90, -8.12], [-34.91, -8.11]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {"name": "Capibaribe"},
                "geometry": {
                    "type": "MultiLineString",
                    "coordinates": [
                        [[-34.95, -8.05], [-34.90, -8.06]],
                        [[-34.90, -8.06], [-34.88, -8.06]]
                    ]
                }
            },
            {
                "type": "Feature",
                "properties": {},
                "geometry": {"type": "Point", "coordinates": [-34.88, -8.05]}
            }
        ]
    }"#;

    fn temp_file(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("{}-{name}", std::process::id()));
        fs::write(&path, contents).unwrap();
        path
    }

    #[test]
    fn test_load_outlines_from_features() {
        let path = temp_file("bairros.geojson", BAIRROS);
        let mut renderer = MapRenderer::new();
        let added = load_basemap(&mut renderer, &path).unwrap();
        fs::remove_file(&path).ok();

        assert_eq!(added, 3);
        assert_eq!(renderer.outlines[0].len(), 4);
        assert_eq!(renderer.outlines[1][0], (-34.95, -8.05));
    }

    #[test]
    fn test_invalid_geojson_is_error() {
        let path = temp_file("broken.geojson", "{\"type\": ");
        let mut renderer = MapRenderer::new();
        assert!(load_basemap(&mut renderer, &path).is_err());
        fs::remove_file(&path).ok();
        assert!(!renderer.has_basemap());
    }

    #[test]
    fn test_missing_file_only_warns() {
        let mut renderer = MapRenderer::new();
        load_basemap_or_warn(&mut renderer, Path::new("/nonexistent/bairros.geojson"));
        assert!(!renderer.has_basemap());
    }
}
