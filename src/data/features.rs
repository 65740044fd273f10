use geojson::{GeoJson, Geometry, JsonObject, Value};

/// A closed ring of (lon, lat) positions
pub type Ring = Vec<(f64, f64)>;

/// A country boundary keyed by its `name` property
#[derive(Debug, Clone)]
pub struct GeoFeature {
    pub name: String,
    pub geometry: Option<Geometry>,
    pub properties: JsonObject,
}

impl GeoFeature {
    pub fn new(name: &str, geometry: Option<Geometry>) -> Self {
        let mut properties = JsonObject::new();
        properties.insert("name".to_string(), name.into());
        Self {
            name: name.to_string(),
            geometry,
            properties,
        }
    }

    fn from_feature(feature: geojson::Feature) -> Self {
        let properties = feature.properties.unwrap_or_default();
        let name = properties
            .get("name")
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string();
        Self {
            name,
            geometry: feature.geometry,
            properties,
        }
    }

    /// Every ring of every polygon, holes included
    pub fn rings(&self) -> Vec<Ring> {
        let mut rings = Vec::new();
        if let Some(ref geometry) = self.geometry {
            collect_rings(geometry, &mut rings);
        }
        rings
    }

    /// (min_lon, min_lat, max_lon, max_lat), `None` without coordinates
    pub fn bbox(&self) -> Option<(f64, f64, f64, f64)> {
        bbox_of(self.rings().iter().flatten().copied())
    }

    /// Even-odd point-in-polygon test over all rings
    pub fn contains(&self, lon: f64, lat: f64) -> bool {
        let mut inside = false;
        for ring in self.rings() {
            if ring_contains(&ring, lon, lat) {
                inside = !inside;
            }
        }
        inside
    }
}

/// Parse a feature collection. A bare feature or geometry becomes a single
/// unnamed feature.
pub fn parse_features(bytes: &mut [u8]) -> Result<Vec<GeoFeature>, simd_json::Error> {
    let geojson: GeoJson = simd_json::serde::from_slice(bytes)?;
    Ok(match geojson {
        GeoJson::FeatureCollection(fc) => fc.features.into_iter().map(GeoFeature::from_feature).collect(),
        GeoJson::Feature(f) => vec![GeoFeature::from_feature(f)],
        GeoJson::Geometry(g) => vec![GeoFeature::new("", Some(g))],
    })
}

/// Collect polygon rings from a geometry tree
pub fn collect_rings(geometry: &Geometry, rings: &mut Vec<Ring>) {
    match &geometry.value {
        Value::Polygon(polygon) => {
            for coords in polygon {
                rings.push(coords.iter().map(|c| (c[0], c[1])).collect());
            }
        }
        Value::MultiPolygon(polygons) => {
            for polygon in polygons {
                for coords in polygon {
                    rings.push(coords.iter().map(|c| (c[0], c[1])).collect());
                }
            }
        }
        Value::GeometryCollection(geometries) => {
            for g in geometries {
                collect_rings(g, rings);
            }
        }
        _ => {}
    }
}

pub fn bbox_of(points: impl Iterator<Item = (f64, f64)>) -> Option<(f64, f64, f64, f64)> {
    points.fold(None, |acc, (x, y)| match acc {
        None => Some((x, y, x, y)),
        Some((x0, y0, x1, y1)) => Some((x0.min(x), y0.min(y), x1.max(x), y1.max(y))),
    })
}

fn ring_contains(ring: &[(f64, f64)], x: f64, y: f64) -> bool {
    let mut inside = false;
    let n = ring.len();
    if n < 3 {
        return false;
    }
    let mut j = n - 1;
    for i in 0..n {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "properties": {"name": "Squareland", "iso": "SQL"},
             "geometry": {"type": "Polygon", "coordinates": [[[0,0],[10,0],[10,10],[0,10],[0,0]],
                                                             [[4,4],[6,4],[6,6],[4,6],[4,4]]]}},
            {"type": "Feature", "properties": {"name": "Islands"},
             "geometry": {"type": "MultiPolygon", "coordinates": [[[[20,0],[22,0],[22,2],[20,0]]],
                                                                 [[[30,0],[32,0],[32,2],[30,0]]]]}}
        ]
    }"#;

    #[test]
    fn test_parse_collection() {
        let mut bytes = COLLECTION.as_bytes().to_vec();
        let features = parse_features(&mut bytes).unwrap();
        assert_eq!(features.len(), 2);
        assert_eq!(features[0].name, "Squareland");
        assert_eq!(features[0].properties.get("iso").and_then(|v| v.as_str()), Some("SQL"));
        assert_eq!(features[1].rings().len(), 2);
        assert_eq!(features[1].bbox(), Some((20.0, 0.0, 32.0, 2.0)));
    }

    #[test]
    fn test_contains_respects_holes() {
        let mut bytes = COLLECTION.as_bytes().to_vec();
        let features = parse_features(&mut bytes).unwrap();
        assert!(features[0].contains(2.0, 2.0));
        assert!(!features[0].contains(5.0, 5.0));
        assert!(!features[0].contains(15.0, 5.0));
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let mut bytes = b"{not json".to_vec();
        assert!(parse_features(&mut bytes).is_err());
    }
}
