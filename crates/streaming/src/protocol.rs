//! GeoJSON wire format for feature services.
//!
//! Decoding is lenient per feature: a feature with no usable id or an
//! unsupported geometry is skipped and counted, the rest of the collection
//! still loads. Only a document that is not a FeatureCollection at all is an
//! error.
//!
//! Supported geometries map onto [`FeatureGeometry`]:
//! - `Point` / `MultiPoint` (first point)
//! - `LineString` / `MultiLineString` (first line)
//! - `Polygon` / `MultiPolygon` (first polygon)

use foundation::GeoPoint;
use scene::components::FeatureGeometry;
use serde_json::{Map, Value, json};

use crate::record::{FeatureRecord, Properties};

/// Result of decoding one FeatureCollection.
#[derive(Debug, Clone, Default)]
pub struct DecodedCollection {
    pub records: Vec<FeatureRecord>,
    /// Number of entries in the `features` array, decodable or not.
    pub raw_count: usize,
    pub skipped: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolError(pub String);

impl std::fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "invalid GeoJSON: {}", self.0)
    }
}

impl std::error::Error for ProtocolError {}

pub fn decode_collection_str(text: &str) -> Result<DecodedCollection, ProtocolError> {
    let value: Value = serde_json::from_str(text).map_err(|e| ProtocolError(e.to_string()))?;
    decode_collection(&value)
}

/// Decodes a `FeatureCollection`. A bare array of features is accepted too.
pub fn decode_collection(value: &Value) -> Result<DecodedCollection, ProtocolError> {
    let features = match value {
        Value::Array(items) => items,
        Value::Object(obj) => {
            match obj.get("type").and_then(Value::as_str) {
                Some("FeatureCollection") | None => {}
                Some(other) => {
                    return Err(ProtocolError(format!(
                        "expected FeatureCollection, got {other}"
                    )));
                }
            }
            obj.get("features")
                .and_then(Value::as_array)
                .ok_or_else(|| ProtocolError("missing features array".into()))?
        }
        _ => return Err(ProtocolError("expected an object or array".into())),
    };

    let mut out = DecodedCollection {
        raw_count: features.len(),
        ..Default::default()
    };
    for feature in features {
        match decode_feature(feature) {
            Some(record) => out.records.push(record),
            None => out.skipped += 1,
        }
    }
    if out.skipped > 0 {
        tracing::debug!(skipped = out.skipped, "skipped undecodable features");
    }
    Ok(out)
}

/// Decodes one `Feature`. The id comes from the feature's `id` member, or
/// from an `id` property when the member is absent.
pub fn decode_feature(value: &Value) -> Option<FeatureRecord> {
    let obj = value.as_object()?;
    let properties: Properties = match obj.get("properties") {
        Some(Value::Object(map)) => map.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
        _ => Properties::new(),
    };
    let id = obj
        .get("id")
        .and_then(id_string)
        .or_else(|| properties.get("id").and_then(id_string))?;
    let geometry = decode_geometry(obj.get("geometry")?)?;

    let mut record = FeatureRecord::new(id, geometry);
    record.properties = properties;
    Some(record)
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn decode_geometry(value: &Value) -> Option<FeatureGeometry> {
    let coords = value.get("coordinates")?;
    match value.get("type")?.as_str()? {
        "Point" => Some(FeatureGeometry::Point {
            position: position(coords)?,
        }),
        "MultiPoint" => Some(FeatureGeometry::Point {
            position: position(coords.as_array()?.first()?)?,
        }),
        "LineString" => line(coords).map(|vertices| FeatureGeometry::Line { vertices }),
        "MultiLineString" => {
            line(coords.as_array()?.first()?).map(|vertices| FeatureGeometry::Line { vertices })
        }
        "Polygon" => rings(coords).map(|rings| FeatureGeometry::Polygon { rings }),
        "MultiPolygon" => {
            rings(coords.as_array()?.first()?).map(|rings| FeatureGeometry::Polygon { rings })
        }
        _ => None,
    }
}

fn position(value: &Value) -> Option<GeoPoint> {
    let parts = value.as_array()?;
    let lon = parts.first()?.as_f64()?;
    let lat = parts.get(1)?.as_f64()?;
    let height = parts.get(2).and_then(Value::as_f64).unwrap_or(0.0);
    let p = GeoPoint::with_height(lon, lat, height);
    p.is_finite().then_some(p)
}

fn line(value: &Value) -> Option<Vec<GeoPoint>> {
    let vertices = value
        .as_array()?
        .iter()
        .map(position)
        .collect::<Option<Vec<_>>>()?;
    (vertices.len() >= 2).then_some(vertices)
}

fn rings(value: &Value) -> Option<Vec<Vec<GeoPoint>>> {
    let rings = value
        .as_array()?
        .iter()
        .map(|ring| {
            ring.as_array()?
                .iter()
                .map(position)
                .collect::<Option<Vec<_>>>()
        })
        .collect::<Option<Vec<_>>>()?;
    (!rings.is_empty() && rings[0].len() >= 3).then_some(rings)
}

/// Encodes records as a FeatureCollection. Transient clustering state is
/// not part of the wire format.
pub fn encode_collection(records: &[FeatureRecord]) -> Value {
    let features: Vec<Value> = records.iter().map(encode_feature).collect();
    json!({ "type": "FeatureCollection", "features": features })
}

pub fn encode_feature(record: &FeatureRecord) -> Value {
    let properties: Map<String, Value> = record
        .properties
        .iter()
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect();
    json!({
        "type": "Feature",
        "id": record.id,
        "geometry": encode_geometry(&record.geometry),
        "properties": properties,
    })
}

fn encode_geometry(geometry: &FeatureGeometry) -> Value {
    fn pos(p: &GeoPoint) -> Value {
        if p.height == 0.0 {
            json!([p.lon, p.lat])
        } else {
            json!([p.lon, p.lat, p.height])
        }
    }
    match geometry {
        FeatureGeometry::Point { position } => {
            json!({ "type": "Point", "coordinates": pos(position) })
        }
        FeatureGeometry::Line { vertices } => json!({
            "type": "LineString",
            "coordinates": vertices.iter().map(pos).collect::<Vec<_>>(),
        }),
        FeatureGeometry::Polygon { rings } => json!({
            "type": "Polygon",
            "coordinates": rings
                .iter()
                .map(|r| r.iter().map(pos).collect::<Vec<_>>())
                .collect::<Vec<_>>(),
        }),
    }
}
