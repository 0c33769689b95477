//! Benchmark fixtures.

use serde_json::{json, Value};

/// A track feature with `points` positions and matching timestamps.
pub fn track_json(id: usize, points: usize) -> Value {
    let coordinates: Vec<Value> = (0..points)
        .map(|i| json!([-5.0 + i as f64 * 0.01, 50.0 + i as f64 * 0.005]))
        .collect();
    let timestamps: Vec<Value> = (0..points)
        .map(|i| json!(format!("2024-06-01T{:02}:{:02}:00Z", (i / 60) % 24, i % 60)))
        .collect();
    json!({
        "type": "Feature",
        "id": format!("track-{id}"),
        "geometry": {"type": "LineString", "coordinates": coordinates},
        "properties": {"dataType": "track", "name": format!("Track {id}"), "timestamps": timestamps}
    })
}

/// A reference point feature.
pub fn point_json(id: usize) -> Value {
    json!({
        "type": "Feature",
        "id": format!("point-{id}"),
        "geometry": {"type": "Point", "coordinates": [-4.0 + id as f64 * 0.001, 51.0]},
        "properties": {"dataType": "reference-point", "name": format!("Point {id}")}
    })
}

/// A collection with `tracks` tracks of `points` positions and as many points.
pub fn collection_json(tracks: usize, points: usize) -> Value {
    let mut features: Vec<Value> = (0..tracks).map(|i| track_json(i, points)).collect();
    features.extend((0..tracks).map(point_json));
    json!({"type": "FeatureCollection", "features": features})
}
