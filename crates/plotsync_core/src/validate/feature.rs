//! Validators for features and feature collections.

use super::{field, index, Rules, Validate, ValidationReport};
use crate::feature::{
    AnnotationFeature, AnnotationProperties, AnnotationType, DataType, Feature,
    FeatureCollection, PointFeature, PointProperties, TrackFeature, TrackProperties,
};
use crate::geometry::{Geometry, PointGeometry, Position, TrackGeometry};
use crate::types::{parse_timestamp, FeatureId, Timestamp};
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

fn data_type_tag(value: &Value) -> Option<&str> {
    value
        .get("properties")
        .and_then(|p| p.get("dataType"))
        .and_then(Value::as_str)
}

fn geometry_type(value: &Value) -> Option<&str> {
    value
        .get("geometry")
        .and_then(|g| g.get("type"))
        .and_then(Value::as_str)
}

/// Returns true if `value` looks like a GeoJSON feature with a known `dataType`.
pub fn is_feature(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("Feature")
        && data_type_tag(value).and_then(DataType::from_tag).is_some()
}

/// Returns true if `value` looks like a track.
pub fn is_track(value: &Value) -> bool {
    is_feature(value)
        && data_type_tag(value) == Some(DataType::TRACK_TAG)
        && matches!(geometry_type(value), Some("LineString" | "MultiLineString"))
}

/// Returns true if `value` looks like a reference point.
pub fn is_point(value: &Value) -> bool {
    is_feature(value)
        && data_type_tag(value) == Some(DataType::POINT_TAG)
        && geometry_type(value) == Some("Point")
}

/// Returns true if `value` looks like an annotation.
pub fn is_annotation(value: &Value) -> bool {
    is_feature(value) && data_type_tag(value) == Some(DataType::ANNOTATION_TAG)
}

/// Returns true if `value` looks like a feature collection.
pub fn is_feature_collection(value: &Value) -> bool {
    value.get("type").and_then(Value::as_str) == Some("FeatureCollection")
        && value.get("features").is_some_and(Value::is_array)
}

/// Decodes a feature, enumerating every violation.
pub fn parse_feature(value: &Value) -> Result<Feature, ValidationReport> {
    let mut report = ValidationReport::new();
    let feature = read_feature(value, "", &mut report);
    match feature {
        Some(feature) => report.into_result(feature),
        None => Err(report),
    }
}

/// Comprehensive feature validator.
pub fn validate_feature(value: &Value) -> ValidationReport {
    parse_feature(value).err().unwrap_or_default()
}

/// Decodes a feature collection, enumerating every violation in every feature.
pub fn parse_feature_collection(value: &Value) -> Result<FeatureCollection, ValidationReport> {
    let mut report = ValidationReport::new();
    let Some(map) = value.as_object() else {
        report.push("expected a FeatureCollection object");
        return Err(report);
    };
    if map.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        report.at("type", "expected \"FeatureCollection\"");
    }
    let Some(items) = map.get("features").and_then(Value::as_array) else {
        report.at("features", "expected an array");
        return Err(report);
    };

    let mut features = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        if let Some(feature) = read_feature(item, &index("features", i), &mut report) {
            features.push(feature);
        }
    }
    report.into_result(FeatureCollection::new(features))
}

/// Comprehensive feature collection validator.
pub fn validate_feature_collection(value: &Value) -> ValidationReport {
    parse_feature_collection(value).err().unwrap_or_default()
}

/// Decodes one feature, recording structural errors under `path`.
///
/// Returns `None` when the structure is too broken to build a typed value.
/// A returned feature has also been run through its cross-field checks;
/// fields that failed to decode are absent, so only the rules that need
/// them are skipped.
fn read_feature(value: &Value, path: &str, report: &mut ValidationReport) -> Option<Feature> {
    let Some(map) = value.as_object() else {
        report.at(path, "expected a feature object");
        return None;
    };
    if map.get("type").and_then(Value::as_str) != Some("Feature") {
        report.at(&field(path, "type"), "expected \"Feature\"");
    }

    let id = match map.get("id") {
        None | Some(Value::Null) => None,
        Some(raw) => {
            let id = FeatureId::from_json(raw);
            if id.is_none() {
                report.at(&field(path, "id"), "expected a string or integer id");
            }
            id
        }
    };

    let props_path = field(path, "properties");
    let Some(properties) = map.get("properties").and_then(Value::as_object) else {
        report.at(&props_path, "expected an object");
        return None;
    };
    let mut properties = properties.clone();
    let data_type = match properties.remove("dataType") {
        Some(Value::String(tag)) => match DataType::from_tag(&tag) {
            Some(data_type) => data_type,
            None => {
                report.at(
                    &field(&props_path, "dataType"),
                    format!("unrecognized data type '{tag}'"),
                );
                return None;
            }
        },
        Some(_) => {
            report.at(&field(&props_path, "dataType"), "expected a string");
            return None;
        }
        None => {
            report.at(&field(&props_path, "dataType"), "required");
            return None;
        }
    };

    let geometry_path = field(path, "geometry");
    let geometry = map.get("geometry").unwrap_or(&Value::Null);
    let mut props = PropertyReader::new(properties, &props_path, report);

    let feature = match data_type {
        DataType::Track => {
            let name = props.take("name");
            let timestamps = props.take_timestamps("timestamps");
            let extra = props.finish();
            let geometry = read_geometry::<TrackGeometry>(
                geometry,
                &["LineString", "MultiLineString"],
                &geometry_path,
                report,
            );
            geometry.map(|geometry| {
                Feature::Track(TrackFeature {
                    id,
                    geometry,
                    properties: TrackProperties {
                        name,
                        timestamps,
                        extra,
                    },
                })
            })
        }
        DataType::Point => {
            let name = props.take("name");
            let time = props.take_timestamp("time");
            let time_start = props.take_timestamp("timeStart");
            let time_end = props.take_timestamp("timeEnd");
            let extra = props.finish();
            let geometry =
                read_geometry::<PointGeometry>(geometry, &["Point"], &geometry_path, report);
            geometry.map(|geometry| {
                Feature::Point(PointFeature {
                    id,
                    geometry,
                    properties: PointProperties {
                        name,
                        time,
                        time_start,
                        time_end,
                        extra,
                    },
                })
            })
        }
        DataType::Annotation => {
            let name = props.take("name");
            let annotation_type = props.take::<AnnotationType>("annotationType");
            let text = props.take("text");
            let color = props.take("color");
            let extra = props.finish();
            let geometry = read_geometry::<Geometry>(
                geometry,
                &[
                    "Point",
                    "MultiPoint",
                    "LineString",
                    "MultiLineString",
                    "Polygon",
                    "MultiPolygon",
                ],
                &geometry_path,
                report,
            );
            geometry.map(|geometry| {
                Feature::Annotation(AnnotationFeature {
                    id,
                    geometry,
                    properties: AnnotationProperties {
                        name,
                        annotation_type,
                        text,
                        color,
                        extra,
                    },
                })
            })
        }
    }?;

    feature.check(&Rules::default(), path, report);
    Some(feature)
}

fn read_geometry<T: DeserializeOwned>(
    value: &Value,
    allowed: &[&str],
    path: &str,
    report: &mut ValidationReport,
) -> Option<T> {
    let Some(kind) = value.get("type").and_then(Value::as_str) else {
        report.at(path, "expected a geometry object with a type");
        return None;
    };
    if !allowed.contains(&kind) {
        report.at(
            path,
            format!("{kind} not allowed here (expected {})", allowed.join(" or ")),
        );
        return None;
    }
    match serde_json::from_value(value.clone()) {
        Ok(geometry) => Some(geometry),
        Err(e) => {
            report.at(path, e);
            None
        }
    }
}

/// Pulls known keys out of a properties map, leaving the rest as extras.
struct PropertyReader<'a> {
    properties: Map<String, Value>,
    path: &'a str,
    report: &'a mut ValidationReport,
}

impl<'a> PropertyReader<'a> {
    fn new(
        properties: Map<String, Value>,
        path: &'a str,
        report: &'a mut ValidationReport,
    ) -> Self {
        Self {
            properties,
            path,
            report,
        }
    }

    fn take<T: DeserializeOwned>(&mut self, key: &str) -> Option<T> {
        let value = self.properties.remove(key)?;
        if value.is_null() {
            return None;
        }
        match serde_json::from_value(value) {
            Ok(v) => Some(v),
            Err(e) => {
                self.report.at(&field(self.path, key), e);
                None
            }
        }
    }

    fn take_timestamp(&mut self, key: &str) -> Option<Timestamp> {
        let text: String = self.take(key)?;
        match parse_timestamp(&text) {
            Ok(ts) => Some(ts),
            Err(e) => {
                self.report.at(&field(self.path, key), e);
                None
            }
        }
    }

    fn take_timestamps(&mut self, key: &str) -> Option<Vec<Timestamp>> {
        let texts: Vec<String> = self.take(key)?;
        let path = field(self.path, key);
        let mut out = Vec::with_capacity(texts.len());
        for (i, text) in texts.iter().enumerate() {
            match parse_timestamp(text) {
                Ok(ts) => out.push(ts),
                Err(e) => self.report.at(&index(&path, i), e),
            }
        }
        (out.len() == texts.len()).then_some(out)
    }

    fn finish(self) -> Map<String, Value> {
        self.properties
    }
}

fn check_position(position: &Position, path: &str, report: &mut ValidationReport) {
    if !(2..=3).contains(&position.len()) {
        report.at(
            path,
            format!("position needs 2 or 3 numbers, got {}", position.len()),
        );
        return;
    }
    if position.iter().any(|n| !n.is_finite()) {
        report.at(path, "position contains a non-finite number");
    }
}

fn check_positions<'p>(
    positions: impl IntoIterator<Item = &'p Position>,
    path: &str,
    report: &mut ValidationReport,
) {
    for (i, position) in positions.into_iter().enumerate() {
        check_position(position, &format!("{path}.coordinates#{i}"), report);
    }
}

fn is_hex_color(color: &str) -> bool {
    color.len() == 7
        && color.starts_with('#')
        && color[1..].chars().all(|c| c.is_ascii_hexdigit())
}

impl Validate for TrackFeature {
    fn check(&self, _rules: &Rules, path: &str, report: &mut ValidationReport) {
        check_positions(self.geometry.positions(), &field(path, "geometry"), report);
        if let Some(timestamps) = &self.properties.timestamps {
            let expected = self.geometry.coordinate_count();
            if timestamps.len() != expected {
                report.at(
                    &field(&field(path, "properties"), "timestamps"),
                    format!(
                        "expected {expected} timestamps (one per coordinate), got {}",
                        timestamps.len()
                    ),
                );
            }
        }
    }
}

impl Validate for PointFeature {
    fn check(&self, _rules: &Rules, path: &str, report: &mut ValidationReport) {
        let geometry_path = field(path, "geometry");
        let position = &self.geometry.coordinates;
        check_position(position, &geometry_path, report);
        if let [lon, lat, ..] = position.as_slice() {
            if lon.abs() > 180.0 {
                report.at(&geometry_path, format!("longitude {lon} outside [-180, 180]"));
            }
            if lat.abs() > 90.0 {
                report.at(&geometry_path, format!("latitude {lat} outside [-90, 90]"));
            }
        }

        let props_path = field(path, "properties");
        let p = &self.properties;
        match (p.time, p.time_start, p.time_end) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                report.at(&props_path, "time cannot be combined with timeStart/timeEnd");
            }
            (None, Some(_), None) | (None, None, Some(_)) => {
                report.at(&props_path, "timeStart and timeEnd must be given together");
            }
            (None, Some(start), Some(end)) if start >= end => {
                report.at(&field(&props_path, "timeStart"), "must be before timeEnd");
            }
            _ => {}
        }
    }
}

impl Validate for AnnotationFeature {
    fn check(&self, _rules: &Rules, path: &str, report: &mut ValidationReport) {
        check_positions(self.geometry.positions(), &field(path, "geometry"), report);

        let props_path = field(path, "properties");
        let p = &self.properties;
        if let Some(color) = &p.color {
            if !is_hex_color(color) {
                report.at(
                    &field(&props_path, "color"),
                    format!("'{color}' is not a #rrggbb colour"),
                );
            }
        }
        if p.annotation_type == Some(AnnotationType::Label)
            && p.text.as_deref().map_or(true, |t| t.trim().is_empty())
        {
            report.at(&field(&props_path, "text"), "label annotations need text");
        }
    }
}

impl Validate for Feature {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        match self {
            Feature::Track(f) => f.check(rules, path, report),
            Feature::Point(f) => f.check(rules, path, report),
            Feature::Annotation(f) => f.check(rules, path, report),
        }
    }
}

impl Validate for FeatureCollection {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        let features = field(path, "features");
        for (i, feature) in self.features.iter().enumerate() {
            feature.check(rules, &index(&features, i), report);
        }
    }
}
