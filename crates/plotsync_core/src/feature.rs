//! Plot features as a tagged variant keyed by `dataType`.

use crate::geometry::{Geometry, PointGeometry, TrackGeometry};
use crate::types::{FeatureId, Timestamp};
use crate::validate;
use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{Map, Value};
use std::fmt;

/// Discriminant of a [`Feature`], carried on the wire as `properties.dataType`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    /// Vessel track.
    Track,
    /// Reference point.
    Point,
    /// Free-form annotation.
    Annotation,
}

impl DataType {
    /// Wire tag for a track.
    pub const TRACK_TAG: &'static str = "track";
    /// Wire tag for a reference point.
    pub const POINT_TAG: &'static str = "reference-point";
    /// Wire tag for an annotation.
    pub const ANNOTATION_TAG: &'static str = "annotation";

    /// Returns the wire tag.
    pub fn tag(self) -> &'static str {
        match self {
            DataType::Track => Self::TRACK_TAG,
            DataType::Point => Self::POINT_TAG,
            DataType::Annotation => Self::ANNOTATION_TAG,
        }
    }

    /// Looks up a data type by wire tag.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            Self::TRACK_TAG => Some(DataType::Track),
            Self::POINT_TAG => Some(DataType::Point),
            Self::ANNOTATION_TAG => Some(DataType::Annotation),
            _ => None,
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// Properties of a track.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackProperties {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// One timestamp per coordinate, when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamps: Option<Vec<Timestamp>>,
    /// Properties this model does not interpret, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Properties of a reference point.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PointProperties {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Single instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<Timestamp>,
    /// Start of a validity period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_start: Option<Timestamp>,
    /// End of a validity period.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_end: Option<Timestamp>,
    /// Properties this model does not interpret, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Kinds of annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationType {
    /// Text label; requires non-empty `text`.
    Label,
    /// Shaded area.
    Area,
    /// Line or bearing.
    Line,
    /// Range ring.
    Circle,
    /// Box.
    Rectangle,
    /// Free note.
    Note,
}

/// Properties of an annotation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnnotationProperties {
    /// Display name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Kind of annotation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotation_type: Option<AnnotationType>,
    /// Label or note text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `#rrggbb` colour.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    /// Properties this model does not interpret, kept for round trips.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A vessel track.
#[derive(Debug, Clone, PartialEq)]
pub struct TrackFeature {
    /// Feature ID.
    pub id: Option<FeatureId>,
    /// Line geometry.
    pub geometry: TrackGeometry,
    /// Track properties.
    pub properties: TrackProperties,
}

/// A reference point.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFeature {
    /// Feature ID.
    pub id: Option<FeatureId>,
    /// Point geometry.
    pub geometry: PointGeometry,
    /// Point properties.
    pub properties: PointProperties,
}

/// An annotation.
#[derive(Debug, Clone, PartialEq)]
pub struct AnnotationFeature {
    /// Feature ID.
    pub id: Option<FeatureId>,
    /// Any geometry.
    pub geometry: Geometry,
    /// Annotation properties.
    pub properties: AnnotationProperties,
}

/// A plot feature.
///
/// Serializes as a GeoJSON `Feature` whose `properties.dataType` carries
/// the variant tag. Deserialization goes through
/// [`validate::parse_feature`], so every decoded feature already satisfies
/// its cross-field rules.
#[derive(Debug, Clone, PartialEq)]
pub enum Feature {
    /// Vessel track.
    Track(TrackFeature),
    /// Reference point.
    Point(PointFeature),
    /// Annotation.
    Annotation(AnnotationFeature),
}

impl Feature {
    /// Returns the feature ID, if any.
    pub fn id(&self) -> Option<&FeatureId> {
        match self {
            Feature::Track(f) => f.id.as_ref(),
            Feature::Point(f) => f.id.as_ref(),
            Feature::Annotation(f) => f.id.as_ref(),
        }
    }

    /// Returns the discriminant.
    pub fn data_type(&self) -> DataType {
        match self {
            Feature::Track(_) => DataType::Track,
            Feature::Point(_) => DataType::Point,
            Feature::Annotation(_) => DataType::Annotation,
        }
    }

    /// Returns the display name, if any.
    pub fn name(&self) -> Option<&str> {
        match self {
            Feature::Track(f) => f.properties.name.as_deref(),
            Feature::Point(f) => f.properties.name.as_deref(),
            Feature::Annotation(f) => f.properties.name.as_deref(),
        }
    }

    /// Returns true if the feature carries the given ID.
    pub fn has_id(&self, id: &FeatureId) -> bool {
        self.id() == Some(id)
    }
}

#[derive(Serialize)]
struct FeatureOut<'a, G: Serialize, P: Serialize> {
    #[serde(rename = "type")]
    kind: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a FeatureId>,
    geometry: &'a G,
    properties: TaggedProperties<'a, P>,
}

#[derive(Serialize)]
struct TaggedProperties<'a, P: Serialize> {
    #[serde(rename = "dataType")]
    data_type: &'static str,
    #[serde(flatten)]
    inner: &'a P,
}

fn feature_out<'a, G: Serialize, P: Serialize>(
    id: Option<&'a FeatureId>,
    data_type: DataType,
    geometry: &'a G,
    properties: &'a P,
) -> FeatureOut<'a, G, P> {
    FeatureOut {
        kind: "Feature",
        id,
        geometry,
        properties: TaggedProperties {
            data_type: data_type.tag(),
            inner: properties,
        },
    }
}

impl Serialize for Feature {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let data_type = self.data_type();
        match self {
            Feature::Track(f) => {
                feature_out(f.id.as_ref(), data_type, &f.geometry, &f.properties)
                    .serialize(serializer)
            }
            Feature::Point(f) => {
                feature_out(f.id.as_ref(), data_type, &f.geometry, &f.properties)
                    .serialize(serializer)
            }
            Feature::Annotation(f) => {
                feature_out(f.id.as_ref(), data_type, &f.geometry, &f.properties)
                    .serialize(serializer)
            }
        }
    }
}

impl<'de> Deserialize<'de> for Feature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        validate::parse_feature(&value).map_err(D::Error::custom)
    }
}

/// An ordered collection of features.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(tag = "type", rename = "FeatureCollection")]
pub struct FeatureCollection {
    /// Features in display order.
    pub features: Vec<Feature>,
}

impl FeatureCollection {
    /// Creates a collection.
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Parses a collection from JSON text.
    pub fn from_json_str(text: &str) -> crate::CoreResult<Self> {
        let value: Value = serde_json::from_str(text)?;
        Ok(validate::parse_feature_collection(&value)?)
    }

    /// Number of features.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    /// Returns true if there are no features.
    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }

    /// Iterates features in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Feature> {
        self.features.iter()
    }

    /// Finds the first feature with the given ID.
    pub fn get(&self, id: &FeatureId) -> Option<&Feature> {
        self.features.iter().find(|f| f.has_id(id))
    }

    /// Appends features at the end.
    pub fn append(&mut self, features: impl IntoIterator<Item = Feature>) {
        self.features.extend(features);
    }

    /// Replaces every feature whose ID matches one of `updates`.
    ///
    /// Updates without an ID, or with an ID not present, are ignored.
    /// Returns the number of features replaced.
    pub fn replace_matching(&mut self, updates: &[Feature]) -> usize {
        let mut replaced = 0;
        for update in updates {
            let Some(id) = update.id() else { continue };
            for existing in self.features.iter_mut().filter(|f| f.has_id(id)) {
                *existing = update.clone();
                replaced += 1;
            }
        }
        replaced
    }

    /// Removes every feature whose ID is in `ids`. Returns the number removed.
    pub fn remove_ids(&mut self, ids: &[FeatureId]) -> usize {
        let before = self.features.len();
        self.features
            .retain(|f| f.id().map_or(true, |id| !ids.contains(id)));
        before - self.features.len()
    }
}

impl<'de> Deserialize<'de> for FeatureCollection {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        validate::parse_feature_collection(&value).map_err(D::Error::custom)
    }
}

impl<'a> IntoIterator for &'a FeatureCollection {
    type Item = &'a Feature;
    type IntoIter = std::slice::Iter<'a, Feature>;

    fn into_iter(self) -> Self::IntoIter {
        self.features.iter()
    }
}
