//! # plotsync Core
//!
//! Editor state model and validators for plotsync.
//!
//! This crate provides:
//! - `EditorState` and its four slices (features, time, viewport, selection)
//! - `Feature` as a tagged variant keyed by the `dataType` property
//! - Two-tier validators: cheap narrowing predicates and comprehensive
//!   validators that enumerate every violation
//!
//! ## Parse, don't validate
//!
//! Untrusted JSON enters through the `parse_*` functions, which either
//! return a strongly-typed value or a [`ValidationReport`] listing every
//! rule the input broke. Typed values re-check their cross-field rules via
//! [`Validate`] so values built in-process get the same guarantees.
//!
//! This is a pure data crate with no I/O operations.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod feature;
mod geometry;
mod state;
mod types;
pub mod validate;

pub use error::{CoreError, CoreResult};
pub use feature::{
    AnnotationFeature, AnnotationProperties, AnnotationType, DataType, Feature, FeatureCollection,
    PointFeature, PointProperties, TrackFeature, TrackProperties,
};
pub use geometry::{Geometry, PointGeometry, Position, TrackGeometry};
pub use state::{EditorState, SelectionState, SliceKind, StateSlice, TimeState, ViewportState};
pub use types::{parse_timestamp, DocumentId, FeatureId, Timestamp};
pub use validate::{Rules, TimePolicy, Validate, ValidationReport};
