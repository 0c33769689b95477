//! The command taxonomy.

use plotsync_core::validate::{field, index};
use plotsync_core::{
    Feature, FeatureCollection, FeatureId, Rules, SelectionState, TimeState, Timestamp, Validate,
    ValidationReport, ViewportState,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Names the kind of a [`Command`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    /// Append features.
    AddFeatures,
    /// Replace features by ID.
    UpdateFeatures,
    /// Remove features by ID.
    DeleteFeatures,
    /// Replace the whole collection.
    SetFeatureCollection,
    /// Replace the viewport.
    SetViewport,
    /// Replace the selection.
    SetSelection,
    /// Replace the time state.
    SetTime,
    /// Show text to the user.
    ShowText,
    /// Show structured data to the user.
    ShowData,
    /// Show an image to the user.
    ShowImage,
    /// Forward a log line.
    LogMessage,
    /// Several commands applied as one.
    Composite,
}

impl CommandKind {
    /// Every kind.
    pub const ALL: [CommandKind; 12] = [
        CommandKind::AddFeatures,
        CommandKind::UpdateFeatures,
        CommandKind::DeleteFeatures,
        CommandKind::SetFeatureCollection,
        CommandKind::SetViewport,
        CommandKind::SetSelection,
        CommandKind::SetTime,
        CommandKind::ShowText,
        CommandKind::ShowData,
        CommandKind::ShowImage,
        CommandKind::LogMessage,
        CommandKind::Composite,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            CommandKind::AddFeatures => "addFeatures",
            CommandKind::UpdateFeatures => "updateFeatures",
            CommandKind::DeleteFeatures => "deleteFeatures",
            CommandKind::SetFeatureCollection => "setFeatureCollection",
            CommandKind::SetViewport => "setViewport",
            CommandKind::SetSelection => "setSelection",
            CommandKind::SetTime => "setTime",
            CommandKind::ShowText => "showText",
            CommandKind::ShowData => "showData",
            CommandKind::ShowImage => "showImage",
            CommandKind::LogMessage => "logMessage",
            CommandKind::Composite => "composite",
        }
    }

    /// Looks up a kind by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Returns true for kinds that never touch editor state.
    pub fn is_display_only(self) -> bool {
        matches!(
            self,
            CommandKind::ShowText
                | CommandKind::ShowData
                | CommandKind::ShowImage
                | CommandKind::LogMessage
        )
    }
}

impl fmt::Display for CommandKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Structured data shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataPayload {
    /// Optional heading.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Arbitrary JSON.
    pub data: Value,
}

/// An image shown to the user.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImagePayload {
    /// MIME type, `image/*`.
    pub media_type: String,
    /// Base64-encoded image bytes.
    pub data: String,
    /// Optional caption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Severity of a forwarded log line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Debug.
    Debug,
    /// Info.
    #[default]
    Info,
    /// Warning.
    Warning,
    /// Error.
    Error,
}

/// A log line from an external client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogMessage {
    /// Message text.
    pub message: String,
    /// Severity.
    #[serde(default)]
    pub level: LogLevel,
    /// When the client produced the message.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<Timestamp>,
}

/// An immutable request to mutate or display something.
///
/// Consumed exactly once by the state store; never persisted.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Append to the feature collection.
    AddFeatures(Vec<Feature>),
    /// Replace features matching by ID; unknown IDs are no-ops.
    UpdateFeatures(Vec<Feature>),
    /// Remove features by ID; unknown IDs are no-ops.
    DeleteFeatures(Vec<FeatureId>),
    /// Replace the feature collection.
    SetFeatureCollection(FeatureCollection),
    /// Replace the viewport slice.
    SetViewport(ViewportState),
    /// Replace the selection slice (never recorded in history).
    SetSelection(SelectionState),
    /// Replace the time slice.
    SetTime(TimeState),
    /// Forward text to display subscribers.
    ShowText(String),
    /// Forward data to display subscribers.
    ShowData(DataPayload),
    /// Forward an image to display subscribers.
    ShowImage(ImagePayload),
    /// Forward a log line to log subscribers.
    LogMessage(LogMessage),
    /// Apply in order, atomically, as one history entry.
    Composite(Vec<Command>),
}

impl Command {
    /// The command's kind.
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::AddFeatures(_) => CommandKind::AddFeatures,
            Command::UpdateFeatures(_) => CommandKind::UpdateFeatures,
            Command::DeleteFeatures(_) => CommandKind::DeleteFeatures,
            Command::SetFeatureCollection(_) => CommandKind::SetFeatureCollection,
            Command::SetViewport(_) => CommandKind::SetViewport,
            Command::SetSelection(_) => CommandKind::SetSelection,
            Command::SetTime(_) => CommandKind::SetTime,
            Command::ShowText(_) => CommandKind::ShowText,
            Command::ShowData(_) => CommandKind::ShowData,
            Command::ShowImage(_) => CommandKind::ShowImage,
            Command::LogMessage(_) => CommandKind::LogMessage,
            Command::Composite(_) => CommandKind::Composite,
        }
    }

    /// Returns true if applying the command twice has the same effect as once.
    ///
    /// Appending is the only operation that is not; a composite is
    /// idempotent only if all of its parts are.
    pub fn is_idempotent(&self) -> bool {
        match self {
            Command::AddFeatures(_) => false,
            Command::Composite(commands) => commands.iter().all(Command::is_idempotent),
            _ => true,
        }
    }

    /// Returns true if the payload is large enough to warrant slower retries.
    pub fn is_heavy(&self) -> bool {
        matches!(
            self,
            Command::SetFeatureCollection(_) | Command::Composite(_)
        )
    }
}

impl Validate for Command {
    fn check(&self, rules: &Rules, path: &str, report: &mut ValidationReport) {
        match self {
            Command::AddFeatures(features) | Command::UpdateFeatures(features) => {
                let features_path = field(path, "features");
                for (i, feature) in features.iter().enumerate() {
                    feature.check(rules, &index(&features_path, i), report);
                }
            }
            Command::DeleteFeatures(_) | Command::ShowText(_) | Command::ShowData(_) => {}
            Command::SetFeatureCollection(fc) => {
                fc.check(rules, &field(path, "featureCollection"), report)
            }
            Command::SetViewport(viewport) => {
                viewport.check(rules, &field(path, "viewport"), report)
            }
            Command::SetSelection(selection) => {
                selection.check(rules, &field(path, "selection"), report)
            }
            Command::SetTime(time) => time.check(rules, &field(path, "time"), report),
            Command::ShowImage(image) => {
                if !image.media_type.starts_with("image/") {
                    report.at(
                        &field(path, "mediaType"),
                        format!("'{}' is not an image type", image.media_type),
                    );
                }
                if image.data.is_empty() {
                    report.at(&field(path, "data"), "image data is empty");
                }
            }
            Command::LogMessage(log) => {
                if log.message.trim().is_empty() {
                    report.at(&field(path, "message"), "must not be empty");
                }
            }
            Command::Composite(commands) => {
                let commands_path = field(path, "commands");
                for (i, command) in commands.iter().enumerate() {
                    command.check(rules, &index(&commands_path, i), report);
                }
            }
        }
    }
}
