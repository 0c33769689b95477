//! Decoding envelopes into typed requests, and the reverse.
//!
//! Params are decoded once, at the boundary. Every payload error is
//! collected into one [`ValidationReport`] so a caller sees all of them.

use crate::command::{Command, CommandKind, DataPayload, ImagePayload, LogLevel, LogMessage};
use crate::envelope::RequestEnvelope;
use crate::error::{ProtocolError, ProtocolResult};
use crate::request::{AddressedRequest, HistoryAction, Query, Request, DOCUMENT_ID_PARAM};
use plotsync_core::validate::{
    index, parse_feature, parse_feature_collection, parse_selection_state, parse_time_state,
    parse_viewport_state,
};
use plotsync_core::{parse_timestamp, DocumentId, FeatureId, Rules, Validate, ValidationReport};
use serde_json::{Map, Value};

type Params = Map<String, Value>;

/// Decodes any request envelope.
///
/// Unknown names are [`ProtocolError::UnknownCommand`]; bad params are
/// [`ProtocolError::Validation`] listing every problem.
pub fn decode_request(envelope: &RequestEnvelope) -> ProtocolResult<AddressedRequest> {
    let document_id = match envelope.params.get(DOCUMENT_ID_PARAM) {
        None | Some(Value::Null) => None,
        Some(Value::String(id)) if !id.is_empty() => Some(DocumentId::new(id.as_str())),
        Some(_) => {
            return Err(ProtocolError::Validation(ValidationReport::single(format!(
                "{DOCUMENT_ID_PARAM}: expected a non-empty string"
            ))))
        }
    };

    let name = envelope.command.as_str();
    let request = if let Some(kind) = CommandKind::from_wire(name) {
        Request::Command(parse_params(kind, &envelope.params).map_err(ProtocolError::Validation)?)
    } else if let Some(query) = Query::from_wire(name) {
        Request::Query(query)
    } else if let Some(action) = HistoryAction::from_wire(name) {
        Request::History(action)
    } else if name.is_empty() {
        return Err(ProtocolError::Malformed("missing command name".into()));
    } else {
        return Err(ProtocolError::UnknownCommand(name.to_string()));
    };

    Ok(AddressedRequest {
        document_id,
        request,
        request_id: envelope.request_id.clone(),
    })
}

/// Decodes an envelope that must carry a command (not a query or history action).
pub fn decode_command(envelope: &RequestEnvelope) -> ProtocolResult<Command> {
    let kind = CommandKind::from_wire(&envelope.command)
        .ok_or_else(|| ProtocolError::UnknownCommand(envelope.command.clone()))?;
    parse_params(kind, &envelope.params).map_err(ProtocolError::Validation)
}

fn parse_params(kind: CommandKind, params: &Params) -> Result<Command, ValidationReport> {
    let rules = Rules::default();
    let mut report = ValidationReport::new();

    let command = match kind {
        CommandKind::AddFeatures => read_features(params, &mut report).map(Command::AddFeatures),
        CommandKind::UpdateFeatures => {
            read_features(params, &mut report).map(Command::UpdateFeatures)
        }
        CommandKind::DeleteFeatures => read_ids(params, &mut report).map(Command::DeleteFeatures),
        CommandKind::SetFeatureCollection => {
            read_slice(params, "featureCollection", &mut report, parse_feature_collection)
                .map(Command::SetFeatureCollection)
        }
        CommandKind::SetViewport => {
            read_slice(params, "viewport", &mut report, parse_viewport_state)
                .map(Command::SetViewport)
        }
        CommandKind::SetSelection => {
            read_slice(params, "selection", &mut report, parse_selection_state)
                .map(Command::SetSelection)
        }
        CommandKind::SetTime => read_slice(params, "time", &mut report, |value| {
            parse_time_state(value, &rules)
        })
        .map(Command::SetTime),
        CommandKind::ShowText => {
            read_string(params, "text", &mut report).map(Command::ShowText)
        }
        CommandKind::ShowData => match params.get("data") {
            None => {
                report.at("data", "required");
                None
            }
            Some(data) => Some(Command::ShowData(DataPayload {
                title: read_optional_string(params, "title", &mut report),
                data: data.clone(),
            })),
        },
        CommandKind::ShowImage => {
            let media_type = read_string(params, "mediaType", &mut report);
            let data = read_string(params, "data", &mut report);
            let title = read_optional_string(params, "title", &mut report);
            match (media_type, data) {
                (Some(media_type), Some(data)) => Some(Command::ShowImage(ImagePayload {
                    media_type,
                    data,
                    title,
                })),
                _ => None,
            }
        }
        CommandKind::LogMessage => read_log_message(params, &mut report).map(Command::LogMessage),
        CommandKind::Composite => read_composite(params, &mut report).map(Command::Composite),
    };

    match command {
        Some(command) if report.is_valid() => {
            if matches!(command, Command::ShowImage(_) | Command::LogMessage(_)) {
                command.check(&rules, "", &mut report);
            }
            report.into_result(command)
        }
        _ => Err(report),
    }
}

fn read_features(
    params: &Params,
    report: &mut ValidationReport,
) -> Option<Vec<plotsync_core::Feature>> {
    let Some(items) = params.get("features").and_then(Value::as_array) else {
        report.at("features", "expected an array of features");
        return None;
    };
    let mut features = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match parse_feature(item) {
            Ok(feature) => features.push(feature),
            Err(errors) => report.merge_prefixed(&index("features", i), errors),
        }
    }
    Some(features)
}

fn read_ids(params: &Params, report: &mut ValidationReport) -> Option<Vec<FeatureId>> {
    let Some(items) = params.get("ids").and_then(Value::as_array) else {
        report.at("ids", "expected an array of feature ids");
        return None;
    };
    let mut ids = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match FeatureId::from_json(item) {
            Some(id) => ids.push(id),
            None => report.at(&index("ids", i), "expected a string or integer id"),
        }
    }
    Some(ids)
}

fn read_slice<T>(
    params: &Params,
    key: &str,
    report: &mut ValidationReport,
    parse: impl FnOnce(&Value) -> Result<T, ValidationReport>,
) -> Option<T> {
    let Some(value) = params.get(key) else {
        report.at(key, "required");
        return None;
    };
    match parse(value) {
        Ok(slice) => Some(slice),
        Err(errors) => {
            report.merge_prefixed(key, errors);
            None
        }
    }
}

fn read_string(params: &Params, key: &str, report: &mut ValidationReport) -> Option<String> {
    match params.get(key) {
        Some(Value::String(text)) => Some(text.clone()),
        None | Some(Value::Null) => {
            report.at(key, "required");
            None
        }
        Some(_) => {
            report.at(key, "expected a string");
            None
        }
    }
}

fn read_optional_string(
    params: &Params,
    key: &str,
    report: &mut ValidationReport,
) -> Option<String> {
    match params.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(text)) => Some(text.clone()),
        Some(_) => {
            report.at(key, "expected a string");
            None
        }
    }
}

fn read_log_message(params: &Params, report: &mut ValidationReport) -> Option<LogMessage> {
    let message = read_string(params, "message", report);
    let level = match params.get("level") {
        None | Some(Value::Null) => Some(LogLevel::default()),
        Some(value) => match serde_json::from_value::<LogLevel>(value.clone()) {
            Ok(level) => Some(level),
            Err(_) => {
                report.at("level", format!("unrecognized log level {value}"));
                None
            }
        },
    };
    let timestamp = match read_optional_string(params, "timestamp", report) {
        None => None,
        Some(text) => match parse_timestamp(&text) {
            Ok(ts) => Some(ts),
            Err(e) => {
                report.at("timestamp", e);
                None
            }
        },
    };
    Some(LogMessage {
        message: message?,
        level: level?,
        timestamp,
    })
}

fn read_composite(params: &Params, report: &mut ValidationReport) -> Option<Vec<Command>> {
    let Some(items) = params.get("commands").and_then(Value::as_array) else {
        report.at("commands", "expected an array of commands");
        return None;
    };

    let mut commands = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = index("commands", i);
        let Some(name) = item.get("command").and_then(Value::as_str) else {
            report.at(&path, "expected {\"command\", \"params\"}");
            continue;
        };
        let Some(kind) = CommandKind::from_wire(name) else {
            if Query::from_wire(name).is_some() || HistoryAction::from_wire(name).is_some() {
                report.at(&path, format!("'{name}' cannot be part of a composite"));
            } else {
                report.at(&path, format!("unknown command '{name}'"));
            }
            continue;
        };
        let empty = Params::new();
        let sub_params = match item.get("params") {
            None | Some(Value::Null) => &empty,
            Some(Value::Object(map)) => map,
            Some(_) => {
                report.at(&path, "params: expected an object");
                continue;
            }
        };
        match parse_params(kind, sub_params) {
            Ok(command) => commands.push(command),
            Err(errors) => report.merge_prefixed(&path, errors),
        }
    }
    Some(commands)
}

impl Command {
    /// Encodes the command's payload as envelope params.
    pub fn to_params(&self) -> ProtocolResult<Params> {
        let mut params = Params::new();
        match self {
            Command::AddFeatures(features) | Command::UpdateFeatures(features) => {
                params.insert("features".into(), serde_json::to_value(features)?);
            }
            Command::DeleteFeatures(ids) => {
                params.insert("ids".into(), serde_json::to_value(ids)?);
            }
            Command::SetFeatureCollection(fc) => {
                params.insert("featureCollection".into(), serde_json::to_value(fc)?);
            }
            Command::SetViewport(viewport) => {
                params.insert("viewport".into(), serde_json::to_value(viewport)?);
            }
            Command::SetSelection(selection) => {
                params.insert("selection".into(), serde_json::to_value(selection)?);
            }
            Command::SetTime(time) => {
                params.insert("time".into(), serde_json::to_value(time)?);
            }
            Command::ShowText(text) => {
                params.insert("text".into(), Value::String(text.clone()));
            }
            Command::ShowData(payload) => params = object(serde_json::to_value(payload)?),
            Command::ShowImage(payload) => params = object(serde_json::to_value(payload)?),
            Command::LogMessage(log) => params = object(serde_json::to_value(log)?),
            Command::Composite(commands) => {
                let encoded = commands
                    .iter()
                    .map(|command| {
                        Ok(serde_json::json!({
                            "command": command.kind().as_str(),
                            "params": command.to_params()?,
                        }))
                    })
                    .collect::<ProtocolResult<Vec<_>>>()?;
                params.insert("commands".into(), Value::Array(encoded));
            }
        }
        Ok(params)
    }

    /// Encodes the command as a wire envelope.
    pub fn to_envelope(&self) -> ProtocolResult<RequestEnvelope> {
        Ok(RequestEnvelope {
            command: self.kind().as_str().to_string(),
            params: self.to_params()?,
            request_id: None,
        })
    }
}

fn object(value: Value) -> Params {
    match value {
        Value::Object(map) => map,
        _ => Params::new(),
    }
}
