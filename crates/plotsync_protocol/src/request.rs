//! Typed requests: commands, queries and history actions.

use crate::command::Command;
use crate::envelope::RequestEnvelope;
use crate::error::ProtocolResult;
use plotsync_core::{DocumentId, SliceKind};
use serde_json::Value;

/// Key of the optional document address in request params.
pub const DOCUMENT_ID_PARAM: &str = "documentId";

/// A read-only request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Query {
    /// The feature collection slice.
    FeatureCollection,
    /// The selection slice.
    Selection,
    /// The features whose IDs are selected, in selection order.
    SelectedFeatures,
    /// The time slice.
    Time,
    /// The viewport slice.
    Viewport,
    /// IDs of all open documents.
    ListDocuments,
    /// ID of the active document, or `null`.
    ActiveDocument,
}

impl Query {
    /// Every query.
    pub const ALL: [Query; 7] = [
        Query::FeatureCollection,
        Query::Selection,
        Query::SelectedFeatures,
        Query::Time,
        Query::Viewport,
        Query::ListDocuments,
        Query::ActiveDocument,
    ];

    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            Query::FeatureCollection => "getFeatureCollection",
            Query::Selection => "getSelection",
            Query::SelectedFeatures => "getSelectedFeatures",
            Query::Time => "getTime",
            Query::Viewport => "getViewport",
            Query::ListDocuments => "listDocuments",
            Query::ActiveDocument => "getActiveDocument",
        }
    }

    /// Looks up a query by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|query| query.as_str() == name)
    }

    /// The slice a query reads directly, if any.
    pub fn slice(self) -> Option<SliceKind> {
        match self {
            Query::FeatureCollection => Some(SliceKind::FeatureCollection),
            Query::Selection => Some(SliceKind::Selection),
            Query::Time => Some(SliceKind::Time),
            Query::Viewport => Some(SliceKind::Viewport),
            Query::SelectedFeatures | Query::ListDocuments | Query::ActiveDocument => None,
        }
    }

    /// Returns true if the query reads one document's state.
    pub fn targets_document(self) -> bool {
        !matches!(self, Query::ListDocuments | Query::ActiveDocument)
    }
}

/// Moves through a document's history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HistoryAction {
    /// Step back.
    Undo,
    /// Step forward.
    Redo,
}

impl HistoryAction {
    /// Wire name.
    pub fn as_str(self) -> &'static str {
        match self {
            HistoryAction::Undo => "undo",
            HistoryAction::Redo => "redo",
        }
    }

    /// Looks up an action by wire name.
    pub fn from_wire(name: &str) -> Option<Self> {
        match name {
            "undo" => Some(HistoryAction::Undo),
            "redo" => Some(HistoryAction::Redo),
            _ => None,
        }
    }
}

/// Any request the protocol understands.
#[derive(Debug, Clone, PartialEq)]
pub enum Request {
    /// A mutation or display command.
    Command(Command),
    /// A read-only query.
    Query(Query),
    /// Undo or redo.
    History(HistoryAction),
}

impl Request {
    /// Wire name of the request.
    pub fn name(&self) -> &'static str {
        match self {
            Request::Command(command) => command.kind().as_str(),
            Request::Query(query) => query.as_str(),
            Request::History(action) => action.as_str(),
        }
    }

    /// Returns true if the request never changes state.
    pub fn is_read_only(&self) -> bool {
        match self {
            Request::Query(_) => true,
            Request::Command(command) => command.kind().is_display_only(),
            Request::History(_) => false,
        }
    }

    /// Returns true if repeating the request has no further effect.
    pub fn is_idempotent(&self) -> bool {
        match self {
            Request::Command(command) => command.is_idempotent(),
            Request::Query(_) => true,
            Request::History(_) => false,
        }
    }

    /// Returns true if the request reads or writes one document.
    pub fn targets_document(&self) -> bool {
        match self {
            Request::Query(query) => query.targets_document(),
            Request::Command(command) => !command.kind().is_display_only(),
            Request::History(_) => true,
        }
    }
}

impl From<Command> for Request {
    fn from(command: Command) -> Self {
        Request::Command(command)
    }
}

impl From<Query> for Request {
    fn from(query: Query) -> Self {
        Request::Query(query)
    }
}

impl From<HistoryAction> for Request {
    fn from(action: HistoryAction) -> Self {
        Request::History(action)
    }
}

/// A decoded request plus its addressing.
#[derive(Debug, Clone, PartialEq)]
pub struct AddressedRequest {
    /// Target document; `None` targets the active document.
    pub document_id: Option<DocumentId>,
    /// The request itself.
    pub request: Request,
    /// Idempotency key.
    pub request_id: Option<String>,
}

impl AddressedRequest {
    /// A request against the active document.
    pub fn new(request: impl Into<Request>) -> Self {
        Self {
            document_id: None,
            request: request.into(),
            request_id: None,
        }
    }

    /// Targets a specific document.
    pub fn with_document(mut self, document_id: impl Into<DocumentId>) -> Self {
        self.document_id = Some(document_id.into());
        self
    }

    /// Sets the idempotency key.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Encodes the request as a wire envelope.
    pub fn to_envelope(&self) -> ProtocolResult<RequestEnvelope> {
        let mut envelope = match &self.request {
            Request::Command(command) => command.to_envelope()?,
            Request::Query(query) => RequestEnvelope::new(query.as_str()),
            Request::History(action) => RequestEnvelope::new(action.as_str()),
        };
        if let Some(id) = &self.document_id {
            envelope
                .params
                .insert(DOCUMENT_ID_PARAM.to_string(), Value::String(id.to_string()));
        }
        envelope.request_id = self.request_id.clone();
        Ok(envelope)
    }
}
