//! The state store.

use crate::apply::Forwarded;
use crate::config::StoreConfig;
use crate::document::DocumentSlot;
use crate::error::{StoreError, StoreResult};
use crate::events::{
    DispatchError, DisplayContent, EventBus, EventKind, HandlerError, StoreEvent,
    SubscriptionToken,
};
use parking_lot::RwLock;
use plotsync_core::{DocumentId, EditorState, Feature, SliceKind, StateSlice, Validate};
use plotsync_protocol::{Command, LogLevel, LogMessage};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// What a successful `apply_command` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppliedEffect {
    /// The document the command was applied to.
    pub document_id: DocumentId,
    /// Slices that changed, in canonical order.
    pub changed: Vec<SliceKind>,
    /// Whether the command created an undo entry.
    pub history_recorded: bool,
    /// Display and log events forwarded.
    pub forwarded: usize,
}

impl AppliedEffect {
    /// Returns true if no slice changed.
    pub fn is_noop(&self) -> bool {
        self.changed.is_empty()
    }
}

/// Owns the editor state of every open document.
///
/// All mutation goes through [`StateStore::apply_command`] (or undo/redo).
/// Commands against one document are serialized; commands against
/// different documents run independently. Readers get the last committed
/// snapshot and never wait on a writer.
///
/// # Example
///
/// ```rust
/// use plotsync_core::{DocumentId, SelectionState, SliceKind, StateSlice};
/// use plotsync_protocol::Command;
/// use plotsync_store::StateStore;
///
/// let store = StateStore::new();
/// let doc = DocumentId::new("plot-1");
///
/// store
///     .apply_command(&doc, Command::SetSelection(SelectionState::new(vec!["t1".into()])))
///     .unwrap();
///
/// let slice = store.get_state_slice(&doc, SliceKind::Selection).unwrap();
/// assert_eq!(slice, StateSlice::Selection(Some(SelectionState::new(vec!["t1".into()]))));
/// ```
pub struct StateStore {
    config: StoreConfig,
    documents: RwLock<HashMap<DocumentId, Arc<DocumentSlot>>>,
    active: RwLock<Option<DocumentId>>,
    bus: EventBus,
}

impl StateStore {
    /// Creates a store with default configuration.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    /// Creates a store with the given configuration.
    pub fn with_config(config: StoreConfig) -> Self {
        let bus = EventBus::new(config.handler_timeout, config.max_dispatch_errors);
        Self {
            config,
            documents: RwLock::new(HashMap::new()),
            active: RwLock::new(None),
            bus,
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    // ========================================================================
    // Documents
    // ========================================================================

    /// Opens a document with empty state. Returns false if already open.
    pub fn open_document(&self, id: &DocumentId) -> bool {
        let (_, created) = self.slot_or_create(id);
        created
    }

    /// Opens (or reopens) a document with the given state.
    ///
    /// The state is validated first. Any previous history is discarded and
    /// every slice event is emitted.
    pub fn load_document(&self, id: &DocumentId, state: EditorState) -> StoreResult<()> {
        state.validate(&self.config.rules()).into_result(())?;

        let (slot, _) = self.slot_or_create(id);
        let writer = slot.write();
        let state = writer.load(state);
        info!(document = %id, features = state.feature_count(), "document loaded");
        self.emit_slices(id, &state, &SliceKind::ALL);
        Ok(())
    }

    /// Closes a document, discarding its state and history.
    ///
    /// Returns false if it was not open.
    pub fn close_document(&self, id: &DocumentId) -> bool {
        if self.documents.write().remove(id).is_none() {
            return false;
        }
        info!(document = %id, "document closed");

        let was_active = {
            let mut active = self.active.write();
            if active.as_ref() == Some(id) {
                *active = None;
                true
            } else {
                false
            }
        };
        if was_active {
            self.bus.dispatch(&StoreEvent::ActiveDocumentChanged {
                previous: Some(id.clone()),
                current: None,
            });
        }
        self.bus.dispatch(&StoreEvent::DocumentClosed {
            document_id: id.clone(),
        });
        true
    }

    /// Returns true if the document is open.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.documents.read().contains_key(id)
    }

    /// IDs of open documents, sorted.
    pub fn document_ids(&self) -> Vec<DocumentId> {
        let mut ids: Vec<_> = self.documents.read().keys().cloned().collect();
        ids.sort();
        ids
    }

    // ========================================================================
    // Reads
    // ========================================================================

    /// Returns a copy of one slice of a document.
    pub fn get_state_slice(&self, id: &DocumentId, kind: SliceKind) -> StoreResult<StateSlice> {
        Ok(self.snapshot(id)?.slice(kind))
    }

    /// Returns the whole committed state of a document.
    pub fn snapshot(&self, id: &DocumentId) -> StoreResult<Arc<EditorState>> {
        Ok(self.slot(id)?.snapshot())
    }

    /// Features whose IDs are selected, in selection order.
    ///
    /// Selected IDs with no matching feature are skipped.
    pub fn selected_features(&self, id: &DocumentId) -> StoreResult<Vec<Feature>> {
        let state = self.snapshot(id)?;
        let (Some(selection), Some(fc)) = (&state.selection_state, &state.feature_collection)
        else {
            return Ok(Vec::new());
        };
        Ok(selection
            .selected_ids
            .iter()
            .filter_map(|id| fc.get(id).cloned())
            .collect())
    }

    /// Undo entries available for a document.
    pub fn history_len(&self, id: &DocumentId) -> StoreResult<usize> {
        Ok(self.slot(id)?.write().undo_len())
    }

    // ========================================================================
    // Mutation
    // ========================================================================

    /// Validates and applies a command as one atomic transition.
    ///
    /// An unknown document is created with empty state first, unless the
    /// command is display-only. On a validation failure nothing changes.
    /// Subscribers run after the commit; their failures are reported
    /// through [`StateStore::take_dispatch_errors`], not returned here.
    pub fn apply_command(&self, id: &DocumentId, command: Command) -> StoreResult<AppliedEffect> {
        command.validate(&self.config.rules()).into_result(())?;

        if command.kind().is_display_only() {
            let forwarded = self.forward_unchecked(Some(id), command);
            return Ok(AppliedEffect {
                document_id: id.clone(),
                changed: Vec::new(),
                history_recorded: false,
                forwarded,
            });
        }

        let kind = command.kind();
        let (slot, _) = self.slot_or_create(id);
        let writer = slot.write();
        let (transition, history_recorded) = writer.apply(command);
        let changed: Vec<SliceKind> = transition.changed.iter().copied().collect();
        debug!(
            document = %id,
            command = %kind,
            ?changed,
            history_recorded,
            "command applied"
        );

        self.emit_slices(id, &transition.state, &changed);
        let forwarded = transition.forwarded.len();
        for item in transition.forwarded {
            self.deliver(Some(id), item);
        }
        drop(writer);

        Ok(AppliedEffect {
            document_id: id.clone(),
            changed,
            history_recorded,
            forwarded,
        })
    }

    /// Validates and delivers a display-only command without touching any
    /// document, which need not be open.
    ///
    /// Returns the number of events forwarded; commands that mutate state
    /// forward nothing.
    pub fn forward(&self, id: Option<&DocumentId>, command: Command) -> StoreResult<usize> {
        command.validate(&self.config.rules()).into_result(())?;
        Ok(self.forward_unchecked(id, command))
    }

    fn forward_unchecked(&self, id: Option<&DocumentId>, command: Command) -> usize {
        let item = match command {
            Command::ShowText(text) => Forwarded::Display(DisplayContent::Text(text)),
            Command::ShowData(data) => Forwarded::Display(DisplayContent::Data(data)),
            Command::ShowImage(image) => Forwarded::Display(DisplayContent::Image(image)),
            Command::LogMessage(message) => Forwarded::Log(message),
            _ => return 0,
        };
        self.deliver(id, item);
        1
    }

    /// Reverts the last change to a document. Returns false if there was
    /// nothing to undo.
    ///
    /// A selection changed since the last history entry is restored first,
    /// without consuming history.
    pub fn undo(&self, id: &DocumentId) -> StoreResult<bool> {
        let slot = self.slot(id)?;
        let writer = slot.write();
        let Some(state) = writer.undo() else {
            return Ok(false);
        };
        debug!(document = %id, "undo");
        self.emit_slices(id, &state, &SliceKind::ALL);
        Ok(true)
    }

    /// Re-applies the last undone change. Returns false if there was
    /// nothing to redo.
    pub fn redo(&self, id: &DocumentId) -> StoreResult<bool> {
        let slot = self.slot(id)?;
        let writer = slot.write();
        let Some(state) = writer.redo() else {
            return Ok(false);
        };
        debug!(document = %id, "redo");
        self.emit_slices(id, &state, &SliceKind::ALL);
        Ok(true)
    }

    // ========================================================================
    // Active document
    // ========================================================================

    /// Moves the active pointer. The document must be open.
    pub fn set_active_document(&self, id: &DocumentId) -> StoreResult<()> {
        if !self.contains(id) {
            return Err(StoreError::DocumentNotFound(id.clone()));
        }
        let previous = self.active.write().replace(id.clone());
        self.bus.dispatch(&StoreEvent::ActiveDocumentChanged {
            previous,
            current: Some(id.clone()),
        });
        Ok(())
    }

    /// Clears the active pointer.
    pub fn clear_active_document(&self) {
        let previous = self.active.write().take();
        if previous.is_some() {
            self.bus.dispatch(&StoreEvent::ActiveDocumentChanged {
                previous,
                current: None,
            });
        }
    }

    /// The active document, if any.
    pub fn active_document(&self) -> Option<DocumentId> {
        self.active.read().clone()
    }

    /// Returns `id` if given, otherwise the active document.
    pub fn resolve(&self, id: Option<&DocumentId>) -> StoreResult<DocumentId> {
        match id {
            Some(id) => Ok(id.clone()),
            None => self.active_document().ok_or(StoreError::NoActiveDocument),
        }
    }

    // ========================================================================
    // Subscriptions
    // ========================================================================

    /// Registers a handler for one kind of event.
    pub fn subscribe<F>(&self, kind: EventKind, handler: F) -> SubscriptionToken
    where
        F: Fn(&StoreEvent) -> Result<(), HandlerError> + Send + Sync + 'static,
    {
        self.bus.subscribe(kind, handler)
    }

    /// Removes a handler. Idempotent; safe to call from inside a handler.
    pub fn unsubscribe(&self, token: SubscriptionToken) -> bool {
        self.bus.unsubscribe(token)
    }

    /// Drains subscriber failures recorded since the last call.
    pub fn take_dispatch_errors(&self) -> Vec<DispatchError> {
        self.bus.take_errors()
    }

    // ========================================================================
    // Internal
    // ========================================================================

    fn slot(&self, id: &DocumentId) -> StoreResult<Arc<DocumentSlot>> {
        self.documents
            .read()
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::DocumentNotFound(id.clone()))
    }

    fn slot_or_create(&self, id: &DocumentId) -> (Arc<DocumentSlot>, bool) {
        if let Some(slot) = self.documents.read().get(id) {
            return (slot.clone(), false);
        }

        let (slot, created) = {
            let mut documents = self.documents.write();
            match documents.get(id) {
                Some(slot) => (slot.clone(), false),
                None => {
                    let slot = Arc::new(DocumentSlot::new(
                        EditorState::default(),
                        self.config.max_history,
                    ));
                    documents.insert(id.clone(), slot.clone());
                    (slot, true)
                }
            }
        };
        if created {
            info!(document = %id, "document opened");
            self.bus.dispatch(&StoreEvent::DocumentOpened {
                document_id: id.clone(),
            });
        }
        (slot, created)
    }

    fn emit_slices(&self, id: &DocumentId, state: &EditorState, kinds: &[SliceKind]) {
        for kind in kinds {
            self.bus.dispatch(&StoreEvent::SliceChanged {
                document_id: id.clone(),
                slice: state.slice(*kind),
            });
        }
    }

    fn deliver(&self, id: Option<&DocumentId>, item: Forwarded) {
        let document_id = id.cloned();
        let event = match item {
            Forwarded::Display(content) => StoreEvent::Display {
                document_id,
                content,
            },
            Forwarded::Log(message) => {
                log_remote(id, &message);
                StoreEvent::Log {
                    document_id,
                    message,
                }
            }
        };
        self.bus.dispatch(&event);
    }
}

impl Default for StateStore {
    fn default() -> Self {
        Self::new()
    }
}

fn log_remote(id: Option<&DocumentId>, log: &LogMessage) {
    let document = id.map(DocumentId::as_str).unwrap_or("-");
    match log.level {
        LogLevel::Debug => debug!(target: "plotsync::remote", document, "{}", log.message),
        LogLevel::Info => info!(target: "plotsync::remote", document, "{}", log.message),
        LogLevel::Warning => warn!(target: "plotsync::remote", document, "{}", log.message),
        LogLevel::Error => error!(target: "plotsync::remote", document, "{}", log.message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use plotsync_core::{
        parse_timestamp, FeatureCollection, FeatureId, PointFeature, PointGeometry,
        PointProperties, SelectionState, TimePolicy, TimeState, ViewportState,
    };
    use std::time::Duration;

    fn doc() -> DocumentId {
        DocumentId::new("doc1")
    }

    fn point(id: &str) -> Feature {
        Feature::Point(PointFeature {
            id: Some(id.into()),
            geometry: PointGeometry::new(4.0, 52.0),
            properties: PointProperties::default(),
        })
    }

    fn select(ids: &[&str]) -> Command {
        Command::SetSelection(SelectionState::new(
            ids.iter().map(|id| FeatureId::from(*id)).collect(),
        ))
    }

    fn events(store: &StateStore, kinds: &[EventKind]) -> Arc<Mutex<Vec<StoreEvent>>> {
        let log = Arc::new(Mutex::new(Vec::new()));
        for kind in kinds {
            let log = log.clone();
            store.subscribe(*kind, move |event| {
                log.lock().push(event.clone());
                Ok(())
            });
        }
        log
    }

    #[test]
    fn unknown_document_is_created_on_first_command() {
        let store = StateStore::new();
        let opened = events(&store, &[EventKind::DocumentOpened]);

        let effect = store
            .apply_command(&doc(), Command::AddFeatures(vec![point("a")]))
            .unwrap();
        assert_eq!(effect.changed, [SliceKind::FeatureCollection]);
        assert!(effect.history_recorded);
        assert!(store.contains(&doc()));
        assert_eq!(opened.lock().len(), 1);
    }

    #[test]
    fn unknown_document_read_is_not_found() {
        let store = StateStore::new();
        let err = store.get_state_slice(&doc(), SliceKind::Time).unwrap_err();
        assert!(matches!(err, StoreError::DocumentNotFound(_)));
    }

    #[test]
    fn validation_failure_changes_nothing() {
        let store = StateStore::new();
        store.open_document(&doc());
        let changes = events(&store, &[EventKind::ViewportChanged]);

        let err = store
            .apply_command(
                &doc(),
                Command::SetViewport(ViewportState::new(0.0, 20.0, 10.0, -20.0)),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert!(store.snapshot(&doc()).unwrap().viewport_state.is_none());
        assert!(changes.lock().is_empty());
        assert_eq!(store.history_len(&doc()).unwrap(), 0);
    }

    #[test]
    fn selection_undo_keeps_features() {
        let store = StateStore::new();
        store
            .apply_command(&doc(), Command::AddFeatures(vec![point("trackA")]))
            .unwrap();
        let effect = store.apply_command(&doc(), select(&["trackA"])).unwrap();
        assert!(!effect.history_recorded);

        assert!(store.undo(&doc()).unwrap());
        let state = store.snapshot(&doc()).unwrap();
        assert!(state.selection_state.is_none());
        assert_eq!(state.feature_count(), 1);

        assert!(store.undo(&doc()).unwrap());
        assert_eq!(store.snapshot(&doc()).unwrap().feature_count(), 0);
        assert!(!store.undo(&doc()).unwrap());
    }

    #[test]
    fn undo_emits_every_slice() {
        let store = StateStore::new();
        store
            .apply_command(&doc(), Command::AddFeatures(vec![point("a")]))
            .unwrap();
        let seen = events(
            &store,
            &[
                EventKind::FeatureCollectionChanged,
                EventKind::TimeChanged,
                EventKind::ViewportChanged,
                EventKind::SelectionChanged,
            ],
        );
        store.undo(&doc()).unwrap();

        let kinds: Vec<EventKind> = seen.lock().iter().map(StoreEvent::kind).collect();
        assert_eq!(
            kinds,
            [
                EventKind::FeatureCollectionChanged,
                EventKind::TimeChanged,
                EventKind::ViewportChanged,
                EventKind::SelectionChanged,
            ]
        );
    }

    #[test]
    fn redo_after_undo() {
        let store = StateStore::new();
        let fc = FeatureCollection::new(vec![point("a"), point("b")]);
        store
            .apply_command(&doc(), Command::SetFeatureCollection(fc.clone()))
            .unwrap();
        store.undo(&doc()).unwrap();
        assert!(store.redo(&doc()).unwrap());
        assert_eq!(
            store.get_state_slice(&doc(), SliceKind::FeatureCollection).unwrap(),
            StateSlice::FeatureCollection(Some(fc))
        );
        assert!(!store.redo(&doc()).unwrap());
    }

    #[test]
    fn history_is_capped() {
        let store = StateStore::with_config(StoreConfig::new().with_max_history(3));
        for i in 0..10 {
            store
                .apply_command(
                    &doc(),
                    Command::SetViewport(ViewportState::new(f64::from(i), 0.0, 20.0, 10.0)),
                )
                .unwrap();
        }
        assert_eq!(store.history_len(&doc()).unwrap(), 3);
    }

    #[test]
    fn composite_is_one_history_entry() {
        let store = StateStore::new();
        store
            .apply_command(
                &doc(),
                Command::Composite(vec![
                    Command::AddFeatures(vec![point("a")]),
                    Command::SetViewport(ViewportState::new(0.0, 0.0, 1.0, 1.0)),
                ]),
            )
            .unwrap();
        assert_eq!(store.history_len(&doc()).unwrap(), 1);

        store.undo(&doc()).unwrap();
        assert_eq!(*store.snapshot(&doc()).unwrap(), EditorState::default());
    }

    #[test]
    fn invalid_composite_applies_nothing() {
        let store = StateStore::new();
        store.open_document(&doc());
        let err = store
            .apply_command(
                &doc(),
                Command::Composite(vec![
                    Command::AddFeatures(vec![point("a")]),
                    Command::SetViewport(ViewportState::new(0.0, 0.0, 500.0, 1.0)),
                ]),
            )
            .unwrap_err();
        assert!(err.is_validation());
        assert_eq!(store.snapshot(&doc()).unwrap().feature_count(), 0);
    }

    #[test]
    fn time_policy_is_configurable() {
        let t = |s| parse_timestamp(s).unwrap();
        let scrubbed = TimeState::new(
            t("2024-01-05T00:00:00Z"),
            t("2024-01-01T00:00:00Z"),
            t("2024-01-02T00:00:00Z"),
        );

        let lenient = StateStore::new();
        assert!(lenient
            .apply_command(&doc(), Command::SetTime(scrubbed.clone()))
            .is_ok());

        let strict = StateStore::with_config(
            StoreConfig::new().with_time_policy(TimePolicy::CurrentWithinRange),
        );
        assert!(strict
            .apply_command(&doc(), Command::SetTime(scrubbed))
            .unwrap_err()
            .is_validation());
    }

    #[test]
    fn display_commands_do_not_create_documents() {
        let store = StateStore::new();
        let shown = events(&store, &[EventKind::Display, EventKind::Log]);

        let effect = store
            .apply_command(&doc(), Command::ShowText("hello".into()))
            .unwrap();
        assert_eq!(effect.forwarded, 1);
        assert!(!store.contains(&doc()));

        let forwarded = store
            .forward(
                None,
                Command::LogMessage(LogMessage {
                    message: "ping".into(),
                    level: LogLevel::Warning,
                    timestamp: None,
                }),
            )
            .unwrap();
        assert_eq!(forwarded, 1);
        assert!(store
            .forward(None, Command::ShowText("   ".into()))
            .is_ok());
        assert!(store
            .forward(
                None,
                Command::LogMessage(LogMessage {
                    message: " ".into(),
                    level: LogLevel::Info,
                    timestamp: None,
                }),
            )
            .unwrap_err()
            .is_validation());
        let seen = shown.lock();
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[1].kind(), EventKind::Log);
    }

    #[test]
    fn active_document_lifecycle() {
        let store = StateStore::new();
        let moves = events(&store, &[EventKind::ActiveDocumentChanged, EventKind::DocumentClosed]);

        assert!(matches!(
            store.set_active_document(&doc()),
            Err(StoreError::DocumentNotFound(_))
        ));
        assert!(matches!(store.resolve(None), Err(StoreError::NoActiveDocument)));

        store.open_document(&doc());
        store.set_active_document(&doc()).unwrap();
        assert_eq!(store.resolve(None).unwrap(), doc());
        assert_eq!(store.resolve(Some(&DocumentId::new("x"))).unwrap(), DocumentId::new("x"));

        assert!(store.close_document(&doc()));
        assert!(!store.close_document(&doc()));
        assert_eq!(store.active_document(), None);

        let seen = moves.lock();
        assert_eq!(
            seen.as_slice(),
            [
                StoreEvent::ActiveDocumentChanged {
                    previous: None,
                    current: Some(doc()),
                },
                StoreEvent::ActiveDocumentChanged {
                    previous: Some(doc()),
                    current: None,
                },
                StoreEvent::DocumentClosed {
                    document_id: doc()
                },
            ]
        );
    }

    #[test]
    fn failing_subscriber_does_not_roll_back() {
        let store = StateStore::new();
        store.subscribe(EventKind::SelectionChanged, |_| Err("panel gone".into()));
        let later = events(&store, &[EventKind::SelectionChanged]);

        assert!(store.apply_command(&doc(), select(&["a"])).is_ok());
        assert!(store.snapshot(&doc()).unwrap().selection_state.is_some());
        assert_eq!(later.lock().len(), 1);
        assert_eq!(store.take_dispatch_errors().len(), 1);
    }

    #[test]
    fn subscriber_may_command_same_document() {
        let store = Arc::new(StateStore::new());
        let weak = Arc::downgrade(&store);
        store.subscribe(EventKind::FeatureCollectionChanged, move |event| {
            let StoreEvent::SliceChanged { document_id, .. } = event else {
                return Ok(());
            };
            if let Some(store) = weak.upgrade() {
                store.apply_command(document_id, select(&["a"]))?;
            }
            Ok(())
        });

        store
            .apply_command(&doc(), Command::AddFeatures(vec![point("a")]))
            .unwrap();
        assert_eq!(
            store.selected_features(&doc()).unwrap(),
            vec![point("a")]
        );
    }

    #[test]
    fn slow_subscriber_is_evicted() {
        let store = StateStore::with_config(
            StoreConfig::new().with_handler_timeout(Duration::from_millis(5)),
        );
        store.subscribe(EventKind::SelectionChanged, |_| {
            std::thread::sleep(Duration::from_millis(30));
            Ok(())
        });

        store.apply_command(&doc(), select(&["a"])).unwrap();
        store.apply_command(&doc(), select(&["b"])).unwrap();
        assert_eq!(store.take_dispatch_errors().len(), 1);
    }

    #[test]
    fn load_replaces_state_and_history() {
        let store = StateStore::new();
        store
            .apply_command(&doc(), Command::AddFeatures(vec![point("a")]))
            .unwrap();

        let loaded = EditorState {
            viewport_state: Some(ViewportState::new(170.0, -10.0, -170.0, 10.0)),
            ..EditorState::default()
        };
        store.load_document(&doc(), loaded.clone()).unwrap();
        assert_eq!(*store.snapshot(&doc()).unwrap(), loaded);
        assert!(!store.undo(&doc()).unwrap());
    }

    #[test]
    fn concurrent_writers_do_not_lose_updates() {
        let store = Arc::new(StateStore::new());
        store.open_document(&doc());

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for i in 0..25 {
                        let id = format!("f-{t}-{i}");
                        store
                            .apply_command(&doc(), Command::AddFeatures(vec![point(&id)]))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(store.snapshot(&doc()).unwrap().feature_count(), 200);
    }
}
