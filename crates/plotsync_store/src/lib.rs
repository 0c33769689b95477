//! # plotsync Store
//!
//! The editor state synchronization core.
//!
//! This crate provides:
//! - `StateStore`: one `EditorState` per open document, mutated only by
//!   validated commands, with an active-document pointer
//! - Per-document undo/redo history (selection changes are not recorded)
//! - `EventBus`: synchronous publish/subscribe of change events with
//!   per-handler error isolation and a time budget
//! - Plot file persistence with metadata kept out of the visible features
//! - `CommandService`: answers wire envelopes, replaying duplicates by
//!   `requestId`
//!
//! ## Consistency
//!
//! Each command is one atomic transition of the whole document state.
//! Writers to the same document are serialized; readers always see the
//! last committed snapshot, never a half-applied one.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod apply;
mod config;
mod document;
mod error;
mod events;
mod history;
mod persist;
mod service;
mod store;

pub use config::StoreConfig;
pub use error::{StoreError, StoreResult};
pub use events::{
    DispatchError, DispatchFailure, DisplayContent, EventBus, EventKind, Handler, HandlerError,
    StoreEvent, SubscriptionToken,
};
pub use history::{History, DEFAULT_MAX_HISTORY};
pub use persist::{from_plot, read_plot, to_plot, write_plot};
pub use service::{CommandService, DEFAULT_CACHE_CAPACITY};
pub use store::{AppliedEffect, StateStore};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
