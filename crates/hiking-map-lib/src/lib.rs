//! Hiking Map Library - Track Pipeline and Visibility Engine
//!
//! This library turns a folder-organised collection of GPX files into map layers and keeps
//! three pieces of state consistent with each other: the folder/file tree, the set of
//! checked (intended visible) items, and the cache of materialized map layers.
//!
//! # Architecture
//!
//! - **[`track`]**: Lenient GPX parsing into [`TrackSegment`]s with distance and elevation stats
//! - **[`utils`]**: Great-circle distance and small text helpers
//! - **[`color`]**: Folder colors and the per-track [`color::color_for`] lookup
//! - **[`TreeModel`]**: Folder hierarchy, [`CheckedSet`] and [`Selection`]
//! - **[`LayerManager`]**: Owns the [`LayerCache`] and drives an external [`MapWidget`]
//! - **[`SyncController`]**: Orchestrates multi-step flows over the explicit [`AppState`]
//!
//! All state is mutated from a single logical thread. Storage and file reads are async
//! collaborators (see [`storage`]) that suspend the calling flow without blocking it.

pub mod color;
mod controller;
mod debounce;
mod layers;
pub mod storage;
pub mod track;
mod tree;
pub mod utils;

// Public API exports
pub use color::{DEFAULT_FOLDER_COLOR, HexColor};
pub use controller::{AppState, MAP_VIEW_SAVE_DELAY, Notice, SyncController};
pub use debounce::Debouncer;
pub use layers::{
    BORDER_COLOR, FIT_PADDING, FitOutcome, LayerCache, LayerManager, MapWidget, Polyline,
    PolylineStyle, ShowOutcome, TrackLayer,
};
pub use storage::{CollectionStore, DirectoryReader, FileReader, MapView, SettingsStore, StorageMutator};
pub use track::{MAX_GPX_BYTES, TrackSegment};
pub use tree::{CheckedSet, FileNode, FileTreeNode, FolderNode, Selection, TreeModel};

/// Error taxonomy shared by the core and its collaborators
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// Bad folder name, bad hex color, bad path, oversized input
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed GPX XML. Never escapes [`track::parse`].
    #[error("GPX parsing error: {0}")]
    GpxParse(String),

    /// A track produced no drawable segments
    #[error("Failed to load track: {0}")]
    TrackLoad(String),

    #[error("JSON error: {0}")]
    Json(String),
}

pub type Result<T> = std::result::Result<T, CoreError>;
