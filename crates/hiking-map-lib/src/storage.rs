//! Collaborator interfaces consumed by the core
//!
//! The host provides implementations of these traits: a directory reader that
//! snapshots the collection, a file reader for GPX text, a mutator for storage changes,
//! and a settings store for the persisted map view. Paths are always slash-joined and
//! relative to the collection root.

use crate::Result;
use crate::color::HexColor;
use crate::tree::{FileNode, FileTreeNode, FolderNode};
use std::future::Future;
use std::path::PathBuf;

/// Recursive snapshot of the collection
#[allow(async_fn_in_trait)]
pub trait DirectoryReader {
    /// Read the whole tree. Each folder carries its resolved color.
    async fn read_tree(&self) -> Result<Vec<FileTreeNode>>;
}

/// Access to GPX file contents
#[allow(async_fn_in_trait)]
pub trait FileReader {
    /// Read a file as text. Fails with `NotFound` or `Io`.
    async fn read_text(&self, path: &str) -> Result<String>;
}

/// Storage changes. Each may fail with `Validation` or `Io`.
#[allow(async_fn_in_trait)]
pub trait StorageMutator {
    /// Delete a file, or a folder with all its contents
    async fn delete(&self, node: &FileTreeNode) -> Result<()>;

    /// Create `name` under `parent` (the root when `None`)
    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<FolderNode>;

    /// Persist a folder's color sidecar
    async fn set_folder_color(&self, path: &str, color: &HexColor) -> Result<()>;

    /// Copy external GPX files into `dest` (the root when `None`)
    ///
    /// Returns the records of the files that were actually copied.
    async fn copy_in_files(&self, sources: &[PathBuf], dest: Option<&str>) -> Result<Vec<FileNode>>;
}

/// Everything the controller needs from the collection backend
pub trait CollectionStore: DirectoryReader + FileReader + StorageMutator {}

impl<T: DirectoryReader + FileReader + StorageMutator> CollectionStore for T {}

/// Map camera position
#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MapView {
    /// `[lat, lon]`
    pub center: [f64; 2],
    pub zoom: f64,
}

impl Default for MapView {
    fn default() -> Self {
        // Vancouver, BC
        Self {
            center: [49.2827, -123.1207],
            zoom: 10.0,
        }
    }
}

/// Persistence for the map view
///
/// Writes run on a detached task after the debounce delay, hence the `Send` bounds.
pub trait SettingsStore: Send + Sync + 'static {
    fn save_map_view(&self, view: MapView) -> impl Future<Output = Result<()>> + Send;
}
