//! Orchestration of multi-step user operations
//!
//! [`SyncController`] owns the whole application state and is the only way to mutate it.
//! Every operation that touches both the [`TreeModel`] and the [`LayerManager`] goes
//! through here so that checked state and map layers never drift apart.

use crate::color::HexColor;
use crate::debounce::Debouncer;
use crate::layers::{FitOutcome, LayerManager, MapWidget};
use crate::storage::{CollectionStore, MapView, SettingsStore};
use crate::tree::{FileNode, FolderNode, TreeModel};
use crate::{CoreError, Result, utils};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Quiet period after the last map move before the view is persisted
pub const MAP_VIEW_SAVE_DELAY: Duration = Duration::from_secs(1);

/// A message for the user
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    Success(String),
    Error(String),
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self::Success(message.into())
    }

    /// Error notice with filesystem paths masked
    pub fn error(message: impl fmt::Display) -> Self {
        Self::Error(utils::sanitize_message(&message.to_string()))
    }

    #[inline]
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Error(_))
    }

    #[inline]
    pub fn message(&self) -> &str {
        match self {
            Self::Success(message) | Self::Error(message) => message,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

/// Everything the application keeps in memory between operations
pub struct AppState<M: MapWidget> {
    tree: TreeModel,
    layers: LayerManager<M>,
    map_view: MapView,
    notices: Vec<Notice>,
}

impl<M: MapWidget> AppState<M> {
    pub fn new(map: M, map_view: MapView) -> Self {
        Self {
            tree: TreeModel::default(),
            layers: LayerManager::new(map),
            map_view,
            notices: Vec::new(),
        }
    }

    #[inline]
    pub fn tree(&self) -> &TreeModel {
        &self.tree
    }

    #[inline]
    pub fn layers(&self) -> &LayerManager<M> {
        &self.layers
    }

    #[inline]
    pub fn map_view(&self) -> MapView {
        self.map_view
    }

    /// Pending notices, oldest first
    #[inline]
    pub fn notices(&self) -> &[Notice] {
        &self.notices
    }
}

/// Owner of the application state and its collaborators
///
/// Constructed once at startup. Call [`SyncController::shutdown`] before dropping it so a
/// pending map view write is not lost.
pub struct SyncController<S: CollectionStore, P: SettingsStore, M: MapWidget> {
    state: AppState<M>,
    store: S,
    settings: Arc<P>,
    map_view_saver: Debouncer,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<S: CollectionStore, P: SettingsStore, M: MapWidget> SyncController<S, P, M> {
    pub fn new(store: S, settings: Arc<P>, map: M, map_view: MapView) -> Self {
        Self {
            state: AppState::new(map, map_view),
            store,
            settings,
            map_view_saver: Debouncer::new(MAP_VIEW_SAVE_DELAY),
        }
    }

    #[inline]
    pub fn state(&self) -> &AppState<M> {
        &self.state
    }

    #[inline]
    pub fn tree(&self) -> &TreeModel {
        &self.state.tree
    }

    #[inline]
    pub fn layers(&self) -> &LayerManager<M> {
        &self.state.layers
    }

    #[inline]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Drain the queued notices
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.state.notices)
    }

    fn notify(&mut self, notice: Notice) {
        match &notice {
            Notice::Success(message) => tracing::info!("{}", message),
            Notice::Error(message) => tracing::warn!("{}", message),
        }
        self.state.notices.push(notice);
    }

    /// Report `err` to the user and hand it back
    fn fail(&mut self, context: &str, err: CoreError) -> CoreError {
        self.notify(Notice::error(format_args!("{}: {}", context, err)));
        err
    }

    /// Reload the tree from storage
    ///
    /// On the very first load every file is shown. Later loads keep the checked state and
    /// take down layers of files that disappeared from storage.
    pub async fn load_file_tree(&mut self) -> Result<()> {
        let snapshot = match self.store.read_tree().await {
            Ok(snapshot) => snapshot,
            Err(e) => return Err(self.fail("Failed to load file tree", e)),
        };

        let to_show = self.state.tree.ingest(snapshot);

        let stale: Vec<String> = self
            .state
            .layers
            .visible_paths()
            .filter(|path| self.state.tree.find_file(path).is_none())
            .map(str::to_string)
            .collect();
        for path in &stale {
            tracing::debug!("Dropping layer of vanished track {}", path);
            self.state.layers.discard(path);
        }

        self.show_files(to_show).await;
        tracing::info!("{}", self.state.tree.track_count_label());
        Ok(())
    }

    /// Show files one after another, reporting each failure without stopping
    ///
    /// Returns the number of files that failed to load.
    async fn show_files(&mut self, files: Vec<FileNode>) -> usize {
        let mut failures = 0;
        for file in files {
            tracing::trace!("Showing {}", file.path);
            let shown = self
                .state
                .layers
                .show_track(&file, self.state.tree.roots(), &self.store)
                .await;
            if let Err(e) = shown {
                failures += 1;
                self.notify(Notice::error(e));
            }
        }
        failures
    }

    fn hide_files(&mut self, files: &[FileNode]) {
        for file in files {
            self.state.layers.hide_track(&file.path);
        }
    }

    /// Check or uncheck a folder, showing or hiding its whole subtree
    pub async fn toggle_folder(&mut self, key: &str, checked: bool) -> Result<()> {
        let files = self.state.tree.set_folder_checked(key, checked)?;
        if checked {
            self.show_files(files).await;
        } else {
            self.hide_files(&files);
        }
        Ok(())
    }

    /// Check or uncheck a single file
    pub async fn toggle_file(&mut self, path: &str, checked: bool) -> Result<()> {
        let file = self.state.tree.set_file_checked(path, checked)?;
        if checked {
            self.show_files(vec![file]).await;
        } else {
            self.state.layers.hide_track(&file.path);
        }
        Ok(())
    }

    /// Check everything and show every track that is not on the map yet
    pub async fn select_all(&mut self) {
        let files: Vec<FileNode> = self
            .state
            .tree
            .check_all()
            .into_iter()
            .filter(|file| !self.state.layers.is_visible(&file.path))
            .collect();
        let failures = self.show_files(files).await;
        tracing::info!("Selected all tracks ({} failed)", failures);
    }

    /// Uncheck everything and hide every visible track
    pub fn deselect_all(&mut self) {
        self.state.tree.uncheck_all();
        let hidden = self.state.layers.hide_all();
        tracing::info!("Deselected all tracks, hid {}", hidden);
    }

    /// Validate and persist a folder color, then redraw the affected tracks
    ///
    /// Visible tracks under the folder are rebuilt right away. Hidden ones lose their cached
    /// layer and pick up the color when next shown.
    pub async fn set_folder_color(&mut self, key: &str, color: &str) -> Result<()> {
        let color = match HexColor::parse(color) {
            Ok(color) => color,
            Err(e) => return Err(self.fail("Failed to update folder color", e)),
        };

        let Some(folder) = self.state.tree.find_folder(key) else {
            let err = CoreError::NotFound(format!("folder '{}'", key));
            return Err(self.fail("Failed to update folder color", err));
        };
        let storage_path = folder.key().to_string();

        if let Err(e) = self.store.set_folder_color(&storage_path, &color).await {
            return Err(self.fail("Failed to update folder color", e));
        }

        let files = self.state.tree.set_folder_color(key, color)?;
        for file in &files {
            if self.state.layers.is_visible(&file.path) {
                let rebuilt = self
                    .state
                    .layers
                    .force_rebuild(file, self.state.tree.roots(), &self.store)
                    .await;
                if let Err(e) = rebuilt {
                    self.notify(Notice::error(e));
                }
            } else {
                self.state.layers.discard(&file.path);
            }
        }

        self.notify(Notice::success("Folder color updated"));
        Ok(())
    }

    /// Delete a file or folder
    ///
    /// Checked state, selection and layers of the node and everything under it are cleaned
    /// up before storage is asked to delete it. The tree is reloaded afterwards either way.
    pub async fn delete_node(&mut self, key: &str) -> Result<()> {
        let node = self
            .state
            .tree
            .find(key)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;

        for file in self.state.tree.forget(&node) {
            self.state.layers.discard(&file.path);
        }

        let deleted = self.store.delete(&node).await;
        let reloaded = self.load_file_tree().await;

        match deleted {
            Ok(()) => {
                let kind = if node.is_folder() { "Folder" } else { "File" };
                self.notify(Notice::success(format!("{} \"{}\" deleted", kind, node.name())));
                reloaded
            }
            Err(e) => Err(self.fail("Failed to delete", e)),
        }
    }

    /// Create a folder in the selected folder, or at the root
    pub async fn create_folder(&mut self, name: &str) -> Result<FolderNode> {
        let name = name.trim();
        if let Err(e) = utils::validate_folder_name(name) {
            return Err(self.fail("Failed to create folder", e));
        }

        let parent = self.state.tree.target_folder().map(str::to_string);
        let folder = match self.store.create_folder(name, parent.as_deref()).await {
            Ok(folder) => folder,
            Err(e) => return Err(self.fail("Failed to create folder", e)),
        };

        self.load_file_tree().await?;
        self.notify(Notice::success(format!("Folder \"{}\" created", folder.name)));
        Ok(folder)
    }

    /// Copy GPX files into the selected folder (or the root) and show them
    ///
    /// Uploaded files and their destination are checked before the reload so they come
    /// back already checked and get drawn right away.
    pub async fn upload_files(&mut self, sources: &[PathBuf]) -> Result<Vec<FileNode>> {
        let dest = self.state.tree.target_folder().map(str::to_string);
        let uploaded = match self.store.copy_in_files(sources, dest.as_deref()).await {
            Ok(uploaded) => uploaded,
            Err(e) => return Err(self.fail("Failed to upload files", e)),
        };

        if uploaded.is_empty() {
            self.notify(Notice::error("No GPX files were uploaded"));
            return Ok(uploaded);
        }

        self.state
            .tree
            .precheck(uploaded.iter().map(|file| file.path.as_str()).chain(dest.as_deref()));
        self.load_file_tree().await?;

        let to_show: Vec<FileNode> = uploaded
            .iter()
            .filter(|file| {
                self.state.tree.is_checked(&file.path) && !self.state.layers.is_visible(&file.path)
            })
            .filter_map(|file| self.state.tree.find_file(&file.path).cloned())
            .collect();
        self.show_files(to_show).await;

        self.notify(Notice::success(format!(
            "Uploaded {} file{}",
            uploaded.len(),
            if uploaded.len() == 1 { "" } else { "s" }
        )));
        Ok(uploaded)
    }

    /// Fit the map to the visible tracks
    pub fn fit_all_tracks(&mut self) -> FitOutcome {
        let outcome = self.state.layers.fit_all_tracks();
        match outcome {
            FitOutcome::NoVisibleTracks => self.notify(Notice::error("No tracks visible to fit")),
            FitOutcome::NothingToFit => self.notify(Notice::error("No valid track bounds found")),
            FitOutcome::Fitted(_) => {}
        }
        outcome
    }

    /// Record the new map view and schedule a debounced settings write
    pub fn on_map_moved(&mut self, center: [f64; 2], zoom: f64) {
        let view = MapView { center, zoom };
        self.state.map_view = view;

        let settings = Arc::clone(&self.settings);
        self.map_view_saver.schedule(async move {
            match settings.save_map_view(view).await {
                Ok(()) => tracing::debug!("Saved map view {:?}", view),
                Err(e) => tracing::error!("Failed to save map position: {}", e),
            }
        });
    }

    pub fn select(&mut self, key: &str) -> Result<()> {
        self.state.tree.select(key)
    }

    /// Select a node, or clear the selection when it is already selected
    pub fn toggle_selection(&mut self, key: &str) -> Result<()> {
        self.state.tree.toggle_selection(key).map(|_| ())
    }

    pub fn clear_selection(&mut self) {
        self.state.tree.clear_selection();
    }

    pub fn toggle_expanded(&mut self, key: &str) -> bool {
        self.state.tree.toggle_expanded(key)
    }

    #[inline]
    pub fn track_count(&self) -> usize {
        self.state.tree.track_count()
    }

    /// Wait for a pending map view write
    pub async fn settle(&mut self) {
        self.map_view_saver.settle().await;
    }

    /// Flush pending writes and give back the final state
    pub async fn shutdown(mut self) -> AppState<M> {
        self.settle().await;
        tracing::debug!("Controller shut down");
        self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::tests::{RecordingMap, gpx_line};
    use crate::storage::{DirectoryReader, FileReader, StorageMutator};
    use crate::tree::FileTreeNode;
    use std::cell::RefCell;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Default)]
    struct MemoryStore {
        tree: RefCell<Vec<FileTreeNode>>,
        files: RefCell<HashMap<String, String>>,
        reads: RefCell<Vec<String>>,
        deleted: RefCell<Vec<String>>,
        colors: RefCell<Vec<(String, String)>>,
        folders: RefCell<Vec<String>>,
    }

    impl MemoryStore {
        fn read_count(&self, path: &str) -> usize {
            self.reads.borrow().iter().filter(|p| *p == path).count()
        }

        fn add_file(&self, parent: Option<&str>, name: &str, content: &str) -> FileNode {
            let file = FileNode::new(name, utils::join_path(parent, name));
            self.files
                .borrow_mut()
                .insert(file.path.clone(), content.to_string());
            insert_child(&mut self.tree.borrow_mut(), parent, FileTreeNode::File(file.clone()));
            file
        }

        fn remove(&self, key: &str) {
            remove_node(&mut self.tree.borrow_mut(), key);
        }
    }

    fn insert_child(nodes: &mut Vec<FileTreeNode>, parent: Option<&str>, child: FileTreeNode) {
        let Some(parent) = parent else {
            nodes.push(child);
            return;
        };
        for node in nodes.iter_mut() {
            if let FileTreeNode::Folder(folder) = node {
                if folder.key() == parent {
                    folder.children.push(child);
                    return;
                }
                if parent.starts_with(&format!("{}/", folder.key())) {
                    insert_child(&mut folder.children, Some(parent), child);
                    return;
                }
            }
        }
    }

    fn remove_node(nodes: &mut Vec<FileTreeNode>, key: &str) {
        nodes.retain(|node| node.key() != key);
        for node in nodes.iter_mut() {
            if let FileTreeNode::Folder(folder) = node {
                remove_node(&mut folder.children, key);
            }
        }
    }

    impl DirectoryReader for MemoryStore {
        async fn read_tree(&self) -> Result<Vec<FileTreeNode>> {
            Ok(self.tree.borrow().clone())
        }
    }

    impl FileReader for MemoryStore {
        async fn read_text(&self, path: &str) -> Result<String> {
            self.reads.borrow_mut().push(path.to_string());
            self.files
                .borrow()
                .get(path)
                .cloned()
                .ok_or_else(|| CoreError::NotFound(path.to_string()))
        }
    }

    impl StorageMutator for MemoryStore {
        async fn delete(&self, node: &FileTreeNode) -> Result<()> {
            self.deleted.borrow_mut().push(node.key().to_string());
            self.remove(node.key());
            Ok(())
        }

        async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<FolderNode> {
            let folder = FolderNode::new(
                name,
                utils::join_path(parent, name),
                HexColor::default(),
                Vec::new(),
            );
            self.folders.borrow_mut().push(folder.path.clone());
            insert_child(
                &mut self.tree.borrow_mut(),
                parent,
                FileTreeNode::Folder(folder.clone()),
            );
            Ok(folder)
        }

        async fn set_folder_color(&self, path: &str, color: &HexColor) -> Result<()> {
            self.colors
                .borrow_mut()
                .push((path.to_string(), color.to_string()));
            Ok(())
        }

        async fn copy_in_files(
            &self,
            sources: &[PathBuf],
            dest: Option<&str>,
        ) -> Result<Vec<FileNode>> {
            Ok(sources
                .iter()
                .filter_map(|source| source.file_name()?.to_str())
                .map(|name| self.add_file(dest, name, &gpx_line(48.0, -121.0)))
                .collect())
        }
    }

    #[derive(Default)]
    struct MemorySettings {
        saves: Mutex<Vec<MapView>>,
    }

    impl SettingsStore for MemorySettings {
        async fn save_map_view(&self, view: MapView) -> Result<()> {
            if let Ok(mut saves) = self.saves.lock() {
                saves.push(view);
            }
            Ok(())
        }
    }

    type TestController = SyncController<MemoryStore, MemorySettings, RecordingMap>;

    fn trips_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.tree.borrow_mut().push(FileTreeNode::Folder(FolderNode::new(
            "Trips",
            "Trips",
            HexColor::parse("#112233").unwrap(),
            Vec::new(),
        )));
        store.add_file(Some("Trips"), "a.gpx", &gpx_line(49.0, -123.0));
        store
    }

    fn controller(store: MemoryStore) -> TestController {
        SyncController::new(
            store,
            Arc::new(MemorySettings::default()),
            RecordingMap::default(),
            MapView::default(),
        )
    }

    #[tokio::test]
    async fn test_initial_load_shows_everything() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();

        assert!(controller.tree().is_checked("Trips"));
        assert!(controller.tree().is_checked("Trips/a.gpx"));
        assert!(controller.layers().is_visible("Trips/a.gpx"));
        assert_eq!(
            controller.layers().map().attached["Trips/a.gpx"].color().as_str(),
            "#112233"
        );
        assert_eq!(controller.track_count(), 1);
    }

    #[tokio::test]
    async fn test_folder_toggle_reuses_cached_layer() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();

        controller.toggle_folder("Trips", false).await.unwrap();
        assert!(!controller.layers().is_visible("Trips/a.gpx"));
        assert!(!controller.tree().is_checked("Trips/a.gpx"));
        assert_eq!(controller.layers().map().removes, vec!["Trips/a.gpx"]);

        controller.toggle_folder("Trips", true).await.unwrap();
        assert!(controller.layers().is_visible("Trips/a.gpx"));
        assert!(controller.tree().is_checked("Trips/a.gpx"));
        assert_eq!(controller.store().read_count("Trips/a.gpx"), 1);
    }

    #[tokio::test]
    async fn test_toggle_file() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();

        controller.toggle_file("Trips/a.gpx", false).await.unwrap();
        assert!(!controller.layers().is_visible("Trips/a.gpx"));
        assert!(controller.tree().is_checked("Trips"));

        controller.toggle_file("Trips/a.gpx", true).await.unwrap();
        assert!(controller.layers().is_visible("Trips/a.gpx"));
        assert!(controller.toggle_file("Trips/zzz.gpx", true).await.is_err());
    }

    #[tokio::test]
    async fn test_deselect_all_hides_tracks_missing_from_tree() {
        let store = trips_store();
        store.add_file(None, "b.gpx", &gpx_line(50.0, -122.0));
        store.add_file(None, "c.gpx", &gpx_line(51.0, -121.0));
        let mut controller = controller(store);
        controller.load_file_tree().await.unwrap();
        assert_eq!(controller.layers().visible_count(), 3);

        // c.gpx disappears from the tree while its layer is still visible
        controller.store().remove("c.gpx");
        let snapshot = controller.store().tree.borrow().clone();
        controller.state.tree.ingest(snapshot);
        assert!(controller.layers().is_visible("c.gpx"));

        controller.deselect_all();
        assert_eq!(controller.layers().visible_count(), 0);
        assert_eq!(controller.layers().map().removes.len(), 3);
        assert!(controller.layers().map().attached.is_empty());
        assert!(controller.tree().checked().is_empty());
    }

    #[tokio::test]
    async fn test_select_all_only_shows_hidden_tracks() {
        let store = trips_store();
        store.add_file(None, "b.gpx", &gpx_line(50.0, -122.0));
        let mut controller = controller(store);
        controller.load_file_tree().await.unwrap();

        controller.toggle_file("b.gpx", false).await.unwrap();
        let adds_before = controller.layers().map().adds.len();

        controller.select_all().await;
        assert_eq!(controller.layers().visible_count(), 2);
        assert_eq!(controller.layers().map().adds.len(), adds_before + 1);
        assert_eq!(controller.tree().checked().len(), 3);
    }

    #[tokio::test]
    async fn test_recolor_rejects_invalid_colors() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();

        for bad in ["red", "#12345"] {
            let err = controller.set_folder_color("Trips", bad).await.unwrap_err();
            assert!(matches!(err, CoreError::Validation(_)));
        }
        assert!(controller.store().colors.borrow().is_empty());
        assert_eq!(
            controller.tree().find_folder("Trips").unwrap().color.as_str(),
            "#112233"
        );
        assert_eq!(controller.take_notices().len(), 2);

        controller.set_folder_color("Trips", "#AABBCC").await.unwrap();
        assert_eq!(
            controller.store().colors.borrow().as_slice(),
            &[("Trips".to_string(), "#AABBCC".to_string())]
        );
        assert_eq!(
            controller.layers().map().attached["Trips/a.gpx"].color().as_str(),
            "#AABBCC"
        );
        assert_eq!(controller.store().read_count("Trips/a.gpx"), 2);
        assert_eq!(
            controller.take_notices(),
            vec![Notice::success("Folder color updated")]
        );
    }

    #[tokio::test]
    async fn test_recolor_hidden_track_is_lazy() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();
        controller.toggle_file("Trips/a.gpx", false).await.unwrap();

        controller.set_folder_color("Trips", "#AABBCC").await.unwrap();
        assert!(!controller.layers().is_visible("Trips/a.gpx"));
        assert!(!controller.layers().cache().contains("Trips/a.gpx"));
        assert_eq!(controller.store().read_count("Trips/a.gpx"), 1);

        controller.toggle_file("Trips/a.gpx", true).await.unwrap();
        assert_eq!(
            controller.layers().map().attached["Trips/a.gpx"].color().as_str(),
            "#AABBCC"
        );
    }

    #[tokio::test]
    async fn test_delete_folder_cleans_up_first() {
        let store = trips_store();
        store.add_file(None, "b.gpx", &gpx_line(50.0, -122.0));
        let mut controller = controller(store);
        controller.load_file_tree().await.unwrap();
        controller.select("Trips/a.gpx").unwrap();

        controller.delete_node("Trips").await.unwrap();

        assert_eq!(controller.store().deleted.borrow().as_slice(), &["Trips".to_string()]);
        assert!(!controller.layers().is_visible("Trips/a.gpx"));
        assert!(!controller.layers().cache().contains("Trips/a.gpx"));
        assert!(!controller.tree().is_checked("Trips"));
        assert!(controller.tree().selection().is_none());
        assert!(controller.tree().find("Trips").is_none());
        assert!(controller.layers().is_visible("b.gpx"));
        assert!(matches!(
            controller.delete_node("Trips").await,
            Err(CoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_create_folder_in_selected_folder() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();

        let err = controller.create_folder("a/b").await.unwrap_err();
        assert!(matches!(err, CoreError::Validation(_)));
        assert!(controller.store().folders.borrow().is_empty());

        controller.toggle_selection("Trips").unwrap();
        let folder = controller.create_folder(" Alps ").await.unwrap();
        assert_eq!(folder.path, "Trips/Alps");
        assert!(controller.tree().find_folder("Trips/Alps").is_some());
        // Only the very first load checks everything
        assert!(!controller.tree().is_checked("Trips/Alps"));
    }

    #[tokio::test]
    async fn test_upload_auto_shows_new_tracks() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();
        controller.toggle_folder("Trips", false).await.unwrap();
        controller.select("Trips").unwrap();

        let uploaded = controller
            .upload_files(&[PathBuf::from("/tmp/new.gpx")])
            .await
            .unwrap();

        assert_eq!(uploaded, vec![FileNode::new("new.gpx", "Trips/new.gpx")]);
        assert!(controller.tree().is_checked("Trips"));
        assert!(controller.tree().is_checked("Trips/new.gpx"));
        assert!(controller.layers().is_visible("Trips/new.gpx"));
        assert!(!controller.layers().is_visible("Trips/a.gpx"));
        assert_eq!(
            controller.take_notices(),
            vec![Notice::success("Uploaded 1 file")]
        );
    }

    #[tokio::test]
    async fn test_broken_track_does_not_stop_bulk_show() {
        let store = trips_store();
        store.add_file(None, "broken.gpx", "<gpx><trk></trk></gpx>");
        store.add_file(None, "z.gpx", &gpx_line(50.0, -122.0));
        let mut controller = controller(store);
        controller.load_file_tree().await.unwrap();

        assert!(controller.layers().is_visible("Trips/a.gpx"));
        assert!(controller.layers().is_visible("z.gpx"));
        assert!(!controller.layers().is_visible("broken.gpx"));
        assert!(controller.tree().is_checked("broken.gpx"));

        let notices = controller.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(notices[0].is_error());
        assert!(notices[0].message().contains("broken.gpx"));
    }

    #[tokio::test]
    async fn test_fit_reports_empty_map() {
        let mut controller = controller(trips_store());
        assert_eq!(controller.fit_all_tracks(), FitOutcome::NoVisibleTracks);
        assert_eq!(
            controller.take_notices(),
            vec![Notice::error("No tracks visible to fit")]
        );

        controller.load_file_tree().await.unwrap();
        assert!(matches!(controller.fit_all_tracks(), FitOutcome::Fitted(_)));
        assert_eq!(controller.layers().map().fits.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_map_moves_are_debounced() {
        let settings = Arc::new(MemorySettings::default());
        let mut controller = SyncController::new(
            trips_store(),
            Arc::clone(&settings),
            RecordingMap::default(),
            MapView::default(),
        );

        controller.on_map_moved([49.0, -123.0], 11.0);
        tokio::time::sleep(Duration::from_millis(300)).await;
        controller.on_map_moved([49.5, -123.5], 12.0);
        assert!(settings.saves.lock().unwrap().is_empty());

        let state = controller.shutdown().await;
        let saves = settings.saves.lock().unwrap();
        assert_eq!(
            saves.as_slice(),
            &[MapView {
                center: [49.5, -123.5],
                zoom: 12.0
            }]
        );
        assert_eq!(state.map_view().zoom, 12.0);
    }

    #[test]
    fn test_error_notice_masks_paths() {
        let notice = Notice::error("Failed to read /home/user/gpx/a.gpx");
        assert_eq!(notice, Notice::Error("Failed to read [path]".to_string()));
    }

    #[tokio::test]
    async fn test_folder_toggle_shows_in_document_order() {
        let store = MemoryStore::default();
        store.tree.borrow_mut().push(FileTreeNode::Folder(FolderNode::new(
            "Trips",
            "Trips",
            HexColor::default(),
            Vec::new(),
        )));
        store.add_file(Some("Trips"), "z.gpx", &gpx_line(49.0, -123.0));
        insert_child(
            &mut store.tree.borrow_mut(),
            Some("Trips"),
            FileTreeNode::Folder(FolderNode::new(
                "Alps",
                "Trips/Alps",
                HexColor::default(),
                Vec::new(),
            )),
        );
        store.add_file(Some("Trips/Alps"), "c.gpx", &gpx_line(46.0, 8.0));
        store.add_file(Some("Trips/Alps"), "b.gpx", &gpx_line(46.5, 8.5));
        store.add_file(Some("Trips"), "a.gpx", &gpx_line(48.0, -121.0));

        let mut controller = controller(store);
        controller.load_file_tree().await.unwrap();
        controller.toggle_folder("Trips", false).await.unwrap();
        let before = controller.layers().map().adds.len();

        controller.toggle_folder("Trips", true).await.unwrap();
        assert_eq!(
            &controller.layers().map().adds[before..],
            ["Trips/z.gpx", "Trips/Alps/c.gpx", "Trips/Alps/b.gpx", "Trips/a.gpx"]
        );
    }

    #[tokio::test]
    async fn test_empty_upload_skips_reload() {
        let mut controller = controller(trips_store());
        controller.load_file_tree().await.unwrap();
        controller.take_notices();

        // Appears in storage but must not reach the tree without a reload
        controller.store().add_file(None, "late.gpx", &gpx_line(47.0, 9.0));

        let uploaded = controller.upload_files(&[]).await.unwrap();
        assert!(uploaded.is_empty());
        assert!(controller.tree().find_file("late.gpx").is_none());
        assert!(!controller.layers().is_visible("late.gpx"));
        assert_eq!(
            controller.take_notices(),
            vec![Notice::error("No GPX files were uploaded")]
        );
    }
}
