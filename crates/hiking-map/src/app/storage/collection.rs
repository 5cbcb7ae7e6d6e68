//! GPX collection stored as a directory tree
//!
//! Every folder may carry a `.hiking-map` JSON sidecar holding its color. All paths handed
//! in by the core are slash-joined and relative to the root; anything that would resolve
//! outside of it is rejected.

use hiking_map_lib::utils::{join_path, validate_folder_name};
use hiking_map_lib::{
    CoreError, DEFAULT_FOLDER_COLOR, DirectoryReader, FileNode, FileReader, FileTreeNode,
    FolderNode, HexColor, MAX_GPX_BYTES, Result, StorageMutator,
};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::{Component, Path, PathBuf};

/// Per-folder sidecar file name
pub const FOLDER_CONFIG_FILE: &str = ".hiking-map";

/// Contents of a folder sidecar
///
/// Unknown keys are kept so rewriting the color does not drop them.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FolderConfig {
    #[serde(default = "default_color")]
    pub color: String,

    #[serde(flatten)]
    pub extra: serde_json::Map<String, serde_json::Value>,
}

fn default_color() -> String {
    DEFAULT_FOLDER_COLOR.to_string()
}

impl Default for FolderConfig {
    fn default() -> Self {
        Self {
            color: default_color(),
            extra: serde_json::Map::new(),
        }
    }
}

impl FolderConfig {
    fn parse(text: &str, dir: &Path) -> Self {
        serde_json::from_str(text).unwrap_or_else(|e| {
            tracing::warn!("Error loading folder config in {}: {}", dir.display(), e);
            Self::default()
        })
    }

    /// Read the sidecar of `dir`, falling back to the defaults
    fn load_blocking(dir: &Path) -> Self {
        match std::fs::read_to_string(dir.join(FOLDER_CONFIG_FILE)) {
            Ok(text) => Self::parse(&text, dir),
            Err(_) => Self::default(),
        }
    }

    async fn load(dir: &Path) -> Self {
        match tokio::fs::read_to_string(dir.join(FOLDER_CONFIG_FILE)).await {
            Ok(text) => Self::parse(&text, dir),
            Err(_) => Self::default(),
        }
    }

    /// The configured color, or the default when it is not a valid hex color
    pub fn hex_color(&self) -> HexColor {
        HexColor::parse(&self.color).unwrap_or_default()
    }
}

fn is_gpx_name(name: &str) -> bool {
    name.to_ascii_lowercase().ends_with(".gpx")
}

/// Collection rooted at a directory on disk
#[derive(Debug, Clone)]
pub struct FsCollection {
    root: PathBuf,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl FsCollection {
    /// Open the collection, creating the root directory if needed
    pub async fn open(root: PathBuf) -> Result<Self> {
        tokio::fs::create_dir_all(&root).await?;
        tracing::info!("GPX directory path: {}", root.display());
        Ok(Self { root })
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a collection path onto the filesystem
    ///
    /// The empty path is the root itself. Absolute paths and `..` are rejected.
    pub fn resolve(&self, relative: &str) -> Result<PathBuf> {
        let mut resolved = self.root.clone();
        for component in Path::new(relative).components() {
            match component {
                Component::Normal(part) => resolved.push(part),
                Component::CurDir => {}
                Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                    return Err(CoreError::Validation(format!("Invalid path '{}'", relative)));
                }
            }
        }
        Ok(resolved)
    }
}

/// Snapshot of `dir`, children sorted by name, hidden entries skipped
fn read_dir_blocking(dir: &Path, relative: Option<&str>) -> io::Result<Vec<FileTreeNode>> {
    let mut entries = std::fs::read_dir(dir)?.collect::<io::Result<Vec<_>>>()?;
    entries.sort_by_key(|entry| entry.file_name());

    let mut nodes = Vec::with_capacity(entries.len());
    for entry in entries {
        let Ok(name) = entry.file_name().into_string() else {
            tracing::warn!("Skipping non UTF-8 entry in {}", dir.display());
            continue;
        };
        if name.starts_with('.') {
            continue;
        }

        let path = join_path(relative, &name);
        let file_type = entry.file_type()?;
        if file_type.is_dir() {
            let full = entry.path();
            let color = FolderConfig::load_blocking(&full).hex_color();
            let children = read_dir_blocking(&full, Some(&path))?;
            nodes.push(FileTreeNode::Folder(FolderNode::new(name, path, color, children)));
        } else if file_type.is_file() && is_gpx_name(&name) {
            nodes.push(FileTreeNode::File(FileNode::new(name, path)));
        }
    }
    Ok(nodes)
}

impl DirectoryReader for FsCollection {
    async fn read_tree(&self) -> Result<Vec<FileTreeNode>> {
        let root = self.root.clone();
        let nodes = tokio::task::spawn_blocking(move || read_dir_blocking(&root, None))
            .await
            .map_err(|e| CoreError::Io(io::Error::other(e)))??;
        tracing::debug!("Read {} root item(s) from {}", nodes.len(), self.root().display());
        Ok(nodes)
    }
}

impl FileReader for FsCollection {
    async fn read_text(&self, path: &str) -> Result<String> {
        let full = self.resolve(path)?;
        match tokio::fs::read(&full).await {
            Ok(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(CoreError::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

impl StorageMutator for FsCollection {
    async fn delete(&self, node: &FileTreeNode) -> Result<()> {
        let full = self.resolve(node.key())?;
        if full == self.root {
            return Err(CoreError::Validation(
                "Cannot delete the collection root".to_string(),
            ));
        }

        match node {
            FileTreeNode::Folder(_) => tokio::fs::remove_dir_all(&full).await?,
            FileTreeNode::File(_) => tokio::fs::remove_file(&full).await?,
        }
        tracing::info!("Deleted {}", node.key());
        Ok(())
    }

    async fn create_folder(&self, name: &str, parent: Option<&str>) -> Result<FolderNode> {
        validate_folder_name(name)?;
        let parent_dir = self.resolve(parent.unwrap_or_default())?;
        if parent.is_some() && !tokio::fs::metadata(&parent_dir).await?.is_dir() {
            return Err(CoreError::Validation(
                "Invalid parent folder path.".to_string(),
            ));
        }

        tokio::fs::create_dir_all(parent_dir.join(name)).await?;
        let path = join_path(parent, name);
        tracing::info!("Created folder {}", path);
        Ok(FolderNode::new(name, path, HexColor::default(), Vec::new()))
    }

    async fn set_folder_color(&self, path: &str, color: &HexColor) -> Result<()> {
        let dir = self.resolve(path)?;
        if dir == self.root || !tokio::fs::metadata(&dir).await?.is_dir() {
            return Err(CoreError::Validation("Invalid folder path.".to_string()));
        }

        let mut config = FolderConfig::load(&dir).await;
        config.color = color.to_string();
        let json =
            serde_json::to_string_pretty(&config).map_err(|e| CoreError::Json(e.to_string()))?;
        tokio::fs::write(dir.join(FOLDER_CONFIG_FILE), json).await?;

        tracing::info!("Set color for folder {}: {}", path, color);
        Ok(())
    }

    async fn copy_in_files(&self, sources: &[PathBuf], dest: Option<&str>) -> Result<Vec<FileNode>> {
        let dest_dir = self.resolve(dest.unwrap_or_default())?;
        tokio::fs::create_dir_all(&dest_dir).await?;

        let mut uploaded = Vec::new();
        for source in sources {
            let Some(name) = source.file_name().and_then(|name| name.to_str()) else {
                tracing::warn!("Skipping unnamed source {}", source.display());
                continue;
            };
            if !is_gpx_name(name) {
                tracing::warn!("Skipping invalid file type: {}", name);
                continue;
            }

            match tokio::fs::metadata(source).await {
                Ok(meta) if meta.len() > MAX_GPX_BYTES as u64 => {
                    tracing::warn!("Skipping file too large: {}", name);
                    continue;
                }
                Ok(_) => {}
                Err(e) => {
                    tracing::warn!("Error checking file stats for {}: {}", name, e);
                    continue;
                }
            }

            match tokio::fs::copy(source, dest_dir.join(name)).await {
                Ok(_) => {
                    tracing::debug!("Copied {} into {}", name, dest.unwrap_or("/"));
                    uploaded.push(FileNode::new(name, join_path(dest, name)));
                }
                Err(e) => tracing::error!("Error copying file {}: {}", name, e),
            }
        }

        Ok(uploaded)
    }
}
