//! Folder/file hierarchy and visibility bookkeeping
//!
//! [`TreeModel`] holds the latest snapshot of the collection together with the
//! [`CheckedSet`], the current [`Selection`] and the set of expanded folders. It is pure
//! in-memory state: showing and hiding layers is driven by the caller from the file lists
//! these operations return, in document order.

use crate::color::HexColor;
use crate::{CoreError, Result};
use std::collections::HashSet;

/// A node of the collection tree
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(tag = "type", rename_all = "lowercase"))]
pub enum FileTreeNode {
    Folder(FolderNode),
    File(FileNode),
}

/// A folder with its configured color and ordered children
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FolderNode {
    pub name: String,
    /// Slash-joined path relative to the collection root
    ///
    /// Must always be populated. When empty, [`FolderNode::key`] falls back to `name`,
    /// which only identifies root-level folders correctly.
    pub path: String,
    pub color: HexColor,
    pub children: Vec<FileTreeNode>,
}

/// A GPX file
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct FileNode {
    pub name: String,
    /// Slash-joined path relative to the collection root, unique in the tree
    pub path: String,
}

impl FolderNode {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<String>,
        color: HexColor,
        children: Vec<FileTreeNode>,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            color,
            children,
        }
    }

    /// Identity of the folder in the [`CheckedSet`] and [`Selection`]
    #[inline]
    pub fn key(&self) -> &str {
        if self.path.is_empty() {
            &self.name
        } else {
            &self.path
        }
    }

    /// Every file below this folder, transitively, in document order
    pub fn files(&self) -> Vec<FileNode> {
        let mut files = Vec::new();
        walk(&self.children, &mut |node| {
            if let FileTreeNode::File(file) = node {
                files.push(file.clone());
            }
        });
        files
    }

    /// Whether `key` names this folder or something below it
    fn contains_key(&self, key: &str) -> bool {
        key == self.key()
            || key
                .strip_prefix(self.key())
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl FileNode {
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
        }
    }
}

impl FileTreeNode {
    /// Folder key or file path
    #[inline]
    pub fn key(&self) -> &str {
        match self {
            Self::Folder(folder) => folder.key(),
            Self::File(file) => &file.path,
        }
    }

    #[inline]
    pub fn name(&self) -> &str {
        match self {
            Self::Folder(folder) => &folder.name,
            Self::File(file) => &file.name,
        }
    }

    #[inline]
    pub fn is_folder(&self) -> bool {
        matches!(self, Self::Folder(_))
    }
}

/// Visit every node in pre-order (document order)
pub fn walk<'a>(nodes: &'a [FileTreeNode], visit: &mut impl FnMut(&'a FileTreeNode)) {
    for node in nodes {
        visit(node);
        if let FileTreeNode::Folder(folder) = node {
            walk(&folder.children, visit);
        }
    }
}

/// Find a folder by key or a file by path
pub fn find_node<'a>(nodes: &'a [FileTreeNode], key: &str) -> Option<&'a FileTreeNode> {
    for node in nodes {
        if node.key() == key {
            return Some(node);
        }
        if let FileTreeNode::Folder(folder) = node
            && let Some(found) = find_node(&folder.children, key)
        {
            return Some(found);
        }
    }
    None
}

fn find_folder_mut<'a>(nodes: &'a mut [FileTreeNode], key: &str) -> Option<&'a mut FolderNode> {
    for node in nodes.iter_mut() {
        if let FileTreeNode::Folder(folder) = node {
            if folder.key() == key {
                return Some(folder);
            }
            if let Some(found) = find_folder_mut(&mut folder.children, key) {
                return Some(found);
            }
        }
    }
    None
}

/// Keys of the items the user intends to be visible
///
/// A file's membership is independent of its ancestors'. Folder toggles write through to
/// every descendant at the moment of the toggle.
#[derive(Clone, Debug, Default)]
pub struct CheckedSet {
    keys: HashSet<String>,
}

impl CheckedSet {
    #[inline]
    pub fn contains(&self, key: &str) -> bool {
        self.keys.contains(key)
    }

    pub fn insert(&mut self, key: impl Into<String>) -> bool {
        self.keys.insert(key.into())
    }

    pub fn remove(&mut self, key: &str) -> bool {
        self.keys.remove(key)
    }

    /// Insert or remove `key` depending on `checked`
    pub fn set(&mut self, key: &str, checked: bool) {
        if checked {
            self.keys.insert(key.to_string());
        } else {
            self.keys.remove(key);
        }
    }

    pub fn clear(&mut self) {
        self.keys.clear();
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(String::as_str)
    }

    fn retain(&mut self, keep: impl Fn(&str) -> bool) {
        self.keys.retain(|key| keep(key.as_str()));
    }
}

/// The single selected node, identified by key
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Selection {
    Folder(String),
    File(String),
}

impl Selection {
    pub fn of(node: &FileTreeNode) -> Self {
        match node {
            FileTreeNode::Folder(folder) => Self::Folder(folder.key().to_string()),
            FileTreeNode::File(file) => Self::File(file.path.clone()),
        }
    }

    #[inline]
    pub fn key(&self) -> &str {
        match self {
            Self::Folder(key) | Self::File(key) => key,
        }
    }

    /// Compare against a node of the same kind by key
    pub fn matches(&self, node: &FileTreeNode) -> bool {
        match (self, node) {
            (Self::Folder(key), FileTreeNode::Folder(folder)) => key == folder.key(),
            (Self::File(path), FileTreeNode::File(file)) => path == &file.path,
            _ => false,
        }
    }

    /// Folder that uploads and new folders go into
    pub fn target_folder(&self) -> Option<&str> {
        match self {
            Self::Folder(key) => Some(key),
            Self::File(_) => None,
        }
    }

    /// Status line describing where uploads will go
    pub fn describe(selection: Option<&Self>) -> String {
        match selection {
            Some(Self::Folder(key)) => format!("Selected: \"{}\" - uploads will go here", key),
            Some(Self::File(path)) => {
                let name = path.rsplit('/').next().unwrap_or(path);
                format!("Selected: \"{}\" (file)", crate::utils::track_display_name(name))
            }
            None => "No folder selected - uploads to root".to_string(),
        }
    }
}

/// In-memory collection tree with checked, selected and expanded state
#[derive(Debug, Default)]
pub struct TreeModel {
    roots: Vec<FileTreeNode>,
    checked: CheckedSet,
    selection: Option<Selection>,
    expanded: HashSet<String>,
    seeded: bool,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl TreeModel {
    /// Root-level nodes of the current snapshot
    #[inline]
    pub fn roots(&self) -> &[FileTreeNode] {
        &self.roots
    }

    #[inline]
    pub fn checked(&self) -> &CheckedSet {
        &self.checked
    }

    #[inline]
    pub fn is_checked(&self, key: &str) -> bool {
        self.checked.contains(key)
    }

    /// Mark keys as checked ahead of a reload that will introduce them
    pub fn precheck<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        for key in keys {
            self.checked.insert(key);
        }
    }

    /// Replace the tree with a fresh snapshot
    ///
    /// The first ingest of the model's lifetime checks every node and returns every file
    /// so the caller can show it. Later ingests keep checked, selected and expanded state,
    /// dropping keys the new snapshot no longer contains, and return nothing.
    pub fn ingest(&mut self, snapshot: Vec<FileTreeNode>) -> Vec<FileNode> {
        self.roots = snapshot;

        let mut present = HashSet::new();
        walk(&self.roots, &mut |node| {
            present.insert(node.key().to_string());
        });

        if !self.seeded {
            self.seeded = true;
            let mut files = Vec::new();
            walk(&self.roots, &mut |node| {
                self.checked.insert(node.key());
                if let FileTreeNode::File(file) = node {
                    files.push(file.clone());
                }
            });
            tracing::debug!(
                "Initial load: checked {} item(s), {} file(s) to show",
                self.checked.len(),
                files.len()
            );
            return files;
        }

        self.checked.retain(|key| present.contains(key));
        self.expanded.retain(|key| present.contains(key));
        if self
            .selection
            .as_ref()
            .is_some_and(|selection| !present.contains(selection.key()))
        {
            self.selection = None;
        }
        Vec::new()
    }

    /// Find a folder by key or a file by path
    pub fn find(&self, key: &str) -> Option<&FileTreeNode> {
        find_node(&self.roots, key)
    }

    pub fn find_folder(&self, key: &str) -> Option<&FolderNode> {
        match self.find(key)? {
            FileTreeNode::Folder(folder) => Some(folder),
            FileTreeNode::File(_) => None,
        }
    }

    pub fn find_file(&self, path: &str) -> Option<&FileNode> {
        match self.find(path)? {
            FileTreeNode::File(file) => Some(file),
            FileTreeNode::Folder(_) => None,
        }
    }

    /// Check or uncheck a folder and its whole subtree
    ///
    /// Returns every descendant file in document order; the caller shows or hides them.
    pub fn set_folder_checked(&mut self, key: &str, checked: bool) -> Result<Vec<FileNode>> {
        let folder = find_node(&self.roots, key)
            .and_then(|node| match node {
                FileTreeNode::Folder(folder) => Some(folder),
                FileTreeNode::File(_) => None,
            })
            .ok_or_else(|| CoreError::NotFound(format!("folder '{}'", key)))?;

        self.checked.set(folder.key(), checked);
        let mut files = Vec::new();
        walk(&folder.children, &mut |node| {
            self.checked.set(node.key(), checked);
            if let FileTreeNode::File(file) = node {
                files.push(file.clone());
            }
        });

        tracing::debug!(
            "Folder '{}' {} with {} file(s)",
            key,
            if checked { "checked" } else { "unchecked" },
            files.len()
        );
        Ok(files)
    }

    /// Check or uncheck a single file
    pub fn set_file_checked(&mut self, path: &str, checked: bool) -> Result<FileNode> {
        let file = find_node(&self.roots, path)
            .and_then(|node| match node {
                FileTreeNode::File(file) => Some(file.clone()),
                FileTreeNode::Folder(_) => None,
            })
            .ok_or_else(|| CoreError::NotFound(format!("file '{}'", path)))?;

        self.checked.set(&file.path, checked);
        Ok(file)
    }

    /// Check every node and return every file in document order
    pub fn check_all(&mut self) -> Vec<FileNode> {
        let mut files = Vec::new();
        walk(&self.roots, &mut |node| {
            self.checked.insert(node.key());
            if let FileTreeNode::File(file) = node {
                files.push(file.clone());
            }
        });
        files
    }

    pub fn uncheck_all(&mut self) {
        self.checked.clear();
    }

    /// Recolor a folder in memory
    ///
    /// Returns every file transitively under the folder so their layers can be refreshed.
    pub fn set_folder_color(&mut self, key: &str, color: HexColor) -> Result<Vec<FileNode>> {
        let folder = find_folder_mut(&mut self.roots, key)
            .ok_or_else(|| CoreError::NotFound(format!("folder '{}'", key)))?;
        folder.color = color;
        Ok(folder.files())
    }

    /// Drop checked, expanded and selection state for a node and its subtree
    ///
    /// Returns the files that were below (or are) the node.
    pub fn forget(&mut self, node: &FileTreeNode) -> Vec<FileNode> {
        let mut files = Vec::new();
        walk(std::slice::from_ref(node), &mut |n| {
            self.checked.remove(n.key());
            self.expanded.remove(n.key());
            if let FileTreeNode::File(file) = n {
                files.push(file.clone());
            }
        });

        let selected_inside = match (&self.selection, node) {
            (Some(selection), FileTreeNode::Folder(folder)) => folder.contains_key(selection.key()),
            (Some(selection), FileTreeNode::File(_)) => selection.matches(node),
            (None, _) => false,
        };
        if selected_inside {
            self.selection = None;
        }
        files
    }

    #[inline]
    pub fn selection(&self) -> Option<&Selection> {
        self.selection.as_ref()
    }

    /// Select the node with `key`
    pub fn select(&mut self, key: &str) -> Result<()> {
        let selection = self
            .find(key)
            .map(Selection::of)
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;
        self.selection = Some(selection);
        Ok(())
    }

    /// Select the node, or clear the selection when it is already selected
    pub fn toggle_selection(&mut self, key: &str) -> Result<Option<&Selection>> {
        let selection = self
            .find(key)
            .map(Selection::of)
            .ok_or_else(|| CoreError::NotFound(key.to_string()))?;
        if self.selection.as_ref() == Some(&selection) {
            self.selection = None;
        } else {
            self.selection = Some(selection);
        }
        Ok(self.selection.as_ref())
    }

    pub fn clear_selection(&mut self) {
        self.selection = None;
    }

    /// Folder that uploads and new folders target, `None` for the root
    pub fn target_folder(&self) -> Option<&str> {
        self.selection.as_ref()?.target_folder()
    }

    /// Flip a folder's expanded flag and return the new state
    pub fn toggle_expanded(&mut self, key: &str) -> bool {
        if self.expanded.remove(key) {
            false
        } else {
            self.expanded.insert(key.to_string());
            true
        }
    }

    #[inline]
    pub fn is_expanded(&self, key: &str) -> bool {
        self.expanded.contains(key)
    }

    /// Total number of files in the tree
    pub fn track_count(&self) -> usize {
        let mut count = 0;
        walk(&self.roots, &mut |node| {
            if !node.is_folder() {
                count += 1;
            }
        });
        count
    }

    /// "N track(s) available"
    pub fn track_count_label(&self) -> String {
        let count = self.track_count();
        format!("{} track{} available", count, if count == 1 { "" } else { "s" })
    }
}
