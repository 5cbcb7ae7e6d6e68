//! Folder colors and the track color lookup

use crate::tree::{FileTreeNode, FolderNode};
use crate::{CoreError, Result};
use std::fmt;
use std::str::FromStr;

/// Color used for folders without a configured color and for orphaned tracks
pub const DEFAULT_FOLDER_COLOR: &str = "#FF6600";

/// A validated `#RRGGBB` color
///
/// The original spelling (case) is preserved.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "String", into = "String")
)]
pub struct HexColor(String);

impl HexColor {
    /// Validate strict 6-digit hex syntax with a leading `#`
    pub fn parse(value: &str) -> Result<Self> {
        if is_valid_hex_color(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(CoreError::Validation(format!(
                "Invalid color format '{}'. Use hex format like {}.",
                value, DEFAULT_FOLDER_COLOR
            )))
        }
    }

    pub(crate) fn trusted(value: &'static str) -> Self {
        debug_assert!(is_valid_hex_color(value));
        Self(value.to_string())
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for HexColor {
    fn default() -> Self {
        Self::trusted(DEFAULT_FOLDER_COLOR)
    }
}

impl fmt::Display for HexColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for HexColor {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for HexColor {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<HexColor> for String {
    fn from(color: HexColor) -> Self {
        color.0
    }
}

/// `#` followed by exactly six hex digits, either case
pub fn is_valid_hex_color(value: &str) -> bool {
    value
        .strip_prefix('#')
        .is_some_and(|digits| digits.len() == 6 && digits.chars().all(|c| c.is_ascii_hexdigit()))
}

/// Display color of the track at `path`
///
/// Uses the color of the folder that directly contains the file. Files that sit at the
/// collection root, or that the current tree does not reference, get
/// [`DEFAULT_FOLDER_COLOR`]. Folders never inherit color from their own ancestors.
pub fn color_for(path: &str, roots: &[FileTreeNode]) -> HexColor {
    containing_folder(roots, path)
        .map(|folder| folder.color.clone())
        .unwrap_or_default()
}

/// Find the folder whose direct children include the file at `path`
///
/// Each folder's own children are checked before descending into its subfolders.
pub fn containing_folder<'a>(nodes: &'a [FileTreeNode], path: &str) -> Option<&'a FolderNode> {
    for node in nodes {
        let FileTreeNode::Folder(folder) = node else {
            continue;
        };

        let direct = folder
            .children
            .iter()
            .any(|child| matches!(child, FileTreeNode::File(file) if file.path == path));
        if direct {
            return Some(folder);
        }

        if let Some(found) = containing_folder(&folder.children, path) {
            return Some(found);
        }
    }
    None
}
