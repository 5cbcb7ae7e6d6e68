use super::preferences::{MapProvider, MapyStyle};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
/// Hiking Map - Browse, organise and draw folder-organised GPX track collections
pub struct Settings {
    /// Collection root (defaults to the `gpx` directory in the app data directory)
    #[clap(short, long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Use the development app data directory
    #[clap(long, default_value = "false")]
    pub dev: bool,

    #[clap(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
    /// Print the collection tree with checked and visible markers
    Tree,

    /// Draw every track and print the resulting layers
    Show,

    /// Draw every track and fit the view to them
    Fit,

    /// Create a folder
    Mkdir {
        name: String,

        /// Parent folder path, relative to the collection root
        #[clap(short, long)]
        parent: Option<String>,
    },

    /// Set a folder color
    Color {
        /// Folder path, relative to the collection root
        folder: String,

        /// Color as #RRGGBB
        hex: String,
    },

    /// Copy GPX files into the collection
    Upload {
        #[clap(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,

        /// Destination folder path, relative to the collection root
        #[clap(short, long)]
        to: Option<String>,
    },

    /// Delete a file or folder (folders are deleted with their contents)
    Delete { path: String },

    /// Print or change persisted settings
    Settings {
        #[clap(long, value_enum)]
        provider: Option<MapProvider>,

        #[clap(long)]
        api_key: Option<String>,

        #[clap(long, value_enum)]
        style: Option<MapyStyle>,

        #[clap(long)]
        desaturate: Option<bool>,
    },
}

impl Settings {
    pub fn from_cli() -> Self {
        Self::parse()
    }

    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Tree)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_to_tree() {
        let settings = Settings::parse_from(["hiking-map"]);
        assert_eq!(settings.command(), Command::Tree);
        assert!(settings.root.is_none());
        assert!(!settings.dev);
    }

    #[test]
    fn test_parse_subcommands() {
        let settings =
            Settings::parse_from(["hiking-map", "--root", "/tmp/gpx", "mkdir", "Alps", "--parent", "Trips"]);
        assert_eq!(settings.root, Some(PathBuf::from("/tmp/gpx")));
        assert_eq!(
            settings.command(),
            Command::Mkdir {
                name: "Alps".to_string(),
                parent: Some("Trips".to_string())
            }
        );

        let settings = Settings::parse_from(["hiking-map", "settings", "--provider", "mapy", "--style", "aerial"]);
        assert_eq!(
            settings.command(),
            Command::Settings {
                provider: Some(MapProvider::Mapy),
                api_key: None,
                style: Some(MapyStyle::Aerial),
                desaturate: None
            }
        );
    }

    #[test]
    fn test_upload_requires_files() {
        assert!(Settings::try_parse_from(["hiking-map", "upload"]).is_err());
    }
}
