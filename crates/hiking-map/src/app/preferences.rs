//! Persisted user preferences (`settings.json`)

use hiking_map_lib::{CoreError, MapView, Result};
use serde::{Deserialize, Serialize};

/// Everything stored in `settings.json`
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Preferences {
    pub map: MapView,
    pub map_provider: MapProvider,
    pub mapy: MapySettings,
    pub desaturate_map: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapProvider {
    #[default]
    Osm,
    Mapy,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapySettings {
    pub api_key: String,
    pub style: MapyStyle,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum MapyStyle {
    #[default]
    Basic,
    Outdoor,
    Winter,
    Aerial,
}

impl MapyStyle {
    /// Style name in the Mapy.cz tile API
    pub fn tile_style(&self) -> &'static str {
        match self {
            Self::Basic => "basic",
            Self::Outdoor => "outdoor",
            Self::Winter => "winter",
            Self::Aerial => "ophoto",
        }
    }
}

const API_KEY_LEN: std::ops::RangeInclusive<usize> = 10..=200;

/// Letters, digits, `-` and `_`, 10 to 200 characters
pub fn is_valid_api_key(key: &str) -> bool {
    API_KEY_LEN.contains(&key.len())
        && key
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

impl Preferences {
    /// Check provider settings before they are saved
    pub fn validate(&self) -> Result<()> {
        let key = self.mapy.api_key.as_str();
        if self.map_provider == MapProvider::Mapy && key.is_empty() {
            return Err(CoreError::Validation(
                "Please enter a Mapy.cz API key or select OpenStreetMap".to_string(),
            ));
        }
        if !key.is_empty() && !is_valid_api_key(key) {
            return Err(CoreError::Validation(
                "Invalid API key format. Keys should be 10-200 characters with only letters, numbers, hyphens, and underscores."
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// Tile source for the configured provider
    ///
    /// Mapy.cz without an API key falls back to OpenStreetMap.
    pub fn tiles_provider(&self) -> TilesProvider {
        match self.map_provider {
            MapProvider::Mapy if !self.mapy.api_key.is_empty() => TilesProvider::Mapy {
                style: self.mapy.style,
                api_key: self.mapy.api_key.clone(),
            },
            _ => TilesProvider::OpenStreetMap,
        }
    }
}

/// Available map tile providers
#[derive(Clone, Debug, PartialEq)]
pub enum TilesProvider {
    OpenStreetMap,
    Mapy { style: MapyStyle, api_key: String },
}

impl TilesProvider {
    pub fn url(&self) -> String {
        match self {
            Self::OpenStreetMap => "https://tile.openstreetmap.org/{z}/{x}/{y}.png".to_string(),
            Self::Mapy { style, api_key } => format!(
                "https://api.mapy.cz/v1/maptiles/{}/256/{{z}}/{{x}}/{{y}}?apikey={}",
                style.tile_style(),
                api_key
            ),
        }
    }

    pub fn attribution(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "© OpenStreetMap contributors",
            Self::Mapy { .. } => "© Mapy.cz",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::OpenStreetMap => "OpenStreetMap",
            Self::Mapy { .. } => "Mapy.cz",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_first_run() {
        let prefs = Preferences::default();
        assert_eq!(prefs.map.center, [49.2827, -123.1207]);
        assert_eq!(prefs.map.zoom, 10.0);
        assert_eq!(prefs.map_provider, MapProvider::Osm);
        assert_eq!(prefs.mapy.style, MapyStyle::Basic);
        assert!(!prefs.desaturate_map);
    }

    #[test]
    fn test_json_shape() {
        let json = r#"{
            "map": { "center": [46.5, 8.0], "zoom": 12 },
            "mapProvider": "mapy",
            "mapy": { "apiKey": "abcdef-123_XYZ", "style": "aerial" },
            "desaturateMap": true
        }"#;
        let prefs: Preferences = serde_json::from_str(json).unwrap();
        assert_eq!(prefs.map.center, [46.5, 8.0]);
        assert_eq!(prefs.map_provider, MapProvider::Mapy);
        assert_eq!(prefs.mapy.style, MapyStyle::Aerial);
        assert!(prefs.desaturate_map);

        let back = serde_json::to_value(&prefs).unwrap();
        assert_eq!(back["mapy"]["apiKey"], "abcdef-123_XYZ");
        assert_eq!(back["mapProvider"], "mapy");
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let prefs: Preferences = serde_json::from_str(r#"{ "desaturateMap": true }"#).unwrap();
        assert_eq!(prefs.map, MapView::default());
        assert!(prefs.desaturate_map);
    }

    #[test]
    fn test_validation() {
        let mut prefs = Preferences {
            map_provider: MapProvider::Mapy,
            ..Default::default()
        };
        assert!(prefs.validate().is_err());

        prefs.mapy.api_key = "short".to_string();
        assert!(prefs.validate().is_err());

        prefs.mapy.api_key = "has spaces in it!".to_string();
        assert!(prefs.validate().is_err());

        prefs.mapy.api_key = "valid_key-0123".to_string();
        assert!(prefs.validate().is_ok());

        prefs.mapy.api_key = "k".repeat(201);
        assert!(prefs.validate().is_err());

        assert!(Preferences::default().validate().is_ok());
    }

    #[test]
    fn test_tile_urls() {
        let mut prefs = Preferences::default();
        assert_eq!(prefs.tiles_provider(), TilesProvider::OpenStreetMap);

        prefs.map_provider = MapProvider::Mapy;
        assert_eq!(prefs.tiles_provider(), TilesProvider::OpenStreetMap);

        prefs.mapy.api_key = "valid_key-0123".to_string();
        prefs.mapy.style = MapyStyle::Aerial;
        assert_eq!(
            prefs.tiles_provider().url(),
            "https://api.mapy.cz/v1/maptiles/ophoto/256/{z}/{x}/{y}?apikey=valid_key-0123"
        );
        assert_eq!(prefs.tiles_provider().name(), "Mapy.cz");
    }
}
