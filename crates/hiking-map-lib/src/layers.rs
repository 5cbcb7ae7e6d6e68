//! Map layers for tracks
//!
//! A [`TrackLayer`] is the drawable form of one GPX file: a white border polyline under a
//! colored polyline for every segment, the colored one carrying a popup summary.
//! [`LayerManager`] owns the [`LayerCache`] and the set of visible paths, and is the only
//! component that talks to the external [`MapWidget`].

use crate::color::{self, HexColor};
use crate::storage::FileReader;
use crate::track::{self, TrackSegment};
use crate::tree::{FileNode, FileTreeNode};
use crate::{CoreError, Result, utils};
use geo::{BoundingRect, Coord, LineString, Rect};
use std::collections::{BTreeSet, HashMap};

/// Border drawn beneath every track
pub const BORDER_COLOR: &str = "#FFFFFF";

/// Padding in pixels applied when fitting the view to visible tracks
pub const FIT_PADDING: [f64; 2] = [20.0, 20.0];

/// Drawing capability of the external map
pub trait MapWidget {
    /// Attach `layer` under `key`. Attaching an already attached key replaces it.
    fn add_layer(&mut self, key: &str, layer: &TrackLayer);

    /// Detach the layer under `key`. Unknown keys are ignored.
    fn remove_layer(&mut self, key: &str);

    /// Move the view so `bounds` (WGS84, `x` = lon) is visible with `padding` pixels
    fn fit_bounds(&mut self, bounds: Rect<f64>, padding: [f64; 2]);
}

/// Stroke style of a polyline
#[derive(Clone, Debug, PartialEq)]
pub struct PolylineStyle {
    pub color: HexColor,
    pub weight: f32,
    pub opacity: f32,
}

impl PolylineStyle {
    pub fn border() -> Self {
        Self {
            color: HexColor::trusted(BORDER_COLOR),
            weight: 8.0,
            opacity: 1.0,
        }
    }

    pub fn track(color: HexColor) -> Self {
        Self {
            color,
            weight: 3.0,
            opacity: 0.8,
        }
    }
}

/// One styled line on the map
#[derive(Clone, Debug, PartialEq)]
pub struct Polyline {
    /// Geometry, `x` = longitude and `y` = latitude
    pub line: LineString<f64>,
    pub style: PolylineStyle,
    pub popup: Option<String>,
}

/// Drawable representation of one track file
#[derive(Clone, Debug, PartialEq)]
pub struct TrackLayer {
    polylines: Vec<Polyline>,
    color: HexColor,
}

impl TrackLayer {
    /// Build border + colored polyline pairs, in segment order
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(display_name: &str, segments: &[TrackSegment], color: &HexColor) -> Self {
        let mut polylines = Vec::with_capacity(segments.len() * 2);
        for segment in segments {
            let line = segment.line_string();
            polylines.push(Polyline {
                line: line.clone(),
                style: PolylineStyle::border(),
                popup: None,
            });
            polylines.push(Polyline {
                line,
                style: PolylineStyle::track(color.clone()),
                popup: Some(popup_summary(display_name, segment)),
            });
        }
        Self {
            polylines,
            color: color.clone(),
        }
    }

    #[inline]
    pub fn polylines(&self) -> &[Polyline] {
        &self.polylines
    }

    /// Color of the track polylines
    #[inline]
    pub fn color(&self) -> &HexColor {
        &self.color
    }

    /// Number of segments drawn by this layer
    #[inline]
    pub fn segment_count(&self) -> usize {
        self.polylines.len() / 2
    }

    /// Bounding box over all polylines
    pub fn bounds(&self) -> Option<Rect<f64>> {
        self.polylines
            .iter()
            .filter_map(|polyline| polyline.line.bounding_rect())
            .reduce(merge_rects)
    }
}

/// Popup text for a segment: name, distance and elevation range
pub fn popup_summary(display_name: &str, segment: &TrackSegment) -> String {
    let elevation = match segment.elevation_range() {
        Some((min, max)) => format!("{:.0}m - {:.0}m", min, max),
        None => "N/A".to_string(),
    };
    format!(
        "{}\nDistance: {:.2} km\nElevation: {}",
        display_name, segment.distance_km, elevation
    )
}

fn merge_rects(a: Rect<f64>, b: Rect<f64>) -> Rect<f64> {
    Rect::new(
        Coord {
            x: a.min().x.min(b.min().x),
            y: a.min().y.min(b.min().y),
        },
        Coord {
            x: a.max().x.max(b.max().x),
            y: a.max().y.max(b.max().y),
        },
    )
}

/// Keyed store of built layers, keyed by file path
///
/// Entries are only replaced through [`LayerCache::upsert`], which hands back whatever it
/// replaced, and only removed through [`LayerCache::evict`].
#[derive(Debug, Default)]
pub struct LayerCache {
    layers: HashMap<String, TrackLayer>,
}

impl LayerCache {
    #[inline]
    pub fn contains(&self, path: &str) -> bool {
        self.layers.contains_key(path)
    }

    #[inline]
    pub fn get(&self, path: &str) -> Option<&TrackLayer> {
        self.layers.get(path)
    }

    /// Insert a layer, returning the one it replaced
    pub fn upsert(&mut self, path: impl Into<String>, layer: TrackLayer) -> Option<TrackLayer> {
        self.layers.insert(path.into(), layer)
    }

    /// Remove and return the layer for `path`
    pub fn evict(&mut self, path: &str) -> Option<TrackLayer> {
        self.layers.remove(path)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }
}

/// How a successful [`LayerManager::show_track`] was satisfied
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ShowOutcome {
    /// The cached layer was attached again without reading the file
    Reattached,
    /// The file was read, parsed and a new layer built
    Built { segments: usize },
}

/// Result of [`LayerManager::fit_all_tracks`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum FitOutcome {
    NoVisibleTracks,
    /// Tracks are visible but none has drawable geometry
    NothingToFit,
    Fitted(Rect<f64>),
}

/// Owns the layer cache and mediates every change to the map
pub struct LayerManager<M: MapWidget> {
    map: M,
    cache: LayerCache,
    visible: BTreeSet<String>,
}

#[cfg_attr(feature = "profiling", profiling::all_functions)]
impl<M: MapWidget> LayerManager<M> {
    pub fn new(map: M) -> Self {
        Self {
            map,
            cache: LayerCache::default(),
            visible: BTreeSet::new(),
        }
    }

    #[inline]
    pub fn map(&self) -> &M {
        &self.map
    }

    #[inline]
    pub fn map_mut(&mut self) -> &mut M {
        &mut self.map
    }

    #[inline]
    pub fn cache(&self) -> &LayerCache {
        &self.cache
    }

    #[inline]
    pub fn is_visible(&self, path: &str) -> bool {
        self.visible.contains(path)
    }

    /// Paths of the tracks currently on the map, sorted
    pub fn visible_paths(&self) -> impl Iterator<Item = &str> {
        self.visible.iter().map(String::as_str)
    }

    #[inline]
    pub fn visible_count(&self) -> usize {
        self.visible.len()
    }

    /// Put a track on the map
    ///
    /// A cached layer is attached again as-is. Otherwise the file is read and parsed,
    /// colored from its containing folder in `roots`, cached and attached. A file that
    /// parses to zero segments fails with [`CoreError::TrackLoad`] and stays hidden.
    pub async fn show_track<R: FileReader>(
        &mut self,
        file: &FileNode,
        roots: &[FileTreeNode],
        reader: &R,
    ) -> Result<ShowOutcome> {
        if let Some(layer) = self.cache.get(&file.path) {
            tracing::trace!("Reattaching cached layer for {}", file.path);
            self.map.add_layer(&file.path, layer);
            self.visible.insert(file.path.clone());
            return Ok(ShowOutcome::Reattached);
        }

        let content = reader.read_text(&file.path).await?;
        let segments = track::parse(&content);
        if segments.is_empty() {
            return Err(CoreError::TrackLoad(file.name.clone()));
        }

        let color = color::color_for(&file.path, roots);
        let layer = TrackLayer::build(utils::track_display_name(&file.name), &segments, &color);
        self.map.add_layer(&file.path, &layer);
        if self.cache.upsert(file.path.clone(), layer).is_some() {
            tracing::warn!("Replaced a layer that appeared while {} was loading", file.path);
        }
        self.visible.insert(file.path.clone());

        tracing::debug!(
            "Built layer for {} ({} segment(s), {})",
            file.path,
            segments.len(),
            color
        );
        Ok(ShowOutcome::Built {
            segments: segments.len(),
        })
    }

    /// Take a track off the map, keeping its cached layer
    ///
    /// Returns whether a layer was detached. Unknown paths are a no-op.
    pub fn hide_track(&mut self, path: &str) -> bool {
        self.visible.remove(path);
        if self.cache.contains(path) {
            self.map.remove_layer(path);
            true
        } else {
            false
        }
    }

    /// Hide every visible track, whether or not it is still in the tree
    ///
    /// Returns the number of tracks hidden.
    pub fn hide_all(&mut self) -> usize {
        let visible = std::mem::take(&mut self.visible);
        for path in &visible {
            self.map.remove_layer(path);
        }
        visible.len()
    }

    /// Hide a track and drop its cached layer
    pub fn discard(&mut self, path: &str) -> Option<TrackLayer> {
        self.hide_track(path);
        self.cache.evict(path)
    }

    /// Drop the cached layer and show the track again from a fresh parse
    pub async fn force_rebuild<R: FileReader>(
        &mut self,
        file: &FileNode,
        roots: &[FileTreeNode],
        reader: &R,
    ) -> Result<ShowOutcome> {
        self.discard(&file.path);
        self.show_track(file, roots, reader).await
    }

    /// Fit the view to every visible track
    pub fn fit_all_tracks(&mut self) -> FitOutcome {
        if self.visible.is_empty() {
            return FitOutcome::NoVisibleTracks;
        }

        let bounds = self
            .visible
            .iter()
            .filter_map(|path| self.cache.get(path))
            .filter_map(TrackLayer::bounds)
            .reduce(merge_rects);

        match bounds {
            Some(bounds) => {
                self.map.fit_bounds(bounds, FIT_PADDING);
                FitOutcome::Fitted(bounds)
            }
            None => FitOutcome::NothingToFit,
        }
    }
}
