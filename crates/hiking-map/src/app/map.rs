//! Map surface without a window
//!
//! Keeps attached layers in memory and remembers the last fitted view, so the command line
//! front end can report what an interactive map would draw.

use geo::Rect;
use hiking_map_lib::{MapView, MapWidget, TrackLayer};
use std::collections::BTreeMap;

/// Highest zoom level offered by the tile providers
const MAX_ZOOM: f64 = 18.0;

/// Assumed viewport size in pixels when fitting bounds
const VIEWPORT: [f64; 2] = [1280.0, 800.0];

const TILE_SIZE: f64 = 256.0;

#[derive(Debug, Default)]
pub struct HeadlessMap {
    layers: BTreeMap<String, TrackLayer>,
    view: Option<MapView>,
}

impl HeadlessMap {
    pub fn layers(&self) -> impl Iterator<Item = (&str, &TrackLayer)> {
        self.layers.iter().map(|(key, layer)| (key.as_str(), layer))
    }

    #[inline]
    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    /// View computed by the last fit, if any
    #[inline]
    pub fn view(&self) -> Option<MapView> {
        self.view
    }
}

impl MapWidget for HeadlessMap {
    fn add_layer(&mut self, key: &str, layer: &TrackLayer) {
        tracing::trace!("Attach {} ({} polylines)", key, layer.polylines().len());
        self.layers.insert(key.to_string(), layer.clone());
    }

    fn remove_layer(&mut self, key: &str) {
        if self.layers.remove(key).is_some() {
            tracing::trace!("Detach {}", key);
        }
    }

    fn fit_bounds(&mut self, bounds: Rect<f64>, padding: [f64; 2]) {
        let view = fit_view(bounds, padding);
        tracing::debug!(
            "Fit view to [{:.5}, {:.5}] - [{:.5}, {:.5}] at zoom {}",
            bounds.min().y,
            bounds.min().x,
            bounds.max().y,
            bounds.max().x,
            view.zoom
        );
        self.view = Some(view);
    }
}

/// Web Mercator y in tile units at zoom 0
fn mercator_y(lat: f64) -> f64 {
    let lat = lat.clamp(-85.05112878, 85.05112878).to_radians();
    (1.0 - (lat.tan() + 1.0 / lat.cos()).ln() / std::f64::consts::PI) / 2.0
}

/// Center and the largest integer zoom at which `bounds` fits the viewport
fn fit_view(bounds: Rect<f64>, padding: [f64; 2]) -> MapView {
    let center = bounds.center();
    let width = (bounds.max().x - bounds.min().x) / 360.0;
    let height = (mercator_y(bounds.min().y) - mercator_y(bounds.max().y)).abs();

    let avail_x = (VIEWPORT[0] - 2.0 * padding[0]).max(1.0);
    let avail_y = (VIEWPORT[1] - 2.0 * padding[1]).max(1.0);

    let mut zoom = MAX_ZOOM;
    while zoom > 0.0 {
        let scale = TILE_SIZE * 2f64.powf(zoom);
        if width * scale <= avail_x && height * scale <= avail_y {
            break;
        }
        zoom -= 1.0;
    }

    MapView {
        center: [center.y, center.x],
        zoom,
    }
}
