//! GPX parsing module
//!
//! This module turns raw GPX text into [`TrackSegment`]s with precomputed distance and
//! elevation range. Parsing is total: any rejected or malformed input degrades to an
//! empty result, so callers only ever see "zero segments".

use crate::{CoreError, Result, utils};
use geo::{BoundingRect, LineString, Point, Rect};

/// Largest GPX document accepted by [`parse`], in bytes
pub const MAX_GPX_BYTES: usize = 50 * 1024 * 1024;

/// A contiguous run of track points with derived statistics
///
/// Points are stored as `geo` points, `x` = longitude and `y` = latitude.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TrackSegment {
    /// Points in document order
    pub points: Vec<Point<f64>>,
    /// Sum of great-circle distances between consecutive points, in kilometers
    pub distance_km: f64,
    /// Lowest elevation reading, absent when the segment has none
    pub min_elevation_m: Option<f64>,
    /// Highest elevation reading, absent when the segment has none
    pub max_elevation_m: Option<f64>,
}

impl TrackSegment {
    /// Iterate over the points as `(lat, lon)` pairs
    pub fn lat_lon(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.points.iter().map(|p| (p.y(), p.x()))
    }

    /// Elevation range as `(min, max)`, present only when both bounds are known
    pub fn elevation_range(&self) -> Option<(f64, f64)> {
        Some((self.min_elevation_m?, self.max_elevation_m?))
    }

    /// The segment geometry as a line string
    pub fn line_string(&self) -> LineString<f64> {
        LineString::from(self.points.clone())
    }

    /// Bounding box in WGS84 degrees
    pub fn bounding_rect(&self) -> Option<Rect<f64>> {
        self.line_string().bounding_rect()
    }
}

/// Accumulates one segment while walking its points
#[derive(Default)]
struct SegmentBuilder {
    segment: TrackSegment,
}

impl SegmentBuilder {
    fn push(&mut self, lat: f64, lon: f64, elevation: Option<f64>) {
        if let Some(prev) = self.segment.points.last() {
            self.segment.distance_km += utils::haversine_km(prev.y(), prev.x(), lat, lon);
        }
        self.segment.points.push(Point::new(lon, lat));

        if let Some(ele) = elevation {
            self.segment.min_elevation_m =
                Some(self.segment.min_elevation_m.map_or(ele, |min| min.min(ele)));
            self.segment.max_elevation_m =
                Some(self.segment.max_elevation_m.map_or(ele, |max| max.max(ele)));
        }
    }

    fn finish(self) -> Option<TrackSegment> {
        (!self.segment.points.is_empty()).then_some(self.segment)
    }
}

/// Parse GPX text into track segments
///
/// Never fails: oversized input, input without `<gpx`/`</gpx>` markers and malformed XML
/// all yield an empty vector. Segments without any valid point are dropped.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn parse(xml: &str) -> Vec<TrackSegment> {
    match try_parse(xml) {
        Ok(segments) => segments,
        Err(e) => {
            tracing::warn!("Rejected GPX input: {}", e);
            Vec::new()
        }
    }
}

fn try_parse(xml: &str) -> Result<Vec<TrackSegment>> {
    if xml.len() > MAX_GPX_BYTES {
        return Err(CoreError::Validation(format!(
            "GPX file too large. Maximum size is {}MB.",
            MAX_GPX_BYTES / (1024 * 1024)
        )));
    }
    if !xml.contains("<gpx") || !xml.contains("</gpx>") {
        return Err(CoreError::Validation("Invalid GPX file format.".to_string()));
    }

    let options = roxmltree::ParsingOptions {
        allow_dtd: true,
        ..Default::default()
    };
    let document = roxmltree::Document::parse_with_options(xml, options)
        .map_err(|e| CoreError::GpxParse(e.to_string()))?;

    let mut segments = Vec::new();
    for track in document.descendants().filter(|n| is_element(n, "trk")) {
        for trkseg in track.descendants().filter(|n| is_element(n, "trkseg")) {
            let mut builder = SegmentBuilder::default();

            for trkpt in trkseg.descendants().filter(|n| is_element(n, "trkpt")) {
                let (Some(lat), Some(lon)) = (
                    parse_number(trkpt.attribute("lat")),
                    parse_number(trkpt.attribute("lon")),
                ) else {
                    tracing::trace!("Skipping track point without a usable lat/lon");
                    continue;
                };

                let elevation = trkpt
                    .descendants()
                    .find(|n| is_element(n, "ele"))
                    .and_then(|ele| parse_number(ele.text()));

                builder.push(lat, lon, elevation);
            }

            if let Some(segment) = builder.finish() {
                segments.push(segment);
            }
        }
    }

    tracing::trace!("Parsed {} GPX segment(s)", segments.len());
    Ok(segments)
}

#[inline]
fn is_element(node: &roxmltree::Node<'_, '_>, name: &str) -> bool {
    node.is_element() && node.tag_name().name() == name
}

#[inline]
fn parse_number(text: Option<&str>) -> Option<f64> {
    text?.trim().parse::<f64>().ok().filter(|v| v.is_finite())
}
