//! Utility functions for great-circle distances, naming and user-facing text

use crate::{CoreError, Result};

/// Mean Earth radius used for all distance calculations, in kilometers
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Maximum folder name length in characters
pub const MAX_FOLDER_NAME_LEN: usize = 255;

/// Characters that may not appear in a folder name
const FORBIDDEN_NAME_CHARS: &[char] = &['<', '>', ':', '"', '/', '\\', '|', '?', '*'];

/// Haversine distance between two WGS84 coordinates, in kilometers
///
/// Symmetric, zero for identical points, and total over finite inputs.
#[inline(always)]
pub fn haversine_km(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + phi1.cos() * phi2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Name shown for a track: the file name without its `.gpx` extension
pub fn track_display_name(file_name: &str) -> &str {
    let Some(split) = file_name.len().checked_sub(4) else {
        return file_name;
    };
    match (file_name.get(..split), file_name.get(split..)) {
        (Some(stem), Some(ext)) if ext.eq_ignore_ascii_case(".gpx") => stem,
        _ => file_name,
    }
}

/// Join a parent collection path and a child name with `/`
pub fn join_path(parent: Option<&str>, name: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{}/{}", parent.trim_end_matches('/'), name),
        _ => name.to_string(),
    }
}

/// Check a user-supplied folder name
///
/// Rejects empty or overlong names, path separators, reserved characters, control
/// characters, dot-only names and anything containing `..`.
pub fn validate_folder_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(CoreError::Validation("Please enter a folder name".to_string()));
    }
    if name.chars().count() > MAX_FOLDER_NAME_LEN {
        return Err(CoreError::Validation(format!(
            "Folder name too long. Maximum {} characters.",
            MAX_FOLDER_NAME_LEN
        )));
    }
    if name
        .chars()
        .any(|c| FORBIDDEN_NAME_CHARS.contains(&c) || ('\u{0}'..='\u{1f}').contains(&c))
    {
        return Err(CoreError::Validation(
            "Folder name contains invalid characters. Use only letters, numbers, spaces, and basic punctuation."
                .to_string(),
        ));
    }
    if name.chars().all(|c| c == '.') || name.contains("..") {
        return Err(CoreError::Validation("Invalid folder name.".to_string()));
    }
    Ok(())
}

/// Hide filesystem locations in a message before showing it to the user
///
/// Every whitespace-delimited run starting at a `/` and containing another `/` is
/// replaced with `[path]`.
pub fn sanitize_message(message: &str) -> String {
    let mut out = String::with_capacity(message.len());
    let mut rest = message;

    while let Some(start) = rest.find('/') {
        let (head, tail) = rest.split_at(start);
        out.push_str(head);

        let end = tail.find(char::is_whitespace).unwrap_or(tail.len());
        let token = &tail[..end];
        if token[1..].contains('/') {
            out.push_str("[path]");
        } else {
            out.push_str(token);
        }
        rest = &tail[end..];
    }

    out.push_str(rest);
    out
}
