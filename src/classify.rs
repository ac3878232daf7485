//! File category classification.
//!
//! The same taxonomy is applied at upload time (from the MIME type) and at
//! display/search time (from the file name extension), so both call sites
//! always agree on a file's category.

use serde::{Deserialize, Serialize};

/// File category, derived once at upload and never recomputed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Document,
    Image,
    Video,
    Audio,
    Other,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Document => "document",
            Category::Image => "image",
            Category::Video => "video",
            Category::Audio => "audio",
            Category::Other => "other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "document" => Category::Document,
            "image" => Category::Image,
            "video" => Category::Video,
            "audio" => Category::Audio,
            _ => Category::Other,
        }
    }
}

/// Classify a MIME type string or a bare file name into a category.
///
/// Inputs containing a `/` are treated as MIME types and matched on the
/// top-level type; anything else is matched on its extension. Unrecognized
/// input falls through to `Other`. Total function, no failure mode.
pub fn classify(mime_or_name: &str) -> Category {
    if let Some((prefix, _)) = mime_or_name.split_once('/') {
        return match prefix {
            "image" => Category::Image,
            "video" => Category::Video,
            "audio" => Category::Audio,
            "application" | "text" => Category::Document,
            _ => Category::Other,
        };
    }

    match extension(mime_or_name).to_ascii_lowercase().as_str() {
        "jpg" | "jpeg" | "png" | "gif" | "webp" => Category::Image,
        "mp4" | "mov" | "avi" | "mkv" => Category::Video,
        "mp3" | "wav" | "aac" => Category::Audio,
        "pdf" | "doc" | "docx" | "txt" | "csv" => Category::Document,
        _ => Category::Other,
    }
}

/// Extension of a file name, without the dot. Empty for names with no dot.
pub fn extension(name: &str) -> &str {
    name.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("")
}

/// Expand the four display groups used by the list filter into the
/// finer-grained categories stored on records.
///
/// `media` collapses video and audio; unknown tokens are ignored so that a
/// bad query degrades to "no filter on that token" rather than an error.
pub fn expand_groups(csv: &str) -> Vec<Category> {
    let mut categories = Vec::new();
    for group in csv.split(',') {
        match group.trim() {
            "documents" => categories.push(Category::Document),
            "images" => categories.push(Category::Image),
            "media" => {
                categories.push(Category::Video);
                categories.push(Category::Audio);
            }
            "others" => categories.push(Category::Other),
            _ => {}
        }
    }
    categories
}
