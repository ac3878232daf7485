use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// File record. One row per uploaded blob; `storage_key` is the immutable
/// locator into the blob store, `owner_id` scopes every query.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct FileRecord {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub storage_key: String,
    pub size: i64,
    #[sqlx(rename = "type")]
    #[serde(rename = "type")]
    pub file_type: String,
    pub created_at: String,
}

/// File list query parameters
/// `types` is a csv of display groups (documents,images,media,others),
/// `sort` is `field-asc` or `field-desc`.
#[derive(Debug, Default, Deserialize)]
pub struct ListFilesQuery {
    pub types: Option<String>,
    pub search: Option<String>,
    pub sort: Option<String>,
    pub limit: Option<u32>,
}

/// Sort column whitelist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Size,
    CreatedAt,
}

impl SortField {
    pub fn column(&self) -> &'static str {
        match self {
            SortField::Name => "name",
            SortField::Size => "size",
            SortField::CreatedAt => "created_at",
        }
    }
}

/// Parsed sort order, defaulting to newest first
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub ascending: bool,
}

impl Default for SortOrder {
    fn default() -> Self {
        Self {
            field: SortField::CreatedAt,
            ascending: false,
        }
    }
}

impl SortOrder {
    /// Parse a `field-direction` pair. Unknown fields or directions fall back
    /// to the default rather than failing the request.
    pub fn parse(sort: Option<&str>) -> Self {
        let Some(sort) = sort else {
            return Self::default();
        };

        let Some((field, direction)) = sort.rsplit_once('-') else {
            return Self::default();
        };

        let field = match field {
            "name" => SortField::Name,
            "size" => SortField::Size,
            "created_at" => SortField::CreatedAt,
            _ => return Self::default(),
        };

        let ascending = match direction {
            "asc" => true,
            "desc" => false,
            _ => return Self::default(),
        };

        Self { field, ascending }
    }
}

/// Delete file request
#[derive(Debug, Deserialize)]
pub struct DeleteFileRequest {
    pub id: String,
    pub storage_key: String,
}

/// Rename file request
#[derive(Debug, Deserialize)]
pub struct RenameFileRequest {
    pub id: String,
    pub name: String,
}

/// Download link query parameters
#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    pub storage_key: String,
}

/// Signed download link response
#[derive(Debug, Serialize)]
pub struct DownloadLinkResponse {
    pub url: String,
    pub expires_at: i64,
}

/// Query string attached to signed raw-download URLs
#[derive(Debug, Deserialize)]
pub struct SignedDownloadQuery {
    pub expires: i64,
    pub signature: String,
}
