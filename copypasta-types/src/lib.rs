//! Shared types for the CopyPasta backend and its HTTP clients.
//!
//! Field names on the wire are camelCase (`fileName`, `originalSize`, ...)
//! so browser clients can consume the JSON as-is.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =====================================================
// Domain Types
// =====================================================

/// Kind of stored item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemType {
    Note,
    File,
}

impl ItemType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemType::Note => "note",
            ItemType::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "note" => Some(ItemType::Note),
            "file" => Some(ItemType::File),
            _ => None,
        }
    }

    /// Storage directory name under the data root
    pub fn dir_name(&self) -> &'static str {
        match self {
            ItemType::Note => "notes",
            ItemType::File => "files",
        }
    }
}

/// A stored note or file record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: ItemType,
    /// Inline body. Omitted for binary files and for bodies too large to inline;
    /// those are fetched through the download endpoint.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_text: Option<bool>,
    pub language: String,
    pub original_size: u64,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub order: i64,
}

impl Item {
    /// True once `expires_at` lies strictly before `now`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at < now
    }

    /// File items whose body is not text cannot be edited or inlined
    pub fn is_binary(&self) -> bool {
        self.item_type == ItemType::File && !self.is_text.unwrap_or(false)
    }
}

/// Aggregate counters shown in the UI header
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemStats {
    pub file_count: usize,
    pub note_count: usize,
    pub total_size: u64,
}

/// Outcome of a partial-failure tolerant bulk operation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BulkOutcome {
    pub removed: usize,
    pub failed: usize,
}

impl BulkOutcome {
    pub fn is_complete(&self) -> bool {
        self.failed == 0
    }
}

// =====================================================
// Request Types
// =====================================================

/// Submit a text note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertNoteRequest {
    pub content: String,
    /// Display language; detected server-side when absent, empty or "auto"
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub original_size: Option<u64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Upload a file through the JSON API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InsertFileRequest {
    /// Raw text when `is_text`, base64 otherwise
    pub content: String,
    pub file_name: String,
    #[serde(default)]
    pub file_type: Option<String>,
    pub is_text: bool,
    #[serde(default)]
    pub language: Option<String>,
    pub original_size: u64,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub expires_at: Option<DateTime<Utc>>,
}

/// Replace the body of an existing note or text file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EditItemRequest {
    pub content: String,
    #[serde(default)]
    pub language: Option<String>,
}

/// New manual display sequence
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReorderRequest {
    pub ids: Vec<String>,
}

// =====================================================
// Response Types
// =====================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Machine-readable error kind ("validation", "not-found", ...)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            kind: None,
        }
    }

    pub fn err(kind: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(msg.into()),
            kind: Some(kind.into()),
        }
    }
}

/// Listing returned by `GET /api/items`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemList {
    pub items: Vec<Item>,
    pub stats: ItemStats,
}

/// Items created by a multipart upload
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadResult {
    pub files: Vec<Item>,
    pub notes: Vec<Item>,
}
