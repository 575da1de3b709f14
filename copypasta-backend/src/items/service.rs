//! Item service: validation and payload conversion in front of the store
//!
//! Every operation returns `ServiceError` on failure. Wire payloads (plain
//! text, base64, multipart bytes) become raw bytes here; the store never
//! sees encodings.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use copypasta_types::{
    BulkOutcome, EditItemRequest, InsertFileRequest, InsertNoteRequest, Item, ItemList, ItemType,
    UploadResult,
};
use std::path::PathBuf;
use std::sync::Arc;

use super::store::{ItemStore, NewItem};
use super::sweeper;
use crate::config::{Config, ListOrder};
use crate::db::sqlite::is_storable_time;
use crate::error::ServiceError;
use crate::language::{LanguageDetector, BINARY_LANGUAGE};

pub const DEFAULT_FILE_TYPE: &str = "application/octet-stream";

/// Language value that asks for detection
const AUTO_LANGUAGE: &str = "auto";

/// A file received through multipart upload
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub file_name: String,
    pub content_type: Option<String>,
    pub bytes: Vec<u8>,
}

pub struct ItemService {
    store: Arc<ItemStore>,
    detector: Arc<dyn LanguageDetector>,
    retention: Duration,
    list_order: ListOrder,
}

impl ItemService {
    pub fn new(
        store: Arc<ItemStore>,
        detector: Arc<dyn LanguageDetector>,
        retention: Duration,
        list_order: ListOrder,
    ) -> Self {
        log::info!("[SERVICE] Language detection: {}", detector.name());
        Self {
            store,
            detector,
            retention,
            list_order,
        }
    }

    pub fn from_config(store: Arc<ItemStore>, detector: Arc<dyn LanguageDetector>, config: &Config) -> Self {
        Self::new(store, detector, Duration::days(config.retention_days), config.list_order)
    }

    fn too_large(&self) -> ServiceError {
        let limit_mb = self.store.max_content_bytes() / (1024 * 1024);
        ServiceError::TooLarge(format!("File size must be under {}MB", limit_mb))
    }

    fn check_size(&self, size: u64) -> Result<(), ServiceError> {
        if size > self.store.max_content_bytes() {
            return Err(self.too_large());
        }
        Ok(())
    }

    /// Declared language, or a detected one when absent, empty or "auto"
    fn resolve_language(&self, declared: Option<&str>, content: &str) -> String {
        match declared.map(str::trim) {
            Some(lang) if !lang.is_empty() && !lang.eq_ignore_ascii_case(AUTO_LANGUAGE) => lang.to_lowercase(),
            _ => self.detector.detect(content),
        }
    }

    fn timestamps(
        &self,
        created_at: Option<DateTime<Utc>>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>), ServiceError> {
        let created_at = created_at.unwrap_or_else(|| self.store.clock().now());
        let expires_at = match expires_at {
            Some(expires_at) => expires_at,
            None => created_at
                .checked_add_signed(self.retention)
                .ok_or_else(|| ServiceError::validation("createdAt is out of range"))?,
        };
        for (field, value) in [("createdAt", &created_at), ("expiresAt", &expires_at)] {
            if !is_storable_time(value) {
                return Err(ServiceError::validation(format!(
                    "{} must be between years 0000 and 9999",
                    field
                )));
            }
        }
        if expires_at <= created_at {
            return Err(ServiceError::validation("expiresAt must be after createdAt"));
        }
        Ok((created_at, expires_at))
    }

    pub fn insert_note(&self, req: InsertNoteRequest) -> Result<Item, ServiceError> {
        if req.content.trim().is_empty() {
            return Err(ServiceError::validation("Note content cannot be empty"));
        }
        if let Some(declared) = req.original_size {
            self.check_size(declared)?;
        }
        self.check_size(req.content.len() as u64)?;

        let (created_at, expires_at) = self.timestamps(req.created_at, req.expires_at)?;
        let language = self.resolve_language(req.language.as_deref(), &req.content);

        let item = self.store.insert(NewItem {
            item_type: ItemType::Note,
            body: req.content.into_bytes(),
            file_name: None,
            file_type: None,
            is_text: true,
            language,
            created_at,
            expires_at,
        })?;
        Ok(item)
    }

    pub fn insert_file(&self, req: InsertFileRequest) -> Result<Item, ServiceError> {
        let file_name = req.file_name.trim();
        if file_name.is_empty() {
            return Err(ServiceError::validation("File name cannot be empty"));
        }
        self.check_size(req.original_size)?;

        let body = if req.is_text {
            req.content.into_bytes()
        } else {
            STANDARD
                .decode(req.content.trim())
                .map_err(|e| ServiceError::validation(format!("Invalid base64 content: {}", e)))?
        };
        self.check_size(body.len() as u64)?;

        let (created_at, expires_at) = self.timestamps(req.created_at, req.expires_at)?;
        self.store_file(
            file_name,
            req.file_type.as_deref(),
            body,
            req.is_text,
            req.language.as_deref(),
            created_at,
            expires_at,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn store_file(
        &self,
        file_name: &str,
        file_type: Option<&str>,
        body: Vec<u8>,
        is_text: bool,
        language: Option<&str>,
        created_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
    ) -> Result<Item, ServiceError> {
        let language = if is_text {
            match std::str::from_utf8(&body) {
                Ok(text) => self.resolve_language(language, text),
                Err(_) => return Err(ServiceError::validation("Text file content is not valid UTF-8")),
            }
        } else {
            BINARY_LANGUAGE.to_string()
        };

        let file_type = file_type
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FILE_TYPE)
            .to_string();

        let item = self.store.insert(NewItem {
            item_type: ItemType::File,
            body,
            file_name: Some(file_name.to_string()),
            file_type: Some(file_type),
            is_text,
            language,
            created_at,
            expires_at,
        })?;
        Ok(item)
    }

    /// Store every uploaded file as a file item and the text field, if any, as a note.
    /// Items stored before a failure are kept.
    pub fn insert_upload(
        &self,
        files: Vec<UploadedFile>,
        content: Option<String>,
        language: Option<String>,
    ) -> Result<UploadResult, ServiceError> {
        let content = content.filter(|c| !c.trim().is_empty());
        if files.is_empty() && content.is_none() {
            return Err(ServiceError::validation("Nothing to upload"));
        }
        for file in &files {
            self.check_size(file.bytes.len() as u64)?;
        }

        let mut result = UploadResult::default();

        for file in files {
            let file_name = file.file_name.trim();
            let file_name = if file_name.is_empty() { "file" } else { file_name };
            let is_text = file
                .content_type
                .as_deref()
                .map(super::file_ops::is_text_mime)
                .unwrap_or(false)
                && std::str::from_utf8(&file.bytes).is_ok();

            let (created_at, expires_at) = self.timestamps(None, None)?;
            let item = self.store_file(
                file_name,
                file.content_type.as_deref(),
                file.bytes,
                is_text,
                None,
                created_at,
                expires_at,
            )?;
            result.files.push(item);
        }

        if let Some(content) = content {
            let note = self.insert_note(InsertNoteRequest {
                content,
                language,
                original_size: None,
                created_at: None,
                expires_at: None,
            })?;
            result.notes.push(note);
        }

        Ok(result)
    }

    /// Replace the body of a note or text file. An absent language keeps the
    /// current tag; empty or "auto" re-detects.
    pub fn edit(&self, id: &str, req: EditItemRequest) -> Result<Item, ServiceError> {
        if req.content.trim().is_empty() {
            return Err(ServiceError::validation("Content cannot be empty"));
        }
        self.check_size(req.content.len() as u64)?;

        let current = self.store.get_record(id)?;
        let language = match req.language.as_deref() {
            None => current.language.clone(),
            declared => self.resolve_language(declared, &req.content),
        };

        Ok(self.store.update_content(id, &req.content, &language)?)
    }

    pub fn remove(&self, id: &str) -> Result<(), ServiceError> {
        self.store.remove(id)?;
        Ok(())
    }

    pub fn remove_all(&self) -> Result<BulkOutcome, ServiceError> {
        Ok(self.store.remove_all()?)
    }

    pub fn list(&self) -> Result<ItemList, ServiceError> {
        let items = self.store.list(self.list_order)?;
        let stats = self.store.stats()?;
        Ok(ItemList { items, stats })
    }

    pub fn get(&self, id: &str) -> Result<Item, ServiceError> {
        Ok(self.store.get(id)?)
    }

    pub fn reorder(&self, ids: &[String]) -> Result<(), ServiceError> {
        self.store.reorder(ids)?;
        Ok(())
    }

    /// Remove every item past its expiry now
    pub fn clean_expired(&self) -> Result<BulkOutcome, ServiceError> {
        Ok(sweeper::sweep_expired(&self.store)?)
    }

    /// Record and on-disk location for streaming an item's body
    pub fn download(&self, id: &str) -> Result<(Item, PathBuf), ServiceError> {
        let item = self.store.get_record(id)?;
        let path = self.store.content_path(&item);
        if !path.is_file() {
            log::warn!("[SERVICE] Content file for {} is missing", id);
            return Err(ServiceError::NotFound(id.to_string()));
        }
        Ok((item, path))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::clock::{Clock, ManualClock};
    use crate::config::InsertPosition;
    use crate::db::Database;
    use crate::error::ErrorKind;
    use crate::language::KeywordDetector;
    use chrono::TimeZone;
    use tempfile::{tempdir, TempDir};

    pub(crate) fn test_service(max_bytes: u64) -> (TempDir, ItemService, Arc<ManualClock>) {
        let dir = tempdir().unwrap();
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let db = Arc::new(Database::new(&dir.path().join(".copypasta.db")).unwrap());
        let store = ItemStore::new(
            dir.path().join("notes"),
            dir.path().join("files"),
            db,
            clock.clone(),
            max_bytes,
            InsertPosition::Top,
        )
        .unwrap();
        let service = ItemService::new(
            Arc::new(store),
            Arc::new(KeywordDetector),
            Duration::days(14),
            ListOrder::Manual,
        );
        (dir, service, clock)
    }

    fn note(content: &str) -> InsertNoteRequest {
        InsertNoteRequest {
            content: content.to_string(),
            language: None,
            original_size: None,
            created_at: None,
            expires_at: None,
        }
    }

    fn binary_request(name: &str, bytes: &[u8]) -> InsertFileRequest {
        InsertFileRequest {
            content: STANDARD.encode(bytes),
            file_name: name.to_string(),
            file_type: Some("image/png".to_string()),
            is_text: false,
            language: None,
            original_size: bytes.len() as u64,
            created_at: None,
            expires_at: None,
        }
    }

    #[test]
    fn test_note_gets_fourteen_day_expiry() {
        let (_dir, service, clock) = test_service(1024);
        let item = service.insert_note(note("hello")).unwrap();
        assert_eq!(item.created_at, clock.now());
        assert_eq!(item.expires_at - item.created_at, Duration::days(14));
        assert_eq!(item.language, "text");
    }

    #[test]
    fn test_empty_note_is_validation_error() {
        let (_dir, service, _clock) = test_service(1024);
        let err = service.insert_note(note("   \n")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_inverted_timestamps_rejected() {
        let (_dir, service, clock) = test_service(1024);
        let mut req = note("hello");
        req.created_at = Some(clock.now());
        req.expires_at = Some(clock.now() - Duration::seconds(1));
        assert_eq!(service.insert_note(req).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_timestamps_beyond_year_9999_rejected() {
        let (_dir, service, _clock) = test_service(1024);

        let mut req = note("x");
        req.created_at = Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        req.expires_at = Some(Utc.with_ymd_and_hms(10000, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(service.insert_note(req).unwrap_err().kind(), ErrorKind::Validation);

        // Default expiry would overflow chrono's range
        let mut req = note("x");
        req.created_at = Some(DateTime::<Utc>::MAX_UTC - Duration::days(1));
        assert_eq!(service.insert_note(req).unwrap_err().kind(), ErrorKind::Validation);

        assert!(service.list().unwrap().items.is_empty());
        assert_eq!(service.clean_expired().unwrap(), BulkOutcome::default());
    }

    #[test]
    fn test_language_declared_auto_or_detected() {
        let (_dir, service, _clock) = test_service(4096);

        let mut req = note("plain words");
        req.language = Some("Rust".to_string());
        assert_eq!(service.insert_note(req).unwrap().language, "rust");

        let mut req = note(r#"{"key": [1, 2]}"#);
        req.language = Some("auto".to_string());
        assert_eq!(service.insert_note(req).unwrap().language, "json");

        let req = note("SELECT name FROM users WHERE id = 1");
        assert_eq!(service.insert_note(req).unwrap().language, "sql");
    }

    #[test]
    fn test_binary_file_is_base64_decoded() {
        let (_dir, service, _clock) = test_service(1024);
        let bytes = [0x89u8, b'P', b'N', b'G', 0, 255];
        let item = service.insert_file(binary_request("logo.png", &bytes)).unwrap();

        assert_eq!(item.language, "binary");
        assert_eq!(item.is_text, Some(false));
        assert_eq!(item.original_size, bytes.len() as u64);
        assert!(item.content.is_none());

        let (_, path) = service.download(&item.id).unwrap();
        assert_eq!(std::fs::read(path).unwrap(), bytes);
    }

    #[test]
    fn test_invalid_base64_is_validation_error() {
        let (_dir, service, _clock) = test_service(1024);
        let mut req = binary_request("x.bin", b"abc");
        req.content = "not base64 !!".to_string();
        assert_eq!(service.insert_file(req).unwrap_err().kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_oversized_file_rejected_without_backing_file() {
        let limit = 64;
        let (dir, service, _clock) = test_service(limit);

        // Declared size over the cap
        let mut req = binary_request("big.bin", &[1u8; 8]);
        req.original_size = limit + 1;
        let err = service.insert_file(req).unwrap_err();
        assert!(matches!(err, ServiceError::TooLarge(_)));
        assert_eq!(err.kind(), ErrorKind::Validation);

        // Decoded size over the cap, even when the declaration lies
        let mut req = binary_request("big.bin", &[1u8; 65]);
        req.original_size = 10;
        assert!(matches!(service.insert_file(req).unwrap_err(), ServiceError::TooLarge(_)));

        assert_eq!(std::fs::read_dir(dir.path().join("files")).unwrap().count(), 0);
        assert!(service.list().unwrap().items.is_empty());
    }

    #[test]
    fn test_text_file_is_inlined_and_editable() {
        let (_dir, service, _clock) = test_service(1024);
        let req = InsertFileRequest {
            content: "fn main() { let mut x = 1; println!(\"{}\", x); }".to_string(),
            file_name: "main.rs".to_string(),
            file_type: None,
            is_text: true,
            language: None,
            original_size: 48,
            created_at: None,
            expires_at: None,
        };
        let item = service.insert_file(req).unwrap();
        assert_eq!(item.file_type.as_deref(), Some(DEFAULT_FILE_TYPE));
        assert_eq!(item.language, "rust");
        assert!(item.content.is_some());

        let edited = service
            .edit(&item.id, EditItemRequest { content: "print('hi')".to_string(), language: None })
            .unwrap();
        assert_eq!(edited.content.as_deref(), Some("print('hi')"));
        assert_eq!(edited.language, "rust");
    }

    #[test]
    fn test_edit_binary_and_missing() {
        let (_dir, service, _clock) = test_service(1024);
        let item = service.insert_file(binary_request("a.bin", &[0, 1, 2])).unwrap();

        let req = EditItemRequest { content: "text".to_string(), language: None };
        assert_eq!(service.edit(&item.id, req.clone()).unwrap_err().kind(), ErrorKind::Validation);
        assert_eq!(service.edit("missing", req).unwrap_err().kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_long_multibyte_file_name_is_stored() {
        let (_dir, service, _clock) = test_service(1024);
        let name = format!("{}.txt", "字".repeat(130));
        let req = InsertFileRequest {
            content: "hello".to_string(),
            file_name: name.clone(),
            file_type: Some("text/plain".to_string()),
            is_text: true,
            language: None,
            original_size: 5,
            created_at: None,
            expires_at: None,
        };
        let item = service.insert_file(req).unwrap();
        assert_eq!(item.file_name.as_deref(), Some(name.as_str()));
        assert_eq!(service.get(&item.id).unwrap().content.as_deref(), Some("hello"));
    }

    #[test]
    fn test_upload_stores_files_and_note() {
        let (_dir, service, _clock) = test_service(1024);
        let files = vec![
            UploadedFile {
                file_name: "readme.md".to_string(),
                content_type: Some("text/markdown".to_string()),
                bytes: b"# Title\n\nSome [link](http://x)".to_vec(),
            },
            UploadedFile {
                file_name: "blob.bin".to_string(),
                content_type: Some("application/octet-stream".to_string()),
                bytes: vec![0, 159, 146, 150],
            },
        ];

        let result = service
            .insert_upload(files, Some("hello from the form".to_string()), None)
            .unwrap();
        assert_eq!(result.files.len(), 2);
        assert_eq!(result.notes.len(), 1);
        assert_eq!(result.files[0].is_text, Some(true));
        assert_eq!(result.files[0].language, "markdown");
        assert_eq!(result.files[1].is_text, Some(false));

        let stats = service.list().unwrap().stats;
        assert_eq!(stats.file_count, 2);
        assert_eq!(stats.note_count, 1);
    }

    #[test]
    fn test_empty_upload_is_rejected() {
        let (_dir, service, _clock) = test_service(1024);
        let err = service.insert_upload(vec![], Some("  ".to_string()), None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[test]
    fn test_expired_items_cleaned_after_fifteen_days() {
        let (_dir, service, clock) = test_service(1024);
        service.insert_note(note("A")).unwrap();
        service.insert_note(note("B")).unwrap();

        clock.advance(Duration::days(15));
        let outcome = service.clean_expired().unwrap();
        assert_eq!(outcome, BulkOutcome { removed: 2, failed: 0 });
        assert!(service.list().unwrap().items.is_empty());
    }

    #[test]
    fn test_remove_twice_is_not_found() {
        let (_dir, service, _clock) = test_service(1024);
        let item = service.insert_note(note("x")).unwrap();
        service.remove(&item.id).unwrap();
        assert!(service.list().unwrap().items.iter().all(|i| i.id != item.id));
        assert_eq!(service.remove(&item.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(service.download(&item.id).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
