//! ItemStore: content files on disk, metadata in SQLite
//!
//! Each item owns exactly one content file under `notes/` or `files/`,
//! named by its id, and one row in the `items` table. The row is the
//! source of truth for metadata, the file for content. Writes go file
//! first, then row; removals go row first, then file. `reconcile` repairs
//! whatever a crash between the two steps leaves behind.

use chrono::{DateTime, Utc};
use copypasta_types::{BulkOutcome, Item, ItemStats, ItemType};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use super::file_ops;
use crate::clock::Clock;
use crate::config::{Config, InsertPosition, ListOrder};
use crate::db::sqlite::{is_constraint_violation, is_storable_time};
use crate::db::Database;
use crate::error::StoreError;

/// Bodies larger than this are left out of listings and served by download
pub const INLINE_CONTENT_LIMIT: u64 = 1024 * 1024;

/// Upper bound on id collision retries within one millisecond
const MAX_ID_ATTEMPTS: u32 = 64;

/// An item to be stored; the store assigns `id` and `order`
#[derive(Debug, Clone)]
pub struct NewItem {
    pub item_type: ItemType,
    pub body: Vec<u8>,
    pub file_name: Option<String>,
    pub file_type: Option<String>,
    pub is_text: bool,
    pub language: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// What `reconcile` cleaned up
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileReport {
    pub orphaned_records: usize,
    pub orphaned_files: usize,
    pub temp_files: usize,
}

pub struct ItemStore {
    notes_dir: PathBuf,
    files_dir: PathBuf,
    db: Arc<Database>,
    clock: Arc<dyn Clock>,
    max_content_bytes: u64,
    insert_position: InsertPosition,
}

impl ItemStore {
    /// Create a store over existing directories and an open database
    pub fn new(
        notes_dir: PathBuf,
        files_dir: PathBuf,
        db: Arc<Database>,
        clock: Arc<dyn Clock>,
        max_content_bytes: u64,
        insert_position: InsertPosition,
    ) -> Result<Self, StoreError> {
        std::fs::create_dir_all(&notes_dir)?;
        std::fs::create_dir_all(&files_dir)?;

        Ok(Self {
            notes_dir,
            files_dir,
            db,
            clock,
            max_content_bytes,
            insert_position,
        })
    }

    /// Open the store described by `config`, creating directories and the database
    pub fn open(config: &Config, clock: Arc<dyn Clock>) -> Result<Self, StoreError> {
        let db = Arc::new(Database::new(&config.database_path())?);
        Self::new(
            config.notes_dir(),
            config.files_dir(),
            db,
            clock,
            config.max_upload_bytes,
            config.insert_position,
        )
    }

    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    pub fn max_content_bytes(&self) -> u64 {
        self.max_content_bytes
    }

    fn dir_for(&self, item_type: ItemType) -> &Path {
        match item_type {
            ItemType::Note => &self.notes_dir,
            ItemType::File => &self.files_dir,
        }
    }

    /// Location of an item's backing file
    pub fn content_path(&self, item: &Item) -> PathBuf {
        self.dir_for(item.item_type).join(&item.id)
    }

    fn check_size(&self, size: u64) -> Result<(), StoreError> {
        if size > self.max_content_bytes {
            return Err(StoreError::TooLarge {
                size,
                limit: self.max_content_bytes,
            });
        }
        Ok(())
    }

    /// Persist a new item: content file first, then its record.
    pub fn insert(&self, new: NewItem) -> Result<Item, StoreError> {
        let size = new.body.len() as u64;
        self.check_size(size)?;
        if !is_storable_time(&new.created_at) || !is_storable_time(&new.expires_at) {
            return Err(StoreError::Invalid("Timestamps must fall between years 0000 and 9999".to_string()));
        }
        if new.expires_at <= new.created_at {
            return Err(StoreError::Invalid("expiresAt must be after createdAt".to_string()));
        }

        let dir = self.dir_for(new.item_type).to_path_buf();
        let millis = new.created_at.timestamp_millis();
        let file_name = match new.item_type {
            ItemType::File => new.file_name.as_deref(),
            ItemType::Note => None,
        };

        for attempt in 0..MAX_ID_ATTEMPTS {
            let id = file_ops::item_id(millis, attempt, file_name);
            let path = dir.join(&id);

            match file_ops::create_new(&path, &new.body) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }

            let mut item = Item {
                id,
                item_type: new.item_type,
                content: None,
                file_name: match new.item_type {
                    ItemType::File => new.file_name.clone(),
                    ItemType::Note => None,
                },
                file_type: match new.item_type {
                    ItemType::File => new.file_type.clone(),
                    ItemType::Note => None,
                },
                is_text: match new.item_type {
                    ItemType::File => Some(new.is_text),
                    ItemType::Note => None,
                },
                language: new.language.clone(),
                original_size: size,
                created_at: new.created_at,
                expires_at: new.expires_at,
                order: 0,
            };

            match self.db.insert_item(&item, self.insert_position) {
                Ok(order) => {
                    item.order = order;
                    item.content = self.inline_content(&item);
                    log::info!("[STORE] Saved {} {} ({} bytes)", item.item_type.as_str(), item.id, size);
                    return Ok(item);
                }
                Err(e) => {
                    file_ops::remove_if_exists(&path).ok();
                    if is_constraint_violation(&e) {
                        // Same id already recorded for the other item type
                        continue;
                    }
                    return Err(e.into());
                }
            }
        }

        Err(StoreError::Invalid(format!(
            "Could not allocate a unique id after {} attempts",
            MAX_ID_ATTEMPTS
        )))
    }

    /// Read the body for listing, when it is text and small enough
    fn inline_content(&self, item: &Item) -> Option<String> {
        if item.is_binary() || item.original_size > INLINE_CONTENT_LIMIT {
            return None;
        }
        match std::fs::read_to_string(self.content_path(item)) {
            Ok(content) => Some(content),
            Err(e) => {
                log::warn!("[STORE] Could not read content of {}: {}", item.id, e);
                None
            }
        }
    }

    /// All items, with inline content, in the requested order
    pub fn list(&self, order: ListOrder) -> Result<Vec<Item>, StoreError> {
        let mut items = self.db.list_items(order)?;
        for item in items.iter_mut() {
            item.content = self.inline_content(item);
        }
        Ok(items)
    }

    /// A single item with inline content
    pub fn get(&self, id: &str) -> Result<Item, StoreError> {
        let mut item = self
            .db
            .get_item(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        item.content = self.inline_content(&item);
        Ok(item)
    }

    /// Record only, no content read
    pub fn get_record(&self, id: &str) -> Result<Item, StoreError> {
        self.db
            .get_item(id)?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))
    }

    /// Delete an item's record and backing file
    pub fn remove(&self, id: &str) -> Result<Item, StoreError> {
        let item = self.get_record(id)?;

        if !self.db.delete_item(id)? {
            // Lost a race with another delete
            return Err(StoreError::NotFound(id.to_string()));
        }

        let path = self.content_path(&item);
        match file_ops::remove_if_exists(&path) {
            Ok(true) => log::info!("[STORE] Removed {} {}", item.item_type.as_str(), id),
            Ok(false) => log::warn!("[STORE] Removed {} {} (content file was already missing)", item.item_type.as_str(), id),
            Err(e) => {
                log::error!("[STORE] Record {} removed but file {:?} could not be deleted: {}", id, path, e);
                return Err(e.into());
            }
        }

        Ok(item)
    }

    /// Remove every item one by one. When all removals succeed the storage
    /// directories are recreated empty; otherwise the survivors are left in place.
    pub fn remove_all(&self) -> Result<BulkOutcome, StoreError> {
        let items = self.db.list_items(ListOrder::Manual)?;
        let mut outcome = BulkOutcome::default();

        for item in items {
            match self.remove(&item.id) {
                Ok(_) => outcome.removed += 1,
                Err(StoreError::NotFound(_)) => {}
                Err(e) => {
                    log::warn!("[STORE] Failed to remove {}: {}", item.id, e);
                    outcome.failed += 1;
                }
            }
        }

        if outcome.is_complete() {
            for dir in [&self.notes_dir, &self.files_dir] {
                if let Err(e) = file_ops::reset_dir(dir) {
                    log::warn!("[STORE] Failed to reset {:?}: {}", dir, e);
                }
            }
        }

        log::info!("[STORE] Remove all: {} removed, {} failed", outcome.removed, outcome.failed);
        Ok(outcome)
    }

    /// Set `order` from position in `ids`; unknown ids are ignored
    pub fn reorder(&self, ids: &[String]) -> Result<usize, StoreError> {
        let updated = self.db.reorder_items(ids)?;
        log::debug!("[STORE] Reordered {} of {} ids", updated, ids.len());
        Ok(updated)
    }

    /// Overwrite an item's content in place and update its record
    pub fn update_content(&self, id: &str, content: &str, language: &str) -> Result<Item, StoreError> {
        let mut item = self.get_record(id)?;
        if item.is_binary() {
            return Err(StoreError::Invalid("Binary files cannot be edited".to_string()));
        }

        let size = content.len() as u64;
        self.check_size(size)?;

        file_ops::replace(&self.content_path(&item), content.as_bytes())?;
        if !self.db.update_item_content(id, language, size)? {
            return Err(StoreError::NotFound(id.to_string()));
        }

        item.language = language.to_string();
        item.original_size = size;
        item.content = self.inline_content(&item);
        log::info!("[STORE] Updated {} ({} bytes)", id, size);
        Ok(item)
    }

    /// Items whose expiry lies strictly before `now`
    pub fn expired(&self, now: &DateTime<Utc>) -> Result<Vec<Item>, StoreError> {
        Ok(self.db.list_expired_items(now)?)
    }

    pub fn stats(&self) -> Result<ItemStats, StoreError> {
        Ok(self.db.item_stats()?)
    }

    /// Bring files and records back into one-to-one correspondence:
    /// records without a file are dropped, files without a record are
    /// deleted, and interrupted replacements are cleaned up.
    pub fn reconcile(&self) -> Result<ReconcileReport, StoreError> {
        let mut report = ReconcileReport::default();

        let records = self.db.list_items(ListOrder::Manual)?;
        let mut known: std::collections::HashSet<PathBuf> = std::collections::HashSet::new();

        for item in &records {
            let path = self.content_path(item);
            if path.is_file() {
                known.insert(path);
            } else {
                log::warn!("[STORE] Dropping record {} with missing content file", item.id);
                self.db.delete_item(&item.id)?;
                report.orphaned_records += 1;
            }
        }

        for dir in [&self.notes_dir, &self.files_dir] {
            for path in file_ops::list_item_files(dir)? {
                if !known.contains(&path) {
                    log::warn!("[STORE] Deleting orphaned file {:?}", path);
                    file_ops::remove_if_exists(&path)?;
                    report.orphaned_files += 1;
                }
            }
            for path in file_ops::list_temp_files(dir)? {
                file_ops::remove_if_exists(&path)?;
                report.temp_files += 1;
            }
        }

        log::info!(
            "[STORE] Reconciled: {} orphaned records, {} orphaned files, {} temp files",
            report.orphaned_records,
            report.orphaned_files,
            report.temp_files
        );
        Ok(report)
    }
}
