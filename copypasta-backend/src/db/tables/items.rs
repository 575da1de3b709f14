//! Item metadata operations

use chrono::{DateTime, Utc};
use copypasta_types::{Item, ItemStats, ItemType};
use rusqlite::types::Type;
use rusqlite::{params, OptionalExtension, Result as SqliteResult, Row};

use super::super::sqlite::{from_db_time, to_db_time};
use super::super::Database;
use crate::config::{InsertPosition, ListOrder};

const ITEM_COLUMNS: &str = "id, item_type, file_name, file_type, is_text, language, original_size, created_at, expires_at, sort_order";

fn row_to_item(row: &Row) -> SqliteResult<Item> {
    let type_str: String = row.get(1)?;
    let item_type = ItemType::parse(&type_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(1, Type::Text, format!("unknown item type: {}", type_str).into())
    })?;
    let original_size: i64 = row.get(6)?;
    let created_at: String = row.get(7)?;
    let expires_at: String = row.get(8)?;

    Ok(Item {
        id: row.get(0)?,
        item_type,
        content: None,
        file_name: row.get(2)?,
        file_type: row.get(3)?,
        is_text: row.get(4)?,
        language: row.get(5)?,
        original_size: original_size.max(0) as u64,
        created_at: from_db_time(&created_at, 7)?,
        expires_at: from_db_time(&expires_at, 8)?,
        order: row.get(9)?,
    })
}

impl Database {
    /// Insert an item record, assigning its `order` from the current extremes.
    /// The read of MIN/MAX and the insert happen under one lock, so two
    /// concurrent inserts never receive the same order value.
    pub fn insert_item(&self, item: &Item, position: InsertPosition) -> SqliteResult<i64> {
        let conn = self.conn();

        let order: i64 = match position {
            InsertPosition::Top => {
                conn.query_row("SELECT COALESCE(MIN(sort_order) - 1, 0) FROM items", [], |row| row.get(0))?
            }
            InsertPosition::Bottom => {
                conn.query_row("SELECT COALESCE(MAX(sort_order) + 1, 0) FROM items", [], |row| row.get(0))?
            }
        };

        conn.execute(
            "INSERT INTO items (id, item_type, file_name, file_type, is_text, language, original_size,
             created_at, expires_at, sort_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.item_type.as_str(),
                item.file_name,
                item.file_type,
                item.is_text,
                item.language,
                item.original_size as i64,
                to_db_time(&item.created_at),
                to_db_time(&item.expires_at),
                order,
            ],
        )?;

        Ok(order)
    }

    /// Get a single item record (without content)
    pub fn get_item(&self, id: &str) -> SqliteResult<Option<Item>> {
        let conn = self.conn();
        conn.query_row(
            &format!("SELECT {} FROM items WHERE id = ?1", ITEM_COLUMNS),
            [id],
            row_to_item,
        )
        .optional()
    }

    /// List all item records in the requested order
    pub fn list_items(&self, order: ListOrder) -> SqliteResult<Vec<Item>> {
        let conn = self.conn();
        let order_by = match order {
            ListOrder::Manual => "sort_order ASC, created_at DESC, id ASC",
            ListOrder::Newest => "created_at DESC, id DESC",
        };

        let mut stmt = conn.prepare(&format!("SELECT {} FROM items ORDER BY {}", ITEM_COLUMNS, order_by))?;
        let items = stmt
            .query_map([], row_to_item)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    /// Items whose expiry lies strictly before `now`
    pub fn list_expired_items(&self, now: &DateTime<Utc>) -> SqliteResult<Vec<Item>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {} FROM items WHERE expires_at < ?1 ORDER BY expires_at ASC",
            ITEM_COLUMNS
        ))?;
        let items = stmt
            .query_map([to_db_time(now)], row_to_item)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(items)
    }

    /// Update language and size after the backing file was rewritten
    pub fn update_item_content(&self, id: &str, language: &str, original_size: u64) -> SqliteResult<bool> {
        let conn = self.conn();
        let rows = conn.execute(
            "UPDATE items SET language = ?1, original_size = ?2 WHERE id = ?3",
            params![language, original_size as i64, id],
        )?;
        Ok(rows > 0)
    }

    /// Delete an item record
    pub fn delete_item(&self, id: &str) -> SqliteResult<bool> {
        let conn = self.conn();
        let rows = conn.execute("DELETE FROM items WHERE id = ?1", [id])?;
        Ok(rows > 0)
    }

    /// Rewrite `order` to match each id's position in `ids`.
    /// Ids with no record are skipped. Returns the number of rows updated.
    pub fn reorder_items(&self, ids: &[String]) -> SqliteResult<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut updated = 0;
        {
            let mut stmt = tx.prepare("UPDATE items SET sort_order = ?1 WHERE id = ?2")?;
            for (position, id) in ids.iter().enumerate() {
                updated += stmt.execute(params![position as i64, id])?;
            }
        }
        tx.commit()?;
        Ok(updated)
    }

    /// File count, note count and summed size
    pub fn item_stats(&self) -> SqliteResult<ItemStats> {
        let conn = self.conn();
        conn.query_row(
            "SELECT
                COALESCE(SUM(CASE WHEN item_type = 'file' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN item_type = 'note' THEN 1 ELSE 0 END), 0),
                COALESCE(SUM(original_size), 0)
             FROM items",
            [],
            |row| {
                let files: i64 = row.get(0)?;
                let notes: i64 = row.get(1)?;
                let size: i64 = row.get(2)?;
                Ok(ItemStats {
                    file_count: files as usize,
                    note_count: notes as usize,
                    total_size: size.max(0) as u64,
                })
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn note(id: &str, created_at: DateTime<Utc>) -> Item {
        Item {
            id: id.to_string(),
            item_type: ItemType::Note,
            content: None,
            file_name: None,
            file_type: None,
            is_text: None,
            language: "text".to_string(),
            original_size: 5,
            created_at,
            expires_at: created_at + Duration::days(14),
            order: 0,
        }
    }

    #[test]
    fn test_insert_at_top_and_bottom() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        assert_eq!(db.insert_item(&note("a", now), InsertPosition::Top).unwrap(), 0);
        assert_eq!(db.insert_item(&note("b", now), InsertPosition::Top).unwrap(), -1);
        assert_eq!(db.insert_item(&note("c", now), InsertPosition::Bottom).unwrap(), 1);

        let ids: Vec<String> = db
            .list_items(ListOrder::Manual)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["b", "a", "c"]);
    }

    #[test]
    fn test_duplicate_id_is_a_constraint_violation() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        db.insert_item(&note("same", now), InsertPosition::Top).unwrap();
        let err = db.insert_item(&note("same", now), InsertPosition::Top).unwrap_err();
        assert!(crate::db::sqlite::is_constraint_violation(&err));
    }

    #[test]
    fn test_get_and_round_trip_fields() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        let mut file = note("1-a.bin", now);
        file.item_type = ItemType::File;
        file.file_name = Some("a.bin".to_string());
        file.file_type = Some("application/octet-stream".to_string());
        file.is_text = Some(false);
        file.language = "binary".to_string();
        db.insert_item(&file, InsertPosition::Top).unwrap();

        let loaded = db.get_item("1-a.bin").unwrap().unwrap();
        assert_eq!(loaded.item_type, ItemType::File);
        assert_eq!(loaded.is_text, Some(false));
        assert_eq!(loaded.file_name.as_deref(), Some("a.bin"));
        assert_eq!(loaded.created_at.timestamp_millis(), now.timestamp_millis());
        assert!(db.get_item("missing").unwrap().is_none());
    }

    #[test]
    fn test_newest_first_order() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        db.insert_item(&note("old", now - Duration::hours(2)), InsertPosition::Top).unwrap();
        db.insert_item(&note("new", now), InsertPosition::Bottom).unwrap();

        let ids: Vec<String> = db
            .list_items(ListOrder::Newest)
            .unwrap()
            .into_iter()
            .map(|i| i.id)
            .collect();
        assert_eq!(ids, vec!["new", "old"]);
    }

    #[test]
    fn test_expired_query_is_strict() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        db.insert_item(&note("stale", now - Duration::days(20)), InsertPosition::Top).unwrap();
        db.insert_item(&note("fresh", now), InsertPosition::Top).unwrap();

        let expired = db.list_expired_items(&now).unwrap();
        assert_eq!(expired.len(), 1);
        assert_eq!(expired[0].id, "stale");

        let boundary = now - Duration::days(6);
        let expired = db.list_expired_items(&boundary).unwrap();
        assert_eq!(expired.len(), 0);
    }

    #[test]
    fn test_reorder_skips_unknown_ids() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        for id in ["x", "y", "z"] {
            db.insert_item(&note(id, now), InsertPosition::Bottom).unwrap();
        }

        let updated = db
            .reorder_items(&["z".to_string(), "ghost".to_string(), "x".to_string(), "y".to_string()])
            .unwrap();
        assert_eq!(updated, 3);

        let items = db.list_items(ListOrder::Manual).unwrap();
        let seq: Vec<(&str, i64)> = items.iter().map(|i| (i.id.as_str(), i.order)).collect();
        assert_eq!(seq, vec![("z", 0), ("x", 2), ("y", 3)]);
    }

    #[test]
    fn test_update_delete_and_stats() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();
        db.insert_item(&note("n1", now), InsertPosition::Top).unwrap();
        let mut file = note("f1", now);
        file.item_type = ItemType::File;
        file.original_size = 100;
        db.insert_item(&file, InsertPosition::Top).unwrap();

        assert!(db.update_item_content("n1", "rust", 12).unwrap());
        assert!(!db.update_item_content("nope", "rust", 12).unwrap());
        let n1 = db.get_item("n1").unwrap().unwrap();
        assert_eq!(n1.language, "rust");
        assert_eq!(n1.original_size, 12);

        let stats = db.item_stats().unwrap();
        assert_eq!(stats.file_count, 1);
        assert_eq!(stats.note_count, 1);
        assert_eq!(stats.total_size, 112);

        assert!(db.delete_item("n1").unwrap());
        assert!(!db.delete_item("n1").unwrap());
        assert_eq!(db.item_stats().unwrap().note_count, 0);
    }
}
