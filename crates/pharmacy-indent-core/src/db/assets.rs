//! Drug image storage.
//!
//! Assets are stored by path with a SHA-256 etag; the public URL is the
//! configured base joined with the path.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use sha2::{Digest, Sha256};

use super::{Database, DbError, DbResult};

/// A stored asset.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredAsset {
    pub path: String,
    pub bytes: Vec<u8>,
    pub content_type: String,
    pub etag: String,
}

impl Database {
    /// Store bytes at `path`, replacing any previous object, and return its public URL.
    pub fn upload_asset(&self, path: &str, bytes: &[u8]) -> DbResult<String> {
        let etag = hex::encode(Sha256::digest(bytes));
        self.conn.execute(
            r#"
            INSERT INTO assets (path, bytes, content_type, etag)
            VALUES (?1, ?2, ?3, ?4)
            ON CONFLICT(path) DO UPDATE SET
                bytes = excluded.bytes,
                content_type = excluded.content_type,
                etag = excluded.etag
            "#,
            params![path, bytes, content_type_for(path), etag],
        )?;
        tracing::debug!(path, size = bytes.len(), %etag, "asset stored");
        Ok(self.public_url(path))
    }

    /// Fetch a stored asset.
    pub fn get_asset(&self, path: &str) -> DbResult<Option<StoredAsset>> {
        let asset = self
            .conn
            .query_row(
                "SELECT path, bytes, content_type, etag FROM assets WHERE path = ?",
                [path],
                |row| {
                    Ok(StoredAsset {
                        path: row.get(0)?,
                        bytes: row.get(1)?,
                        content_type: row.get(2)?,
                        etag: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(asset)
    }

    /// Public URL of an asset path.
    pub fn public_url(&self, path: &str) -> String {
        format!("{}/{}", self.public_asset_base, path.trim_start_matches('/'))
    }

    /// Upload a picture for an item and point the item at it.
    ///
    /// The object is stored as `{item_id}-{unix millis}.{ext}`, with the
    /// extension taken from `file_name`.
    pub fn attach_item_image(
        &self,
        item_id: &str,
        file_name: &str,
        bytes: &[u8],
        now: DateTime<Utc>,
    ) -> DbResult<String> {
        if self.get_item(item_id)?.is_none() {
            return Err(DbError::NotFound(format!("inventory item {item_id}")));
        }

        let ext = file_name
            .rsplit_once('.')
            .map(|(_, ext)| ext.to_ascii_lowercase())
            .filter(|ext| !ext.is_empty())
            .unwrap_or_else(|| "jpg".to_string());
        let path = format!("{}-{}.{}", item_id, now.timestamp_millis(), ext);

        let url = self.upload_asset(&path, bytes)?;
        self.set_item_image(item_id, &url)?;
        tracing::info!(item_id, %url, "item image updated");
        Ok(url)
    }
}

fn content_type_for(path: &str) -> &'static str {
    let ext = path.rsplit_once('.').map(|(_, e)| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::InventoryItem;
    use chrono::TimeZone;

    #[test]
    fn test_upload_and_fetch_asset() {
        let mut db = Database::open_in_memory().unwrap();
        db.set_public_asset_base("https://backend.test/storage/v1/object/public/drug-images/");

        let url = db.upload_asset("a.png", b"png-bytes").unwrap();
        assert_eq!(url, "https://backend.test/storage/v1/object/public/drug-images/a.png");

        let asset = db.get_asset("a.png").unwrap().unwrap();
        assert_eq!(asset.bytes, b"png-bytes");
        assert_eq!(asset.content_type, "image/png");
        assert_eq!(asset.etag, hex::encode(Sha256::digest(b"png-bytes")));

        // upsert replaces
        db.upload_asset("a.png", b"other").unwrap();
        assert_eq!(db.get_asset("a.png").unwrap().unwrap().bytes, b"other");
    }

    #[test]
    fn test_attach_item_image() {
        let db = Database::open_in_memory().unwrap();
        let item = InventoryItem::new("Salbutamol Inhaler".into());
        db.upsert_item(&item).unwrap();

        let now = Utc.timestamp_millis_opt(1_700_000_000_123).unwrap();
        let url = db.attach_item_image(&item.id, "photo.JPG", b"jpeg", now).unwrap();
        assert!(url.ends_with(&format!("{}-1700000000123.jpg", item.id)));
        assert_eq!(db.get_item(&item.id).unwrap().unwrap().image_url, Some(url));

        let missing = db.attach_item_image("nope", "x.png", b"", now);
        assert!(matches!(missing, Err(DbError::NotFound(_))));
    }
}
