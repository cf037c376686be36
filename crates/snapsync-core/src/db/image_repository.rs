//! Authoritative image repository implementation

use libsql::Connection;

use crate::error::{Error, Result};
use crate::models::{ImageId, ImageRecord, ImageUpdate, NewImage};
use crate::util::now_millis;

/// Trait for authoritative image storage operations (async)
#[allow(async_fn_in_trait)]
pub trait ImageRepository {
    /// Snapshot of every current image, ordered by id
    async fn list_all(&self) -> Result<Vec<ImageRecord>>;

    /// Get an image by ID
    async fn get(&self, id: ImageId) -> Result<Option<ImageRecord>>;

    /// Create an image; the store assigns the id
    async fn create(&self, image: &NewImage) -> Result<ImageRecord>;

    /// Apply a partial update, bumping `updated_at`
    async fn update(&self, id: ImageId, update: &ImageUpdate) -> Result<ImageRecord>;

    /// Hard delete an image
    async fn delete(&self, id: ImageId) -> Result<()>;

    /// Number of images in the store
    async fn count(&self) -> Result<u64>;
}

/// libSQL implementation of `ImageRepository`
pub struct LibSqlImageRepository<'a> {
    conn: &'a Connection,
}

const SELECT_COLUMNS: &str = "SELECT id, filename, size, mime_type, created_at, updated_at FROM images";

impl<'a> LibSqlImageRepository<'a> {
    /// Create a new repository with the given connection
    pub const fn new(conn: &'a Connection) -> Self {
        Self { conn }
    }

    /// Parse an image from a database row
    fn parse_image(row: &libsql::Row) -> Result<ImageRecord> {
        let size: i64 = row.get(2)?;
        Ok(ImageRecord {
            id: ImageId::new(row.get(0)?),
            filename: row.get(1)?,
            size: u64::try_from(size).unwrap_or_default(),
            mime_type: row.get(3)?,
            created_at: row.get(4)?,
            updated_at: row.get(5)?,
        })
    }

    fn size_to_sql(size: u64) -> Result<i64> {
        i64::try_from(size)
            .map_err(|_| Error::InvalidInput(format!("image size {size} is too large")))
    }
}

impl ImageRepository for LibSqlImageRepository<'_> {
    async fn list_all(&self) -> Result<Vec<ImageRecord>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} ORDER BY id ASC"), ())
            .await?;

        let mut images = Vec::new();
        while let Some(row) = rows.next().await? {
            images.push(Self::parse_image(&row)?);
        }
        Ok(images)
    }

    async fn get(&self, id: ImageId) -> Result<Option<ImageRecord>> {
        let mut rows = self
            .conn
            .query(&format!("{SELECT_COLUMNS} WHERE id = ?"), libsql::params![id.value()])
            .await?;

        match rows.next().await? {
            Some(row) => Ok(Some(Self::parse_image(&row)?)),
            None => Ok(None),
        }
    }

    async fn create(&self, image: &NewImage) -> Result<ImageRecord> {
        let image = image.clone().normalized()?;
        let now = now_millis();

        self.conn
            .execute(
                "INSERT INTO images (filename, size, mime_type, created_at, updated_at) VALUES (?, ?, ?, ?, ?)",
                libsql::params![
                    image.filename.clone(),
                    Self::size_to_sql(image.size)?,
                    image.mime_type.clone(),
                    now,
                    now
                ],
            )
            .await?;

        Ok(ImageRecord {
            id: ImageId::new(self.conn.last_insert_rowid()),
            filename: image.filename,
            size: image.size,
            mime_type: image.mime_type,
            created_at: now,
            updated_at: now,
        })
    }

    async fn update(&self, id: ImageId, update: &ImageUpdate) -> Result<ImageRecord> {
        let update = update.clone().normalized()?;
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(id.to_string()))?;

        // Comparator ordering relies on every write moving updated_at forward
        let updated_at = now_millis().max(existing.updated_at + 1);
        let updated = ImageRecord {
            filename: update.filename.unwrap_or(existing.filename),
            size: update.size.unwrap_or(existing.size),
            mime_type: update.mime_type.unwrap_or(existing.mime_type),
            updated_at,
            ..existing
        };

        let rows = self
            .conn
            .execute(
                "UPDATE images SET filename = ?, size = ?, mime_type = ?, updated_at = ? WHERE id = ?",
                libsql::params![
                    updated.filename.clone(),
                    Self::size_to_sql(updated.size)?,
                    updated.mime_type.clone(),
                    updated.updated_at,
                    id.value()
                ],
            )
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(updated)
    }

    async fn delete(&self, id: ImageId) -> Result<()> {
        let rows = self
            .conn
            .execute("DELETE FROM images WHERE id = ?", libsql::params![id.value()])
            .await?;

        if rows == 0 {
            return Err(Error::NotFound(id.to_string()));
        }

        Ok(())
    }

    async fn count(&self) -> Result<u64> {
        let mut rows = self.conn.query("SELECT COUNT(*) FROM images", ()).await?;
        let count: i64 = match rows.next().await? {
            Some(row) => row.get(0)?,
            None => 0,
        };
        Ok(u64::try_from(count).unwrap_or_default())
    }
}
