use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::Image;
use crate::scope::{uuid_column, Scope, Table};

impl Scope<'_> {
    pub fn add_image(&self, image: &Image) -> Result<()> {
        self.begin_write(Table::Images)?;
        self.conn()
            .execute(
                "INSERT INTO images (id, image_data_uri) VALUES (?1, ?2)",
                params![image.id.to_string(), image.image_data_uri],
            )
            .map_err(|e| StoreError::from_insert(e, Table::Images.name(), image.id))?;
        Ok(())
    }

    pub fn put_image(&self, image: &Image) -> Result<()> {
        self.begin_write(Table::Images)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO images (id, image_data_uri) VALUES (?1, ?2)",
            params![image.id.to_string(), image.image_data_uri],
        )?;
        Ok(())
    }

    /// Replace the payload of an existing image. Fails if the id is absent.
    pub fn update_image(&self, image: &Image) -> Result<()> {
        self.begin_write(Table::Images)?;
        let affected = self.conn().execute(
            "UPDATE images SET image_data_uri = ?2 WHERE id = ?1",
            params![image.id.to_string(), image.image_data_uri],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(Table::Images.name(), image.id));
        }
        Ok(())
    }

    pub fn bulk_add_images(&self, images: &[Image]) -> Result<usize> {
        for image in images {
            self.add_image(image)?;
        }
        Ok(images.len())
    }

    pub fn bulk_put_images(&self, images: &[Image]) -> Result<usize> {
        self.begin_write(Table::Images)?;
        let mut stmt = self
            .conn()
            .prepare("INSERT OR REPLACE INTO images (id, image_data_uri) VALUES (?1, ?2)")?;
        for image in images {
            stmt.execute(params![image.id.to_string(), image.image_data_uri])?;
        }
        Ok(images.len())
    }

    pub fn get_image(&self, id: Uuid) -> Result<Option<Image>> {
        let image = self
            .conn()
            .query_row(
                "SELECT id, image_data_uri FROM images WHERE id = ?1",
                params![id.to_string()],
                row_to_image,
            )
            .optional()?;
        Ok(image)
    }

    pub fn list_images(&self) -> Result<Vec<Image>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, image_data_uri FROM images ORDER BY rowid")?;

        let rows = stmt.query_map([], row_to_image)?;

        let mut images = Vec::new();
        for row in rows {
            images.push(row?);
        }
        Ok(images)
    }

    // no-op when the row is already gone
    pub fn delete_image(&self, id: Uuid) -> Result<bool> {
        self.begin_write(Table::Images)?;
        let affected = self
            .conn()
            .execute("DELETE FROM images WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_image(row: &rusqlite::Row<'_>) -> rusqlite::Result<Image> {
    let id_str: String = row.get(0)?;
    let image_data_uri: String = row.get(1)?;

    Ok(Image {
        id: uuid_column(0, &id_str)?,
        image_data_uri,
    })
}
