use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::{Creation, CreationParams, CreationPatch, CreationType};
use crate::scope::{json_column, uuid_column, Scope, Table};

const COLUMNS: &str = "id, name, type, created_at, updated_at, params, is_translated, \
                       image_id, original_image_id, output_id";

impl Scope<'_> {
    /// Insert a creation. Fails if the id already exists.
    pub fn add_creation(&self, creation: &Creation) -> Result<()> {
        self.begin_write(Table::Creations)?;
        insert(self, "INSERT", creation)
            .map_err(|e| StoreError::from_insert(e, Table::Creations.name(), creation.id))
    }

    /// Insert or replace a creation keyed by id.
    pub fn put_creation(&self, creation: &Creation) -> Result<()> {
        self.begin_write(Table::Creations)?;
        insert(self, "INSERT OR REPLACE", creation)?;
        Ok(())
    }

    pub fn bulk_add_creations(&self, creations: &[Creation]) -> Result<usize> {
        for creation in creations {
            self.add_creation(creation)?;
        }
        Ok(creations.len())
    }

    pub fn bulk_put_creations(&self, creations: &[Creation]) -> Result<usize> {
        for creation in creations {
            self.put_creation(creation)?;
        }
        Ok(creations.len())
    }

    pub fn get_creation(&self, id: Uuid) -> Result<Option<Creation>> {
        let creation = self
            .conn()
            .query_row(
                &format!("SELECT {COLUMNS} FROM creations WHERE id = ?1"),
                params![id.to_string()],
                row_to_creation,
            )
            .optional()?;
        Ok(creation)
    }

    /// All creations, newest first.
    pub fn list_creations(&self) -> Result<Vec<Creation>> {
        let mut stmt = self.conn().prepare(&format!(
            "SELECT {COLUMNS} FROM creations ORDER BY created_at DESC, rowid DESC"
        ))?;

        let rows = stmt.query_map([], row_to_creation)?;

        let mut creations = Vec::new();
        for row in rows {
            creations.push(row?);
        }
        Ok(creations)
    }

    /// Apply a partial update and bump `updated_at`. Fails if the id is absent.
    pub fn update_creation(&self, id: Uuid, patch: &CreationPatch, updated_at: i64) -> Result<()> {
        self.begin_write(Table::Creations)?;

        let params_json = patch
            .params
            .as_ref()
            .map(|p| p.to_value().map(|v| v.to_string()))
            .transpose()?;

        let affected = self.conn().execute(
            "UPDATE creations SET
                name          = COALESCE(?2, name),
                params        = COALESCE(?3, params),
                is_translated = COALESCE(?4, is_translated),
                image_id      = COALESCE(?5, image_id),
                output_id     = COALESCE(?6, output_id),
                updated_at    = ?7
             WHERE id = ?1",
            params![
                id.to_string(),
                patch.name,
                params_json,
                patch.is_translated,
                patch.image_id.map(|i| i.to_string()),
                patch.output_id.map(|i| i.to_string()),
                updated_at,
            ],
        )?;

        if affected == 0 {
            return Err(StoreError::not_found(Table::Creations.name(), id));
        }
        Ok(())
    }

    /// Delete a creation row. Returns `false` if it was already gone.
    pub fn delete_creation(&self, id: Uuid) -> Result<bool> {
        self.begin_write(Table::Creations)?;
        let affected = self
            .conn()
            .execute("DELETE FROM creations WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn insert(scope: &Scope<'_>, verb: &str, creation: &Creation) -> rusqlite::Result<()> {
    let params_json = creation
        .params
        .to_value()
        .map_err(|e| rusqlite::Error::ToSqlConversionFailure(Box::new(e)))?
        .to_string();

    scope.conn().execute(
        &format!("{verb} INTO creations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
        params![
            creation.id.to_string(),
            creation.name,
            creation.kind().as_str(),
            creation.created_at,
            creation.updated_at,
            params_json,
            creation.is_translated,
            creation.image_id.map(|i| i.to_string()),
            creation.original_image_id.map(|i| i.to_string()),
            creation.output_id.map(|i| i.to_string()),
        ],
    )?;
    Ok(())
}

fn row_to_creation(row: &rusqlite::Row<'_>) -> rusqlite::Result<Creation> {
    let id_str: String = row.get(0)?;
    let name: String = row.get(1)?;
    let type_str: String = row.get(2)?;
    let created_at: i64 = row.get(3)?;
    let updated_at: i64 = row.get(4)?;
    let params_str: String = row.get(5)?;
    let is_translated: bool = row.get(6)?;
    let image_id: Option<String> = row.get(7)?;
    let original_image_id: Option<String> = row.get(8)?;
    let output_id: Option<String> = row.get(9)?;

    let kind: CreationType = type_str.parse().map_err(|e: StoreError| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let params = CreationParams::from_value(kind, json_column(5, &params_str)?).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(Creation {
        id: uuid_column(0, &id_str)?,
        name,
        params,
        created_at,
        updated_at,
        is_translated,
        image_id: image_id.as_deref().map(|s| uuid_column(7, s)).transpose()?,
        original_image_id: original_image_id
            .as_deref()
            .map(|s| uuid_column(8, s))
            .transpose()?,
        output_id: output_id.as_deref().map(|s| uuid_column(9, s)).transpose()?,
    })
}
