use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::error::{Result, StoreError};
use crate::models::TextOutput;
use crate::scope::{json_column, uuid_column, Scope, Table};

impl Scope<'_> {
    pub fn add_output(&self, output: &TextOutput) -> Result<()> {
        self.begin_write(Table::TextOutputs)?;
        let data = serde_json::to_string(&output.data)?;
        self.conn()
            .execute(
                "INSERT INTO text_outputs (id, data) VALUES (?1, ?2)",
                params![output.id.to_string(), data],
            )
            .map_err(|e| StoreError::from_insert(e, Table::TextOutputs.name(), output.id))?;
        Ok(())
    }

    pub fn put_output(&self, output: &TextOutput) -> Result<()> {
        self.begin_write(Table::TextOutputs)?;
        let data = serde_json::to_string(&output.data)?;
        self.conn().execute(
            "INSERT OR REPLACE INTO text_outputs (id, data) VALUES (?1, ?2)",
            params![output.id.to_string(), data],
        )?;
        Ok(())
    }

    pub fn update_output(&self, output: &TextOutput) -> Result<()> {
        self.begin_write(Table::TextOutputs)?;
        let data = serde_json::to_string(&output.data)?;
        let affected = self.conn().execute(
            "UPDATE text_outputs SET data = ?2 WHERE id = ?1",
            params![output.id.to_string(), data],
        )?;
        if affected == 0 {
            return Err(StoreError::not_found(Table::TextOutputs.name(), output.id));
        }
        Ok(())
    }

    pub fn bulk_add_outputs(&self, outputs: &[TextOutput]) -> Result<usize> {
        for output in outputs {
            self.add_output(output)?;
        }
        Ok(outputs.len())
    }

    pub fn bulk_put_outputs(&self, outputs: &[TextOutput]) -> Result<usize> {
        self.begin_write(Table::TextOutputs)?;
        let mut stmt = self
            .conn()
            .prepare("INSERT OR REPLACE INTO text_outputs (id, data) VALUES (?1, ?2)")?;
        for output in outputs {
            let data = serde_json::to_string(&output.data)?;
            stmt.execute(params![output.id.to_string(), data])?;
        }
        Ok(outputs.len())
    }

    pub fn get_output(&self, id: Uuid) -> Result<Option<TextOutput>> {
        let output = self
            .conn()
            .query_row(
                "SELECT id, data FROM text_outputs WHERE id = ?1",
                params![id.to_string()],
                row_to_output,
            )
            .optional()?;
        Ok(output)
    }

    pub fn list_outputs(&self) -> Result<Vec<TextOutput>> {
        let mut stmt = self
            .conn()
            .prepare("SELECT id, data FROM text_outputs ORDER BY rowid")?;

        let rows = stmt.query_map([], row_to_output)?;

        let mut outputs = Vec::new();
        for row in rows {
            outputs.push(row?);
        }
        Ok(outputs)
    }

    pub fn delete_output(&self, id: Uuid) -> Result<bool> {
        self.begin_write(Table::TextOutputs)?;
        let affected = self
            .conn()
            .execute("DELETE FROM text_outputs WHERE id = ?1", params![id.to_string()])?;
        Ok(affected > 0)
    }
}

fn row_to_output(row: &rusqlite::Row<'_>) -> rusqlite::Result<TextOutput> {
    let id_str: String = row.get(0)?;
    let data_str: String = row.get(1)?;

    Ok(TextOutput {
        id: uuid_column(0, &id_str)?,
        data: json_column(1, &data_str)?,
    })
}
