//! Transaction scopes.
//!
//! Every read and write against the store goes through a [`Scope`]. A scope
//! wraps either a plain connection (read-only) or an open transaction, knows
//! which tables it may write, and records which tables were written so the
//! database can notify live queries once the transaction commits.

use std::cell::RefCell;
use std::collections::BTreeSet;

use rusqlite::Connection;

use crate::error::{Result, StoreError};

/// The three tables of the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Table {
    Creations,
    Images,
    TextOutputs,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Creations, Table::Images, Table::TextOutputs];

    pub fn name(&self) -> &'static str {
        match self {
            Self::Creations => "creations",
            Self::Images => "images",
            Self::TextOutputs => "text_outputs",
        }
    }
}

/// Handle passed to transaction bodies and read closures.
pub struct Scope<'c> {
    conn: &'c Connection,
    writable: Vec<Table>,
    touched: RefCell<BTreeSet<Table>>,
}

impl<'c> Scope<'c> {
    pub(crate) fn read_only(conn: &'c Connection) -> Self {
        Self::writable(conn, &[])
    }

    pub(crate) fn writable(conn: &'c Connection, tables: &[Table]) -> Self {
        Self {
            conn,
            writable: tables.to_vec(),
            touched: RefCell::new(BTreeSet::new()),
        }
    }

    pub(crate) fn conn(&self) -> &Connection {
        self.conn
    }

    /// Check that `table` was declared for this transaction and record the
    /// write.
    pub(crate) fn begin_write(&self, table: Table) -> Result<()> {
        if !self.writable.contains(&table) {
            return Err(StoreError::OutOfScope(table.name()));
        }
        self.touched.borrow_mut().insert(table);
        Ok(())
    }

    pub(crate) fn into_touched(self) -> BTreeSet<Table> {
        self.touched.into_inner()
    }

    /// Delete every row of `table`.
    pub fn clear(&self, table: Table) -> Result<usize> {
        self.begin_write(table)?;
        let affected = self
            .conn
            .execute(&format!("DELETE FROM {}", table.name()), [])?;
        Ok(affected)
    }

    pub fn count(&self, table: Table) -> Result<u64> {
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM {}", table.name()),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }
}

/// Convert a text column into a UUID inside a row mapper.
pub(crate) fn uuid_column(index: usize, value: &str) -> rusqlite::Result<uuid::Uuid> {
    uuid::Uuid::parse_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}

/// Convert a JSON text column inside a row mapper.
pub(crate) fn json_column<T: serde::de::DeserializeOwned>(
    index: usize,
    value: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(value).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(index, rusqlite::types::Type::Text, Box::new(e))
    })
}
