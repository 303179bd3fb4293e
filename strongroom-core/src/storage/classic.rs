//! Classic driver: literal SQL with client-side escaping

use super::{
    count_sql, counts_from_row, quote_ident, release, schema_sql, single_value, sqlite_encoding,
    Column, Driver, Field, Location, Operator, SessionCounts, SessionRecord, StorageAdapter,
};
use crate::config::DatabaseConfig;
use crate::error::{Result, SessionError};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;

const DRIVER: Driver = Driver::Classic;

/// Direct connection issuing composed SQL strings
pub struct ClassicAdapter {
    conn: Option<Connection>,
    table: String,
}

impl ClassicAdapter {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let location = Location::resolve(config);
        log::debug!("{} - opening {} as {}", DRIVER, location.display(), config.user_label());
        let conn = location.open(DRIVER)?;
        let adapter = Self { conn: Some(conn), table: config.table.clone() };

        if let Some(charset) = config.charset.as_deref().filter(|c| !c.is_empty()) {
            let encoding = sqlite_encoding(charset).ok_or_else(|| {
                SessionError::connection(DRIVER, format!("Error loading character set {}", charset))
            })?;
            let sql = format!("PRAGMA encoding = '{}'", adapter.escape(encoding)?);
            adapter.conn()?.execute_batch(&sql).map_err(|e| SessionError::connection(DRIVER, e))?;
        }
        Ok(adapter)
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SessionError::Closed)
    }

    fn literal(&self, value: &Field) -> Result<String> {
        match value {
            Field::Int(i) => Ok(i.to_string()),
            Field::Text(s) => Ok(format!("'{}'", self.escape(s)?)),
        }
    }
}

impl StorageAdapter for ClassicAdapter {
    fn driver(&self) -> Driver {
        DRIVER
    }

    fn select_single(&self, column: Column, id: &str) -> Result<Option<Field>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = '{}' LIMIT 2",
            quote_ident(column.name()),
            quote_ident(&self.table),
            quote_ident(Column::Id.name()),
            self.escape(id)?
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(|e| SessionError::query(DRIVER, e))?;
        let rows = stmt
            .query_map([], |row| row.get::<_, SqlValue>(0))
            .map_err(|e| SessionError::query(DRIVER, e))?;
        single_value(rows).map_err(|e| SessionError::query(DRIVER, e))
    }

    fn delete_where(&self, column: Column, op: Operator, value: &Field) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} {} {}",
            quote_ident(&self.table),
            quote_ident(column.name()),
            op.as_sql(),
            self.literal(value)?
        );
        self.conn()?.execute(&sql, []).map_err(|e| SessionError::query(DRIVER, e))
    }

    fn upsert(&self, record: &SessionRecord) -> Result<()> {
        let values = record
            .fields()
            .iter()
            .map(|field| self.literal(field))
            .collect::<Result<Vec<_>>>()?;
        let sql =
            format!("REPLACE INTO {} VALUES ({})", quote_ident(&self.table), values.join(", "));
        self.conn()?.execute(&sql, []).map_err(|e| SessionError::query(DRIVER, e))?;
        Ok(())
    }

    fn escape(&self, value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(SessionError::query(DRIVER, "value contains a NUL byte"));
        }
        Ok(value.replace('\'', "''"))
    }

    fn count_active(&self, now: i64) -> Result<SessionCounts> {
        let sql = count_sql(&self.table, &now.to_string());
        self.conn()?
            .query_row(&sql, [], counts_from_row)
            .map_err(|e| SessionError::query(DRIVER, e))
    }

    fn create_table(&self) -> Result<()> {
        self.conn()?
            .execute_batch(&schema_sql(&self.table))
            .map_err(|e| SessionError::query(DRIVER, e))
    }

    fn is_open(&self) -> bool {
        self.conn.is_some()
    }

    fn close(&mut self) -> bool {
        release(self.conn.take(), DRIVER)
    }
}
