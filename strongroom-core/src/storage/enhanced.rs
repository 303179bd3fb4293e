//! Enhanced driver: literal SQL quoted by the connection itself

use super::{
    count_sql, counts_from_row, quote_ident, release, schema_sql, single_value, sqlite_encoding,
    Column, Driver, Field, Location, Operator, SessionCounts, SessionRecord, StorageAdapter,
};
use crate::config::DatabaseConfig;
use crate::error::{Result, SessionError};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use std::time::Duration;

const DRIVER: Driver = Driver::Enhanced;
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Direct connection that delegates literal quoting to the database engine
pub struct EnhancedAdapter {
    conn: Option<Connection>,
    table: String,
}

impl EnhancedAdapter {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let location = Location::resolve(config);
        log::debug!("{} - opening {} as {}", DRIVER, location.display(), config.user_label());
        let conn = location.open(DRIVER)?;
        conn.busy_timeout(BUSY_TIMEOUT).map_err(|e| SessionError::connection(DRIVER, e))?;

        if let Some(charset) = config.charset.as_deref().filter(|c| !c.is_empty()) {
            let encoding = sqlite_encoding(charset).ok_or_else(|| {
                SessionError::connection(DRIVER, format!("Error loading character set {}", charset))
            })?;
            conn.pragma_update(None, "encoding", encoding)
                .map_err(|e| SessionError::connection(DRIVER, e))?;
        }

        Ok(Self { conn: Some(conn), table: config.table.clone() })
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SessionError::Closed)
    }

    /// Full quoted literal as produced by the engine
    fn quoted(&self, value: &str) -> Result<String> {
        if value.contains('\0') {
            return Err(SessionError::query(DRIVER, "value contains a NUL byte"));
        }
        self.conn()?
            .query_row("SELECT quote(?1)", [value], |row| row.get::<_, String>(0))
            .map_err(|e| SessionError::query(DRIVER, e))
    }

    fn literal(&self, value: &Field) -> Result<String> {
        match value {
            Field::Int(i) => Ok(i.to_string()),
            Field::Text(s) => self.quoted(s),
        }
    }
}

impl StorageAdapter for EnhancedAdapter {
    fn driver(&self) -> Driver {
        DRIVER
    }

    fn select_single(&self, column: Column, id: &str) -> Result<Option<Field>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = {} LIMIT 2",
            quote_ident(column.name()),
            quote_ident(&self.table),
            quote_ident(Column::Id.name()),
            self.quoted(id)?
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
        let mut values = Vec::with_capacity(5);
        for field in record.fields().iter() {
            values.push(self.literal(field)?);
        }
        let sql =
            format!("REPLACE INTO {} VALUES ({})", quote_ident(&self.table), values.join(", "));
        self.conn()?.execute(&sql, []).map_err(|e| SessionError::query(DRIVER, e))?;
        Ok(())
    }

    /// Engine-quoted text with the surrounding quotes removed
    fn escape(&self, value: &str) -> Result<String> {
        let quoted = self.quoted(value)?;
        Ok(quoted
            .strip_prefix('\'')
            .and_then(|q| q.strip_suffix('\''))
            .unwrap_or(&quoted)
            .to_string())
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
