//! Prepared driver: cached statements with bound parameters

use super::{
    count_sql, counts_from_row, quote_ident, release, schema_sql, single_value, sqlite_encoding,
    Column, Driver, Field, Location, Operator, SessionCounts, SessionRecord, StorageAdapter,
};
use crate::config::DatabaseConfig;
use crate::error::{Result, SessionError};
use rusqlite::types::{ToSqlOutput, Value as SqlValue};
use rusqlite::{params, Connection, ToSql};

const DRIVER: Driver = Driver::Prepared;
const STATEMENT_CACHE: usize = 16;

impl ToSql for Field {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        match self {
            Field::Int(i) => i.to_sql(),
            Field::Text(s) => s.to_sql(),
        }
    }
}

/// Statement-based adapter; no value is ever spliced into SQL text
pub struct PreparedAdapter {
    conn: Option<Connection>,
    table: String,
    dsn: String,
}

impl PreparedAdapter {
    pub fn connect(config: &DatabaseConfig) -> Result<Self> {
        let location = Location::resolve(config);
        let dsn = match config.port {
            Some(port) => format!("sqlite:{};port={}", location.display(), port),
            None => format!("sqlite:{}", location.display()),
        };
        log::debug!("{} - opening {} as {}", DRIVER, dsn, config.user_label());

        let conn = location.open(DRIVER)?;
        conn.set_prepared_statement_cache_capacity(STATEMENT_CACHE);

        // Applied once right after connecting, like a driver init command.
        if let Some(charset) = config.charset.as_deref().filter(|c| !c.is_empty()) {
            let encoding = sqlite_encoding(charset).ok_or_else(|| {
                SessionError::connection(DRIVER, format!("Error loading character set {}", charset))
            })?;
            conn.pragma_update(None, "encoding", encoding)
                .map_err(|e| SessionError::connection(DRIVER, e))?;
        }

        Ok(Self { conn: Some(conn), table: config.table.clone(), dsn })
    }

    /// Connection string used for diagnostics; never contains credentials
    pub fn dsn(&self) -> &str {
        &self.dsn
    }

    fn conn(&self) -> Result<&Connection> {
        self.conn.as_ref().ok_or(SessionError::Closed)
    }
}

impl StorageAdapter for PreparedAdapter {
    fn driver(&self) -> Driver {
        DRIVER
    }

    fn select_single(&self, column: Column, id: &str) -> Result<Option<Field>> {
        let sql = format!(
            "SELECT {} FROM {} WHERE {} = ?1 LIMIT 2",
            quote_ident(column.name()),
            quote_ident(&self.table),
            quote_ident(Column::Id.name())
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(|e| SessionError::query(DRIVER, e))?;
        let rows = stmt
            .query_map([id], |row| row.get::<_, SqlValue>(0))
            .map_err(|e| SessionError::query(DRIVER, e))?;
        single_value(rows).map_err(|e| SessionError::query(DRIVER, e))
    }

    fn delete_where(&self, column: Column, op: Operator, value: &Field) -> Result<usize> {
        let sql = format!(
            "DELETE FROM {} WHERE {} {} ?1",
            quote_ident(&self.table),
            quote_ident(column.name()),
            op.as_sql()
        );
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(|e| SessionError::query(DRIVER, e))?;
        stmt.execute([value]).map_err(|e| SessionError::query(DRIVER, e))
    }

    fn upsert(&self, record: &SessionRecord) -> Result<()> {
        let sql = format!("REPLACE INTO {} VALUES (?1, ?2, ?3, ?4, ?5)", quote_ident(&self.table));
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(|e| SessionError::query(DRIVER, e))?;
        stmt.execute(params![
            record.id,
            record.user_id,
            record.expire_at,
            record.encrypted_data,
            record.key
        ])
        .map_err(|e| SessionError::query(DRIVER, e))?;
        Ok(())
    }

    /// Bound parameters need no escaping
    fn escape(&self, value: &str) -> Result<String> {
        Ok(value.to_string())
    }

    fn count_active(&self, now: i64) -> Result<SessionCounts> {
        let sql = count_sql(&self.table, "?1");
        let conn = self.conn()?;
        let mut stmt = conn.prepare_cached(&sql).map_err(|e| SessionError::query(DRIVER, e))?;
        stmt.query_row([now], counts_from_row).map_err(|e| SessionError::query(DRIVER, e))
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
        if let Some(conn) = self.conn.as_ref() {
            conn.flush_prepared_statement_cache();
        }
        release(self.conn.take(), DRIVER)
    }
}
