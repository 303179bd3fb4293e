//! Storage adapters for the session table
//!
//! Every driver exposes the same [`StorageAdapter`] contract; which one is
//! used is a configuration choice. They differ only internally:
//!
//! - [`Driver::Classic`] composes literal SQL and escapes values itself
//! - [`Driver::Enhanced`] composes literal SQL but asks the connection to
//!   quote values, and sets the charset through a pragma
//! - [`Driver::Prepared`] binds every value through cached prepared
//!   statements, so escaping is a no-op
//!
//! All three speak SQLite through `rusqlite`. The table layout is fixed and
//! positional: `id, id_user, expire, data, skey`.

mod classic;
mod enhanced;
mod prepared;

pub use classic::ClassicAdapter;
pub use enhanced::EnhancedAdapter;
pub use prepared::PreparedAdapter;

use crate::config::DatabaseConfig;
use crate::error::{Result, SessionError};
use rusqlite::types::Value as SqlValue;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Database driver selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Driver {
    /// Direct connection, literal SQL, client-side escaping
    Classic,
    /// Direct connection, literal SQL, connection-side quoting
    Enhanced,
    /// Prepared statements with bound parameters
    Prepared,
}

impl fmt::Display for Driver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Driver::Classic => "CLASSIC",
            Driver::Enhanced => "ENHANCED",
            Driver::Prepared => "PREPARED",
        };
        f.write_str(label)
    }
}

impl FromStr for Driver {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "classic" => Ok(Driver::Classic),
            "enhanced" => Ok(Driver::Enhanced),
            "prepared" => Ok(Driver::Prepared),
            other => Err(SessionError::Configuration(format!("Database driver unknown: '{}'", other))),
        }
    }
}

/// Columns of the session table, in positional order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Column {
    Id,
    UserId,
    Expire,
    Data,
    Key,
}

impl Column {
    pub const ALL: [Column; 5] =
        [Column::Id, Column::UserId, Column::Expire, Column::Data, Column::Key];

    pub fn name(self) -> &'static str {
        match self {
            Column::Id => "id",
            Column::UserId => "id_user",
            Column::Expire => "expire",
            Column::Data => "data",
            Column::Key => "skey",
        }
    }
}

/// Comparison used by [`StorageAdapter::delete_where`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Lt,
    Le,
    Gt,
    Ge,
}

impl Operator {
    pub fn as_sql(self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
        }
    }
}

/// A single column value read from or written to the table
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Field {
    Int(i64),
    Text(String),
}

impl Field {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Field::Text(s) => Some(s),
            Field::Int(_) => None,
        }
    }

    /// Integer view; numeric text is accepted since literal-SQL drivers may
    /// hand integers back as text on loosely typed tables.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Field::Int(i) => Some(*i),
            Field::Text(s) => s.trim().parse().ok(),
        }
    }

    fn from_sql(value: SqlValue) -> Option<Self> {
        match value {
            SqlValue::Null => None,
            SqlValue::Integer(i) => Some(Field::Int(i)),
            SqlValue::Real(f) => Some(Field::Int(f as i64)),
            SqlValue::Text(s) => Some(Field::Text(s)),
            SqlValue::Blob(b) => Some(Field::Text(String::from_utf8_lossy(&b).into_owned())),
        }
    }
}

impl From<i64> for Field {
    fn from(i: i64) -> Self {
        Field::Int(i)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Text(s.to_string())
    }
}

/// The persisted session row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionRecord {
    pub id: String,
    pub user_id: i64,
    pub expire_at: i64,
    /// Base64 ciphertext of the variable buffer
    pub encrypted_data: String,
    pub key: String,
}

impl SessionRecord {
    /// Values in table order
    pub fn fields(&self) -> [Field; 5] {
        [
            Field::Text(self.id.clone()),
            Field::Int(self.user_id),
            Field::Int(self.expire_at),
            Field::Text(self.encrypted_data.clone()),
            Field::Text(self.key.clone()),
        ]
    }
}

/// Unexpired sessions split by authentication state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SessionCounts {
    /// Sessions without a user id
    pub visitors: u64,
    /// Sessions bound to a user id
    pub users: u64,
}

impl SessionCounts {
    pub fn total(&self) -> u64 {
        self.visitors + self.users
    }
}

/// Uniform access to the session table
pub trait StorageAdapter: Send {
    /// Driver implementing this adapter
    fn driver(&self) -> Driver;

    /// Read `column` of the row whose id is `id`.
    ///
    /// Exactly one matching row is expected; zero or several yield `None`.
    fn select_single(&self, column: Column, id: &str) -> Result<Option<Field>>;

    /// Delete rows where `column <op> value`, returning the affected count
    fn delete_where(&self, column: Column, op: Operator, value: &Field) -> Result<usize>;

    /// Insert or fully replace the row for `record.id`
    fn upsert(&self, record: &SessionRecord) -> Result<()>;

    /// Escape a string for inclusion in a quoted SQL literal
    fn escape(&self, value: &str) -> Result<String>;

    /// Count unexpired sessions at `now`
    fn count_active(&self, now: i64) -> Result<SessionCounts>;

    /// Create the session table and its expiry index if missing
    fn create_table(&self) -> Result<()>;

    /// Whether the connection is still open
    fn is_open(&self) -> bool;

    /// Release the connection. Returns `false` if it was already released
    /// or the backend reported an error while closing.
    fn close(&mut self) -> bool;
}

/// Open an adapter for the configured driver
pub fn connect(config: &DatabaseConfig) -> Result<Box<dyn StorageAdapter>> {
    let driver = config
        .driver
        .ok_or_else(|| SessionError::Configuration("Database driver empty".to_string()))?;

    let adapter: Box<dyn StorageAdapter> = match driver {
        Driver::Classic => Box::new(ClassicAdapter::connect(config)?),
        Driver::Enhanced => Box::new(EnhancedAdapter::connect(config)?),
        Driver::Prepared => Box::new(PreparedAdapter::connect(config)?),
    };
    log::debug!("Connected to session table '{}' with {} driver", config.table, driver);
    Ok(adapter)
}

/// Where the database lives
pub(crate) enum Location {
    Memory,
    File(PathBuf),
}

impl Location {
    pub(crate) fn resolve(config: &DatabaseConfig) -> Self {
        if config.host == ":memory:" || config.name == ":memory:" {
            Location::Memory
        } else {
            Location::File(PathBuf::from(&config.host).join(&config.name))
        }
    }

    pub(crate) fn open(&self, driver: Driver) -> Result<Connection> {
        let conn = match self {
            Location::Memory => Connection::open_in_memory(),
            Location::File(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        return Err(SessionError::connection(
                            driver,
                            format!("database directory {} does not exist", parent.display()),
                        ));
                    }
                }
                Connection::open(path)
            }
        };
        conn.map_err(|e| SessionError::connection(driver, e))
    }

    pub(crate) fn display(&self) -> String {
        match self {
            Location::Memory => ":memory:".to_string(),
            Location::File(path) => path.display().to_string(),
        }
    }
}

/// Map a configured charset onto an SQLite text encoding name
pub(crate) fn sqlite_encoding(charset: &str) -> Option<&'static str> {
    match charset.trim().to_ascii_lowercase().replace(['-', '_'], "").as_str() {
        "utf8" | "utf8mb4" => Some("UTF-8"),
        "utf16" => Some("UTF-16"),
        "utf16le" => Some("UTF-16le"),
        "utf16be" => Some("UTF-16be"),
        _ => None,
    }
}

/// Quote an identifier (table or column name)
pub(crate) fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

pub(crate) fn schema_sql(table: &str) -> String {
    format!(
        "CREATE TABLE IF NOT EXISTS {table} (\
            {id} TEXT NOT NULL PRIMARY KEY, \
            {user} INTEGER NOT NULL DEFAULT 0, \
            {expire} INTEGER NOT NULL, \
            {data} TEXT NOT NULL, \
            {key} TEXT NOT NULL\
        ); \
        CREATE INDEX IF NOT EXISTS {index} ON {table} ({expire});",
        table = quote_ident(table),
        index = quote_ident(&format!("{}_expire", table)),
        id = quote_ident(Column::Id.name()),
        user = quote_ident(Column::UserId.name()),
        expire = quote_ident(Column::Expire.name()),
        data = quote_ident(Column::Data.name()),
        key = quote_ident(Column::Key.name()),
    )
}

/// Shared `SELECT` for the visitor/user split; `now` is bound or inlined by the caller
pub(crate) fn count_sql(table: &str, now: &str) -> String {
    format!(
        "SELECT \
            COALESCE(SUM(CASE WHEN {user} > 0 THEN 0 ELSE 1 END), 0), \
            COALESCE(SUM(CASE WHEN {user} > 0 THEN 1 ELSE 0 END), 0) \
         FROM {table} WHERE {expire} > {now}",
        user = quote_ident(Column::UserId.name()),
        expire = quote_ident(Column::Expire.name()),
        table = quote_ident(table),
        now = now,
    )
}

/// Reduce a result set to its single value; any other row count is `None`
pub(crate) fn single_value<I>(rows: I) -> rusqlite::Result<Option<Field>>
where
    I: Iterator<Item = rusqlite::Result<SqlValue>>,
{
    let mut found = None;
    for (index, row) in rows.enumerate() {
        let value = row?;
        if index > 0 {
            return Ok(None);
        }
        found = Some(value);
    }
    Ok(found.and_then(Field::from_sql))
}

pub(crate) fn counts_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<SessionCounts> {
    let visitors: i64 = row.get(0)?;
    let users: i64 = row.get(1)?;
    Ok(SessionCounts { visitors: visitors.max(0) as u64, users: users.max(0) as u64 })
}

/// Close a connection, logging backend errors
pub(crate) fn release(conn: Option<Connection>, driver: Driver) -> bool {
    match conn {
        Some(conn) => match conn.close() {
            Ok(()) => true,
            Err((_, e)) => {
                log::warn!("{} - error while closing connection: {}", driver, e);
                false
            }
        },
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseConfig;

    fn memory_config(driver: Driver) -> DatabaseConfig {
        DatabaseConfig::in_memory().with_driver(driver)
    }

    fn record(id: &str, user_id: i64, expire_at: i64) -> SessionRecord {
        SessionRecord {
            id: id.to_string(),
            user_id,
            expire_at,
            encrypted_data: "Y2lwaGVy".to_string(),
            key: format!("key-{}", id),
        }
    }

    const DRIVERS: [Driver; 3] = [Driver::Classic, Driver::Enhanced, Driver::Prepared];

    #[test]
    fn test_driver_parsing() {
        assert_eq!("classic".parse::<Driver>().unwrap(), Driver::Classic);
        assert_eq!(" Prepared ".parse::<Driver>().unwrap(), Driver::Prepared);
        assert!("mysql".parse::<Driver>().is_err());
        assert_eq!(Driver::Enhanced.to_string(), "ENHANCED");
    }

    #[test]
    fn test_sqlite_encoding() {
        assert_eq!(sqlite_encoding("utf8mb4"), Some("UTF-8"));
        assert_eq!(sqlite_encoding("UTF-16_LE"), Some("UTF-16le"));
        assert_eq!(sqlite_encoding("latin1"), None);
    }

    #[test]
    fn test_quote_ident() {
        assert_eq!(quote_ident("sessions"), "\"sessions\"");
        assert_eq!(quote_ident("we\"ird"), "\"we\"\"ird\"");
    }

    #[test]
    fn test_drivers_behave_identically() {
        for driver in DRIVERS {
            let adapter = connect(&memory_config(driver)).unwrap();
            adapter.create_table().unwrap();
            assert_eq!(adapter.driver(), driver);

            adapter.upsert(&record("abc", 7, 2_000)).unwrap();
            assert_eq!(
                adapter.select_single(Column::UserId, "abc").unwrap().and_then(|f| f.as_int()),
                Some(7),
                "{}",
                driver
            );
            assert_eq!(
                adapter.select_single(Column::Key, "abc").unwrap(),
                Some(Field::Text("key-abc".to_string()))
            );
            assert_eq!(adapter.select_single(Column::Data, "missing").unwrap(), None);

            // Replace semantics: the second write overwrites every column.
            let mut replaced = record("abc", 0, 3_000);
            replaced.key = "other".to_string();
            adapter.upsert(&replaced).unwrap();
            assert_eq!(
                adapter.select_single(Column::Expire, "abc").unwrap().and_then(|f| f.as_int()),
                Some(3_000)
            );
            assert_eq!(
                adapter.select_single(Column::UserId, "abc").unwrap().and_then(|f| f.as_int()),
                Some(0)
            );

            let deleted =
                adapter.delete_where(Column::Id, Operator::Eq, &Field::from("abc")).unwrap();
            assert_eq!(deleted, 1);
            assert_eq!(adapter.select_single(Column::Data, "abc").unwrap(), None);
        }
    }

    #[test]
    fn test_expiry_sweep_counts() {
        for driver in DRIVERS {
            let adapter = connect(&memory_config(driver)).unwrap();
            adapter.create_table().unwrap();
            let now = 10_000;
            adapter.upsert(&record("old", 0, now - 100)).unwrap();
            adapter.upsert(&record("new", 3, now + 100)).unwrap();

            let affected =
                adapter.delete_where(Column::Expire, Operator::Lt, &Field::Int(now)).unwrap();
            assert_eq!(affected, 1, "{}", driver);
            assert!(adapter.select_single(Column::Id, "new").unwrap().is_some());
        }
    }

    #[test]
    fn test_delete_operators_bound_correctly() {
        let cases = [
            (Operator::Eq, 1),
            (Operator::Lt, 1),
            (Operator::Le, 2),
            (Operator::Gt, 1),
            (Operator::Ge, 2),
        ];
        for driver in DRIVERS {
            for (op, expected) in cases {
                let adapter = connect(&memory_config(driver)).unwrap();
                adapter.create_table().unwrap();
                for (id, expire_at) in [("a", 10), ("b", 20), ("c", 30)] {
                    adapter.upsert(&record(id, 0, expire_at)).unwrap();
                }

                let affected = adapter.delete_where(Column::Expire, op, &Field::Int(20)).unwrap();
                assert_eq!(affected, expected, "{} {}", driver, op.as_sql());
            }
        }
    }

    #[test]
    fn test_injection_attempts_are_inert() {
        for driver in DRIVERS {
            let adapter = connect(&memory_config(driver)).unwrap();
            adapter.create_table().unwrap();
            adapter.upsert(&record("victim", 1, 5_000)).unwrap();

            let hostile = "x' OR '1'='1";
            let mut rec = record(hostile, 2, 5_000);
            rec.encrypted_data = "'); DROP TABLE sessions; --".to_string();
            adapter.upsert(&rec).unwrap();

            assert_eq!(
                adapter.select_single(Column::Data, hostile).unwrap(),
                Some(Field::Text("'); DROP TABLE sessions; --".to_string())),
                "{}",
                driver
            );
            let deleted =
                adapter.delete_where(Column::Id, Operator::Eq, &Field::from(hostile)).unwrap();
            assert_eq!(deleted, 1);
            assert!(adapter.select_single(Column::Id, "victim").unwrap().is_some());
        }
    }

    #[test]
    fn test_count_active() {
        for driver in DRIVERS {
            let adapter = connect(&memory_config(driver)).unwrap();
            adapter.create_table().unwrap();
            adapter.upsert(&record("v1", 0, 200)).unwrap();
            adapter.upsert(&record("v2", 0, 200)).unwrap();
            adapter.upsert(&record("u1", 9, 200)).unwrap();
            adapter.upsert(&record("gone", 4, 50)).unwrap();

            let counts = adapter.count_active(100).unwrap();
            assert_eq!(counts, SessionCounts { visitors: 2, users: 1 }, "{}", driver);
            assert_eq!(counts.total(), 3);
        }
    }

    #[test]
    fn test_closed_adapter_reports_closed() {
        for driver in DRIVERS {
            let mut adapter = connect(&memory_config(driver)).unwrap();
            assert!(adapter.is_open());
            assert!(adapter.close());
            assert!(!adapter.is_open());
            assert!(!adapter.close());
            assert!(matches!(
                adapter.select_single(Column::Data, "x"),
                Err(SessionError::Closed)
            ));
        }
    }

    #[test]
    fn test_missing_driver_is_configuration_error() {
        let mut config = DatabaseConfig::in_memory();
        config.driver = None;
        assert!(matches!(connect(&config), Err(SessionError::Configuration(_))));
    }

    #[test]
    fn test_missing_directory_is_connection_error() {
        let mut config = DatabaseConfig::in_memory();
        config.host = "/nonexistent/strongroom/dir".to_string();
        config.name = "s.db".to_string();
        assert!(matches!(connect(&config), Err(SessionError::Connection { .. })));
    }
}
