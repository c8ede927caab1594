//! The `VectorStore` contract and the pieces both layouts share.
//!
//! Two implementations are provided:
//! - [`condensed::CondensedLayout`]: one wide row per vector
//! - [`eav::EavLayout`]: one `(vector, attribute, value)` row per attribute

pub mod condensed;
pub mod eav;

use crate::error::{is_missing_table, BenchError, Result};
use crate::query::{self, Ident};
use rusqlite::Connection;

/// Vector ids are assigned on insert, sequentially from 0.
pub type VectorId = u32;

/// Attribute values of one vector, in projection order when read back.
pub type Vector = Vec<f64>;

/// SQLite's default column limit is 2000 and one column goes to the id.
pub const MAX_COLUMNS: u16 = 1999;

/// Ordered, duplicate-free subset of attribute indices selected for reads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Projection {
    attributes: Vec<u16>,
}

impl Projection {
    /// Validate `attributes` against a layout with `column_count` attributes.
    pub fn new(attributes: impl Into<Vec<u16>>, column_count: u16) -> Result<Self> {
        let attributes = attributes.into();
        if attributes.is_empty() {
            return Err(BenchError::InvalidProjection(
                "at least one attribute must be selected".to_string(),
            ));
        }
        let mut seen = vec![false; column_count as usize];
        for &attr in &attributes {
            let Some(slot) = seen.get_mut(attr as usize) else {
                return Err(BenchError::InvalidProjection(format!(
                    "attribute {attr} is outside 0..{column_count}"
                )));
            };
            if *slot {
                return Err(BenchError::InvalidProjection(format!(
                    "attribute {attr} selected twice"
                )));
            }
            *slot = true;
        }
        Ok(Self { attributes })
    }

    /// Every attribute, in natural order.
    pub fn all(column_count: u16) -> Result<Self> {
        Self::new((0..column_count).collect::<Vec<_>>(), column_count)
    }

    pub fn attributes(&self) -> &[u16] {
        &self.attributes
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    /// The values of a full vector that this projection selects, in order.
    pub fn apply(&self, vector: &[f64]) -> Vector {
        self.attributes
            .iter()
            .map(|&attr| vector[attr as usize])
            .collect()
    }

    fn fits(&self, column_count: u16) -> bool {
        self.attributes.iter().all(|&attr| attr < column_count)
    }
}

/// Shape of a layout: how many attributes a vector has and which are read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaSpec {
    column_count: u16,
    projection: Projection,
}

impl SchemaSpec {
    pub fn new(column_count: u16, projection: Projection) -> Result<Self> {
        if column_count == 0 || column_count > MAX_COLUMNS {
            return Err(BenchError::InvalidProjection(format!(
                "column count {column_count} is outside 1..={MAX_COLUMNS}"
            )));
        }
        if !projection.fits(column_count) {
            return Err(BenchError::InvalidProjection(format!(
                "projection {:?} does not fit {column_count} columns",
                projection.attributes()
            )));
        }
        Ok(Self {
            column_count,
            projection,
        })
    }

    pub fn column_count(&self) -> u16 {
        self.column_count
    }

    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Same column count, different projection.
    pub fn with_projection(&self, projection: Projection) -> Result<Self> {
        Self::new(self.column_count, projection)
    }

    /// Validate a full vector before it reaches the store.
    pub(crate) fn check_values(&self, values: &[f64]) -> Result<()> {
        if values.len() != self.column_count as usize {
            return Err(BenchError::ArityMismatch {
                expected: self.column_count as usize,
                actual: values.len(),
            });
        }
        reject_nan(values)
    }
}

/// SQLite binds NaN as NULL, which no layout can read back as a value.
pub(crate) fn reject_nan(values: &[f64]) -> Result<()> {
    match values.iter().position(|v| v.is_nan()) {
        Some(position) => Err(BenchError::NanValue { position }),
        None => Ok(()),
    }
}

/// Operations every physical layout supports.
///
/// A layout borrows the connection; the caller owns it and decides when it
/// closes. Reads take `&mut self` because they step the layout's prepared
/// statements.
pub trait VectorStore {
    /// Human-readable name for reports.
    fn name(&self) -> &'static str;

    /// Drop any existing table of this layout, create it afresh and prepare
    /// all statements for `spec`. Ids restart at 0.
    fn create_schema(&mut self, spec: &SchemaSpec) -> Result<()>;

    /// Attach to a table created earlier, without dropping it. The next id is
    /// recovered from the stored data.
    fn open_schema(&mut self, spec: &SchemaSpec) -> Result<()>;

    /// Switch the read projection, re-preparing the read statements.
    fn set_projection(&mut self, projection: Projection) -> Result<()>;

    /// Append one vector and return its id. Values outside a committed
    /// transaction stay pending until [`VectorStore::commit`].
    fn insert(&mut self, values: &[f64]) -> Result<VectorId>;

    /// Projected values of one vector, or `None` when the id is not stored.
    fn get_by_id(&mut self, id: VectorId) -> Result<Option<Vector>>;

    /// Vectors with ids in `from..=to`, ascending.
    fn get_range(&mut self, from: VectorId, to: VectorId) -> Result<Vec<Vector>>;

    /// Every stored vector, ascending by id.
    fn get_all(&mut self) -> Result<Vec<Vector>>;

    /// Number of stored vectors.
    fn vector_count(&mut self) -> Result<u64>;

    fn commit(&mut self) -> Result<()>;

    /// Discard pending writes.
    fn rollback(&mut self) -> Result<()>;

    /// Release all prepared statements. Safe to call repeatedly.
    fn dispose(&mut self);
}

/// Open `path` (or a private in-memory database for `":memory:"`) and apply
/// [`configure_connection`].
pub fn open_connection(path: &str) -> Result<Connection> {
    let conn = if path == ":memory:" {
        Connection::open_in_memory()?
    } else {
        Connection::open(path)?
    };
    configure_connection(&conn)?;
    Ok(conn)
}

/// Tune the connection for a single-writer benchmark run.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         PRAGMA synchronous = NORMAL;
         PRAGMA cache_size = -65536;
         PRAGMA temp_store = MEMORY;",
    )?;
    Ok(())
}

/// Writes go through explicit transactions: the first write after a commit
/// opens one, and nothing becomes durable until [`commit_pending`].
pub(crate) fn begin_if_needed(conn: &Connection) -> rusqlite::Result<()> {
    if conn.is_autocommit() {
        conn.execute_batch("BEGIN")?;
    }
    Ok(())
}

pub(crate) fn commit_pending(conn: &Connection) -> rusqlite::Result<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("COMMIT")?;
    }
    Ok(())
}

pub(crate) fn rollback_pending(conn: &Connection) -> rusqlite::Result<()> {
    if !conn.is_autocommit() {
        conn.execute_batch("ROLLBACK")?;
    }
    Ok(())
}

/// Drop `table`, treating "no such table" as success.
pub(crate) fn drop_existing(conn: &Connection, table: &Ident) -> Result<()> {
    match conn.execute(&query::drop_table(table), []) {
        Ok(_) => {
            log::debug!("dropped existing table {table}");
            Ok(())
        }
        Err(err) if is_missing_table(&err) => {
            log::debug!("table {table} absent, nothing to drop");
            Ok(())
        }
        Err(err) => Err(BenchError::schema(table.as_str(), err)),
    }
}

/// Run the DDL for a fresh table inside its own transaction.
pub(crate) fn recreate_table(conn: &Connection, table: &Ident, ddl: &[String]) -> Result<()> {
    let schema_err = |err| BenchError::schema(table.as_str(), err);

    begin_if_needed(conn).map_err(schema_err)?;
    let created = drop_existing(conn, table).and_then(|()| {
        for statement in ddl {
            conn.execute(statement, []).map_err(schema_err)?;
        }
        Ok(())
    });
    if let Err(err) = created {
        if let Err(rollback_err) = rollback_pending(conn) {
            log::warn!("rollback after failed schema creation of {table} failed: {rollback_err}");
        }
        return Err(err);
    }
    commit_pending(conn).map_err(schema_err)
}

/// Column names of `table` in declaration order; empty if it does not exist.
pub(crate) fn table_columns(conn: &Connection, table: &Ident) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1) ORDER BY cid")?;
    let names = stmt.query_map([table.as_str()], |row| row.get::<_, String>(0))?;
    let mut result = Vec::new();
    for name in names {
        result.push(name?);
    }
    Ok(result)
}

/// Compare a table's columns against what the layout expects.
pub(crate) fn verify_columns(conn: &Connection, table: &Ident, expected: &[Ident]) -> Result<()> {
    let actual = table_columns(conn, table)?;
    if actual.is_empty() {
        return Err(BenchError::SchemaMismatch {
            table: table.as_str().to_string(),
            reason: "table does not exist".to_string(),
        });
    }
    let matches = actual.len() == expected.len()
        && actual
            .iter()
            .zip(expected)
            .all(|(have, want)| have.eq_ignore_ascii_case(want.as_str()));
    if !matches {
        return Err(BenchError::SchemaMismatch {
            table: table.as_str().to_string(),
            reason: format!(
                "expected {} columns, found {:?}",
                expected.len(),
                actual
            ),
        });
    }
    Ok(())
}

/// Ids cross the SQL boundary as `i64`; anything outside `u32` is a store
/// inconsistency rather than a valid id.
pub(crate) fn vector_id_from_sql(raw: i64) -> rusqlite::Result<VectorId> {
    VectorId::try_from(raw).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(0, raw))
}
