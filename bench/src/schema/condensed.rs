//! Condensed schema: one wide row per vector, one `REAL` column per attribute.
//!
//! Ids are store-assigned through an `AUTOINCREMENT` key. SQLite hands out
//! rowids from 1, so the public id is `rowid - 1`; the shift happens at the
//! bind/read boundary and nowhere else.

use super::{
    begin_if_needed, commit_pending, recreate_table, reject_nan, rollback_pending,
    vector_id_from_sql, verify_columns, Projection, SchemaSpec, Vector, VectorId, VectorStore,
};
use crate::error::{BenchError, Result};
use crate::query::{self, ColumnDef, CreateTable, Ident, Insert, Select, SqlType, Update};
use rusqlite::{params_from_iter, Connection, OptionalExtension, Row, Statement};

pub const TABLE_NAME: &str = "vectors";
const KEY_COLUMN: &str = "vector_id";
const COLUMN_PREFIX: &str = "C";

fn column_name(attr: u16) -> Result<Ident> {
    Ident::new(&format!("{COLUMN_PREFIX}{attr}"))
}

fn row_id(id: VectorId) -> i64 {
    i64::from(id) + 1
}

struct Statements<'conn> {
    get: Statement<'conn>,
    range: Statement<'conn>,
    full: Statement<'conn>,
    insert: Statement<'conn>,
    update: Statement<'conn>,
    count: Statement<'conn>,
}

impl<'conn> Statements<'conn> {
    fn prepare(conn: &'conn Connection, table: &Ident, spec: &SchemaSpec) -> Result<Self> {
        let key = Ident::new(KEY_COLUMN)?;
        let projected = spec
            .projection()
            .attributes()
            .iter()
            .map(|&attr| column_name(attr))
            .collect::<Result<Vec<_>>>()?;
        let all_columns = (0..spec.column_count())
            .map(column_name)
            .collect::<Result<Vec<_>>>()?;

        let get = Select::from_table(table.clone())
            .columns(projected.clone())
            .where_eq(key.clone())
            .build()?;
        let range = Select::from_table(table.clone())
            .columns(projected.clone())
            .where_between(key.clone())
            .order_by(key.clone())
            .build()?;
        let full = Select::from_table(table.clone())
            .columns(projected.clone())
            .order_by(key.clone())
            .build()?;
        let insert = Insert::into_table(table.clone())
            .columns(all_columns)
            .build()?;
        let update = Update::new(table.clone(), key)
            .columns(projected)
            .build()?;

        Ok(Self {
            get: conn.prepare(&get)?,
            range: conn.prepare(&range)?,
            full: conn.prepare(&full)?,
            insert: conn.prepare(&insert)?,
            update: conn.prepare(&update)?,
            count: conn.prepare(&query::count_rows(table))?,
        })
    }

    fn finalize(self) {
        let Statements {
            get,
            range,
            full,
            insert,
            update,
            count,
        } = self;
        for stmt in [get, range, full, insert, update, count] {
            if let Err(err) = stmt.finalize() {
                log::warn!("failed to finalize condensed statement: {err}");
            }
        }
    }
}

struct Prepared<'conn> {
    spec: SchemaSpec,
    statements: Statements<'conn>,
}

/// Wide-row layout: `vectors(vector_id, C0, C1, ..., C(n-1))`.
pub struct CondensedLayout<'conn> {
    conn: &'conn Connection,
    table: Ident,
    prepared: Option<Prepared<'conn>>,
}

impl<'conn> CondensedLayout<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        Self::with_table(conn, TABLE_NAME)
    }

    pub fn with_table(conn: &'conn Connection, table: &str) -> Result<Self> {
        Ok(Self {
            conn,
            table: Ident::new(table)?,
            prepared: None,
        })
    }

    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Overwrite the projected attributes of one stored vector.
    ///
    /// `values` are given in projection order. Returns `false` when no vector
    /// with that id exists.
    pub fn write_values(&mut self, id: VectorId, values: &[f64]) -> Result<bool> {
        let prepared = self.prepared.as_mut().ok_or(BenchError::NotInitialized)?;
        let expected = prepared.spec.projection().len();
        if values.len() != expected {
            return Err(BenchError::ArityMismatch {
                expected,
                actual: values.len(),
            });
        }
        reject_nan(values)?;

        begin_if_needed(self.conn)?;
        let stmt = &mut prepared.statements.update;
        for (i, value) in values.iter().enumerate() {
            stmt.raw_bind_parameter(i + 1, value)?;
        }
        stmt.raw_bind_parameter(values.len() + 1, row_id(id))?;
        Ok(stmt.raw_execute()? > 0)
    }

    fn prepared(&mut self) -> Result<&mut Prepared<'conn>> {
        self.prepared.as_mut().ok_or(BenchError::NotInitialized)
    }

    fn prepare(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();
        let statements = Statements::prepare(self.conn, &self.table, spec)?;
        self.prepared = Some(Prepared {
            spec: spec.clone(),
            statements,
        });
        Ok(())
    }

    fn expected_columns(&self, column_count: u16) -> Result<Vec<Ident>> {
        let mut columns = vec![Ident::new(KEY_COLUMN)?];
        for attr in 0..column_count {
            columns.push(column_name(attr)?);
        }
        Ok(columns)
    }
}

fn read_vector(row: &Row<'_>, width: usize) -> rusqlite::Result<Vector> {
    let mut values = Vec::with_capacity(width);
    for i in 0..width {
        values.push(row.get::<_, f64>(i)?);
    }
    Ok(values)
}

fn collect_vectors(stmt: &mut Statement<'_>, width: usize, params: &[i64]) -> Result<Vec<Vector>> {
    let rows = stmt.query_map(params_from_iter(params), |row| read_vector(row, width))?;
    let mut result = Vec::new();
    for row in rows {
        result.push(row?);
    }
    Ok(result)
}

impl VectorStore for CondensedLayout<'_> {
    fn name(&self) -> &'static str {
        "condensed"
    }

    fn create_schema(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();

        let key = Ident::new(KEY_COLUMN)?;
        let mut create = CreateTable::new(self.table.clone()).column(ColumnDef::auto_key(key));
        for attr in 0..spec.column_count() {
            create =
                create.column(ColumnDef::new(column_name(attr)?, SqlType::Real).not_null());
        }
        let ddl = vec![create.build()?];
        recreate_table(self.conn, &self.table, &ddl)?;

        self.prepare(spec)?;
        log::debug!(
            "created condensed table {} with {} columns, projection {:?}",
            self.table,
            spec.column_count(),
            spec.projection().attributes()
        );
        Ok(())
    }

    fn open_schema(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();
        let expected = self.expected_columns(spec.column_count())?;
        verify_columns(self.conn, &self.table, &expected)?;
        self.prepare(spec)?;
        log::debug!("opened condensed table {}", self.table);
        Ok(())
    }

    fn set_projection(&mut self, projection: Projection) -> Result<()> {
        let spec = self.prepared()?.spec.with_projection(projection)?;
        self.prepare(&spec)
    }

    fn insert(&mut self, values: &[f64]) -> Result<VectorId> {
        let conn = self.conn;
        let prepared = self.prepared()?;
        prepared.spec.check_values(values)?;

        begin_if_needed(conn)?;
        prepared.statements.insert.execute(params_from_iter(values))?;
        let id = vector_id_from_sql(conn.last_insert_rowid() - 1)?;
        Ok(id)
    }

    fn get_by_id(&mut self, id: VectorId) -> Result<Option<Vector>> {
        let prepared = self.prepared()?;
        let width = prepared.spec.projection().len();
        let vector = prepared
            .statements
            .get
            .query_row([row_id(id)], |row| read_vector(row, width))
            .optional()?;
        Ok(vector)
    }

    fn get_range(&mut self, from: VectorId, to: VectorId) -> Result<Vec<Vector>> {
        if from > to {
            return Ok(Vec::new());
        }
        let prepared = self.prepared()?;
        let width = prepared.spec.projection().len();
        collect_vectors(
            &mut prepared.statements.range,
            width,
            &[row_id(from), row_id(to)],
        )
    }

    fn get_all(&mut self) -> Result<Vec<Vector>> {
        let prepared = self.prepared()?;
        let width = prepared.spec.projection().len();
        collect_vectors(&mut prepared.statements.full, width, &[])
    }

    fn vector_count(&mut self) -> Result<u64> {
        let prepared = self.prepared()?;
        let count: i64 = prepared.statements.count.query_row([], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn commit(&mut self) -> Result<()> {
        commit_pending(self.conn)?;
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        rollback_pending(self.conn)?;
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(prepared) = self.prepared.take() {
            prepared.statements.finalize();
        }
    }
}

impl Drop for CondensedLayout<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}
