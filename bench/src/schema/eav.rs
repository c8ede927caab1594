//! Entity-attribute-value schema: one `(vector_id, attribute_id, value)` row
//! per attribute.
//!
//! The composite index on `(vector_id, attribute_id)` lets every read come
//! back already ordered, so vectors are rebuilt in one pass over the rows.
//! Ids are handed out by the layout, but the counter is only a cache of
//! `MAX(vector_id) + 1`: it is recovered from the table on open and after a
//! rollback.

use super::{
    begin_if_needed, commit_pending, recreate_table, rollback_pending, vector_id_from_sql,
    verify_columns, Projection, SchemaSpec, Vector, VectorId, VectorStore,
};
use crate::error::{BenchError, Result};
use crate::query::{self, ColumnDef, CreateIndex, CreateTable, Ident, Insert, Select, SqlType};
use rusqlite::{params, Connection, Statement};

pub const TABLE_NAME: &str = "vectors_eav";
const KEY_COLUMN: &str = "vector_id";
const ATTR_COLUMN: &str = "attribute_id";
const VALUE_COLUMN: &str = "value";

struct Columns {
    key: Ident,
    attr: Ident,
    value: Ident,
}

impl Columns {
    fn new() -> Result<Self> {
        Ok(Self {
            key: Ident::new(KEY_COLUMN)?,
            attr: Ident::new(ATTR_COLUMN)?,
            value: Ident::new(VALUE_COLUMN)?,
        })
    }

    fn all(&self) -> [Ident; 3] {
        [self.key.clone(), self.attr.clone(), self.value.clone()]
    }
}

struct Statements<'conn> {
    get: Statement<'conn>,
    range: Statement<'conn>,
    full: Statement<'conn>,
    insert: Statement<'conn>,
    count: Statement<'conn>,
    max_id: Statement<'conn>,
}

impl<'conn> Statements<'conn> {
    fn prepare(conn: &'conn Connection, table: &Ident, spec: &SchemaSpec) -> Result<Self> {
        let cols = Columns::new()?;
        let attrs = spec.projection().attributes().to_vec();

        let select = || {
            Select::from_table(table.clone())
                .columns(cols.all())
                .where_in(cols.attr.clone(), attrs.iter().copied())
        };
        let get = select()
            .where_eq(cols.key.clone())
            .order_by(cols.attr.clone())
            .build()?;
        let range = select()
            .where_between(cols.key.clone())
            .order_by(cols.key.clone())
            .order_by(cols.attr.clone())
            .build()?;
        let full = select()
            .order_by(cols.key.clone())
            .order_by(cols.attr.clone())
            .build()?;
        let insert = Insert::into_table(table.clone())
            .columns(cols.all())
            .rows(spec.column_count() as usize)
            .build()?;

        Ok(Self {
            get: conn.prepare(&get)?,
            range: conn.prepare(&range)?,
            full: conn.prepare(&full)?,
            insert: conn.prepare(&insert)?,
            count: conn.prepare(&query::count_distinct(table, &cols.key))?,
            max_id: conn.prepare(&query::max_of(table, &cols.key))?,
        })
    }

    fn next_id(&mut self) -> Result<VectorId> {
        let max: Option<i64> = self.max_id.query_row([], |row| row.get(0))?;
        match max {
            None => Ok(0),
            Some(max) => Ok(vector_id_from_sql(max + 1)?),
        }
    }

    fn finalize(self) {
        let Statements {
            get,
            range,
            full,
            insert,
            count,
            max_id,
        } = self;
        for stmt in [get, range, full, insert, count, max_id] {
            if let Err(err) = stmt.finalize() {
                log::warn!("failed to finalize eav statement: {err}");
            }
        }
    }
}

struct Prepared<'conn> {
    spec: SchemaSpec,
    /// Output position of each attribute id, `None` for unprojected ones.
    slots: Vec<Option<usize>>,
    statements: Statements<'conn>,
}

fn slot_table(spec: &SchemaSpec) -> Vec<Option<usize>> {
    let mut slots = vec![None; spec.column_count() as usize];
    for (position, &attr) in spec.projection().attributes().iter().enumerate() {
        slots[attr as usize] = Some(position);
    }
    slots
}

struct PendingVector {
    id: VectorId,
    values: Vec<Option<f64>>,
    rows: usize,
}

/// Rebuilds vectors from rows ordered by `(vector_id, attribute_id)`.
///
/// Every vector must contribute exactly one row per projected attribute;
/// anything else is reported as corruption instead of being patched over.
struct Assembler<'a> {
    slots: &'a [Option<usize>],
    width: usize,
    pending: Option<PendingVector>,
    done: Vec<Vector>,
}

impl<'a> Assembler<'a> {
    fn new(slots: &'a [Option<usize>], width: usize) -> Self {
        Self {
            slots,
            width,
            pending: None,
            done: Vec::new(),
        }
    }

    fn push(&mut self, id: VectorId, attr: u16, value: f64) -> Result<()> {
        if self.pending.as_ref().is_some_and(|p| p.id != id) {
            self.flush()?;
        }
        let width = self.width;
        let pending = self.pending.get_or_insert_with(|| PendingVector {
            id,
            values: vec![None; width],
            rows: 0,
        });
        pending.rows += 1;
        if let Some(&Some(slot)) = self.slots.get(attr as usize) {
            pending.values[slot] = Some(value);
        }
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        let Some(pending) = self.pending.take() else {
            return Ok(());
        };
        let filled = pending.values.iter().filter(|v| v.is_some()).count();
        if pending.rows != self.width || filled != self.width {
            return Err(BenchError::ReconstructionCorruption {
                vector_id: pending.id,
                expected: self.width,
                found: pending.rows,
            });
        }
        self.done
            .push(pending.values.into_iter().flatten().collect());
        Ok(())
    }

    fn finish(mut self) -> Result<Vec<Vector>> {
        self.flush()?;
        Ok(self.done)
    }
}

fn read_triple(row: &rusqlite::Row<'_>) -> rusqlite::Result<(VectorId, u16, f64)> {
    Ok((
        vector_id_from_sql(row.get(0)?)?,
        row.get(1)?,
        row.get(2)?,
    ))
}

fn assemble<P: rusqlite::Params>(
    stmt: &mut Statement<'_>,
    mut assembler: Assembler<'_>,
    params: P,
) -> Result<Vec<Vector>> {
    let mut rows = stmt.query(params)?;
    while let Some(row) = rows.next()? {
        let (id, attr, value) = read_triple(row)?;
        assembler.push(id, attr, value)?;
    }
    assembler.finish()
}

/// Narrow-row layout: `vectors_eav(vector_id, attribute_id, value)`.
pub struct EavLayout<'conn> {
    conn: &'conn Connection,
    table: Ident,
    index: Ident,
    prepared: Option<Prepared<'conn>>,
    next_id: VectorId,
}

impl<'conn> EavLayout<'conn> {
    pub fn new(conn: &'conn Connection) -> Result<Self> {
        Self::with_table(conn, TABLE_NAME)
    }

    pub fn with_table(conn: &'conn Connection, table: &str) -> Result<Self> {
        Ok(Self {
            conn,
            table: Ident::new(table)?,
            index: Ident::new(&format!("{table}_idx"))?,
            prepared: None,
            next_id: 0,
        })
    }

    pub fn table(&self) -> &str {
        self.table.as_str()
    }

    /// Id the next insert will receive.
    pub fn next_id(&self) -> VectorId {
        self.next_id
    }

    fn prepared(&mut self) -> Result<&mut Prepared<'conn>> {
        self.prepared.as_mut().ok_or(BenchError::NotInitialized)
    }

    fn prepare(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();
        let statements = Statements::prepare(self.conn, &self.table, spec)?;
        self.prepared = Some(Prepared {
            spec: spec.clone(),
            slots: slot_table(spec),
            statements,
        });
        Ok(())
    }

    fn check_attribute_range(&self, column_count: u16) -> Result<()> {
        let cols = Columns::new()?;
        let max_attr: Option<i64> = self
            .conn
            .query_row(&query::max_of(&self.table, &cols.attr), [], |row| {
                row.get(0)
            })?;
        if let Some(max_attr) = max_attr {
            if max_attr >= i64::from(column_count) {
                return Err(BenchError::SchemaMismatch {
                    table: self.table.as_str().to_string(),
                    reason: format!(
                        "stored attribute id {max_attr} exceeds {column_count} columns"
                    ),
                });
            }
        }
        Ok(())
    }
}

impl VectorStore for EavLayout<'_> {
    fn name(&self) -> &'static str {
        "eav"
    }

    fn create_schema(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();

        let cols = Columns::new()?;
        let ddl = vec![
            CreateTable::new(self.table.clone())
                .column(ColumnDef::new(cols.key.clone(), SqlType::Integer).not_null())
                .column(ColumnDef::new(cols.attr.clone(), SqlType::SmallInt).not_null())
                .column(ColumnDef::new(cols.value.clone(), SqlType::Real).not_null())
                .build()?,
            CreateIndex::new(self.index.clone(), self.table.clone())
                .column(cols.key)
                .column(cols.attr)
                .build()?,
        ];
        recreate_table(self.conn, &self.table, &ddl)?;

        self.prepare(spec)?;
        self.next_id = 0;
        log::debug!(
            "created eav table {} for {} attributes, projection {:?}",
            self.table,
            spec.column_count(),
            spec.projection().attributes()
        );
        Ok(())
    }

    fn open_schema(&mut self, spec: &SchemaSpec) -> Result<()> {
        self.dispose();
        verify_columns(self.conn, &self.table, &Columns::new()?.all())?;
        self.check_attribute_range(spec.column_count())?;
        self.prepare(spec)?;
        self.next_id = self.prepared()?.statements.next_id()?;
        log::debug!(
            "opened eav table {}, next vector id {}",
            self.table,
            self.next_id
        );
        Ok(())
    }

    fn set_projection(&mut self, projection: Projection) -> Result<()> {
        let spec = self.prepared()?.spec.with_projection(projection)?;
        self.prepare(&spec)
    }

    fn insert(&mut self, values: &[f64]) -> Result<VectorId> {
        let conn = self.conn;
        let prepared = self.prepared.as_mut().ok_or(BenchError::NotInitialized)?;
        prepared.spec.check_values(values)?;

        // Outside a transaction the table holds only committed rows, possibly
        // after a rollback issued through another layout on this connection.
        if conn.is_autocommit() {
            self.next_id = prepared.statements.next_id()?;
        }
        let id = self.next_id;

        begin_if_needed(conn)?;
        let stmt = &mut prepared.statements.insert;
        for (attr, value) in values.iter().enumerate() {
            let base = attr * 3;
            stmt.raw_bind_parameter(base + 1, id)?;
            stmt.raw_bind_parameter(base + 2, attr as u16)?;
            stmt.raw_bind_parameter(base + 3, value)?;
        }
        stmt.raw_execute()?;

        self.next_id = id
            .checked_add(1)
            .ok_or(rusqlite::Error::IntegralValueOutOfRange(0, i64::from(id) + 1))?;
        Ok(id)
    }

    fn get_by_id(&mut self, id: VectorId) -> Result<Option<Vector>> {
        let Prepared {
            spec,
            slots,
            statements,
        } = self.prepared()?;
        let assembler = Assembler::new(slots, spec.projection().len());
        let vectors = assemble(&mut statements.get, assembler, params![id])?;
        Ok(vectors.into_iter().next())
    }

    fn get_range(&mut self, from: VectorId, to: VectorId) -> Result<Vec<Vector>> {
        if from > to {
            return Ok(Vec::new());
        }
        let Prepared {
            spec,
            slots,
            statements,
        } = self.prepared()?;
        let assembler = Assembler::new(slots, spec.projection().len());
        assemble(&mut statements.range, assembler, params![from, to])
    }

    fn get_all(&mut self) -> Result<Vec<Vector>> {
        let Prepared {
            spec,
            slots,
            statements,
        } = self.prepared()?;
        let assembler = Assembler::new(slots, spec.projection().len());
        assemble(&mut statements.full, assembler, [])
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
        if let Some(prepared) = self.prepared.as_mut() {
            self.next_id = prepared.statements.next_id()?;
        }
        Ok(())
    }

    fn dispose(&mut self) {
        if let Some(prepared) = self.prepared.take() {
            prepared.statements.finalize();
        }
    }
}

impl Drop for EavLayout<'_> {
    fn drop(&mut self) {
        self.dispose();
    }
}
