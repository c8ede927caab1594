//! Typed SQL builders for the statements the layouts prepare.
//!
//! Column lists, placeholder lists and attribute-id sets are assembled from
//! validated parts instead of string formatting at the call site. Anything
//! that would produce malformed SQL is rejected when the statement is built,
//! long before SQLite gets to see it.

use crate::error::{BenchError, Result};
use std::collections::HashSet;
use std::fmt;

/// A validated SQL identifier, rendered double-quoted.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Ident(String);

impl Ident {
    pub fn new(name: &str) -> Result<Self> {
        let mut chars = name.chars();
        let valid_head = chars
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
        if !valid_head || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
            return Err(BenchError::InvalidQuery(format!(
                "`{name}` is not a valid identifier"
            )));
        }
        Ok(Self(name.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ident {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{}\"", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SqlType {
    Integer,
    SmallInt,
    Real,
}

impl SqlType {
    fn as_sql(self) -> &'static str {
        match self {
            SqlType::Integer => "INTEGER",
            SqlType::SmallInt => "SMALLINT",
            SqlType::Real => "REAL",
        }
    }
}

#[derive(Debug, Clone)]
pub struct ColumnDef {
    name: Ident,
    ty: SqlType,
    not_null: bool,
    auto_key: bool,
}

impl ColumnDef {
    pub fn new(name: Ident, ty: SqlType) -> Self {
        Self {
            name,
            ty,
            not_null: false,
            auto_key: false,
        }
    }

    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// `INTEGER PRIMARY KEY AUTOINCREMENT`: the store assigns the row id.
    pub fn auto_key(name: Ident) -> Self {
        Self {
            name,
            ty: SqlType::Integer,
            not_null: false,
            auto_key: true,
        }
    }

    fn render(&self) -> String {
        let mut sql = format!("{} {}", self.name, self.ty.as_sql());
        if self.auto_key {
            sql.push_str(" PRIMARY KEY AUTOINCREMENT");
        } else if self.not_null {
            sql.push_str(" NOT NULL");
        }
        sql
    }
}

fn ensure_distinct<'a>(what: &str, names: impl IntoIterator<Item = &'a Ident>) -> Result<()> {
    let mut seen = HashSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(BenchError::InvalidQuery(format!(
                "{what} lists column {name} twice"
            )));
        }
    }
    Ok(())
}

fn join<T: fmt::Display>(items: &[T]) -> String {
    items
        .iter()
        .map(|item| item.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

pub fn drop_table(table: &Ident) -> String {
    format!("DROP TABLE {table}")
}

#[derive(Debug, Clone)]
pub struct CreateTable {
    table: Ident,
    columns: Vec<ColumnDef>,
}

impl CreateTable {
    pub fn new(table: Ident) -> Self {
        Self {
            table,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(BenchError::InvalidQuery(format!(
                "table {} has no columns",
                self.table
            )));
        }
        ensure_distinct("CREATE TABLE", self.columns.iter().map(|c| &c.name))?;
        let defs: Vec<String> = self.columns.iter().map(ColumnDef::render).collect();
        Ok(format!("CREATE TABLE {} ({})", self.table, defs.join(", ")))
    }
}

#[derive(Debug, Clone)]
pub struct CreateIndex {
    name: Ident,
    table: Ident,
    columns: Vec<Ident>,
}

impl CreateIndex {
    pub fn new(name: Ident, table: Ident) -> Self {
        Self {
            name,
            table,
            columns: Vec::new(),
        }
    }

    pub fn column(mut self, column: Ident) -> Self {
        self.columns.push(column);
        self
    }

    pub fn build(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(BenchError::InvalidQuery(format!(
                "index {} has no columns",
                self.name
            )));
        }
        ensure_distinct("CREATE INDEX", &self.columns)?;
        let cols: Vec<String> = self.columns.iter().map(|c| format!("{c} ASC")).collect();
        Ok(format!(
            "CREATE INDEX {} ON {} ({})",
            self.name,
            self.table,
            cols.join(", ")
        ))
    }
}

#[derive(Debug, Clone)]
enum Filter {
    Eq(Ident),
    Between(Ident),
    In(Ident, Vec<u16>),
}

/// `SELECT` builder. Placeholders are numbered in the order filters are added.
#[derive(Debug, Clone)]
pub struct Select {
    table: Ident,
    columns: Vec<Ident>,
    filters: Vec<Filter>,
    order_by: Vec<Ident>,
}

impl Select {
    pub fn from_table(table: Ident) -> Self {
        Self {
            table,
            columns: Vec::new(),
            filters: Vec::new(),
            order_by: Vec::new(),
        }
    }

    pub fn column(mut self, column: Ident) -> Self {
        self.columns.push(column);
        self
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Ident>) -> Self {
        self.columns.extend(columns);
        self
    }

    /// `column = ?`
    pub fn where_eq(mut self, column: Ident) -> Self {
        self.filters.push(Filter::Eq(column));
        self
    }

    /// `column BETWEEN ? AND ?`
    pub fn where_between(mut self, column: Ident) -> Self {
        self.filters.push(Filter::Between(column));
        self
    }

    /// `column IN (v0, v1, ...)` with the values inlined as integer literals.
    pub fn where_in(mut self, column: Ident, values: impl IntoIterator<Item = u16>) -> Self {
        self.filters
            .push(Filter::In(column, values.into_iter().collect()));
        self
    }

    pub fn order_by(mut self, column: Ident) -> Self {
        self.order_by.push(column);
        self
    }

    pub fn build(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(BenchError::InvalidQuery(format!(
                "select from {} has no columns",
                self.table
            )));
        }

        let mut sql = format!("SELECT {} FROM {}", join(&self.columns), self.table);

        let mut placeholder = 0;
        let mut clauses = Vec::with_capacity(self.filters.len());
        for filter in &self.filters {
            match filter {
                Filter::Eq(column) => {
                    placeholder += 1;
                    clauses.push(format!("{column} = ?{placeholder}"));
                }
                Filter::Between(column) => {
                    clauses.push(format!(
                        "{column} BETWEEN ?{} AND ?{}",
                        placeholder + 1,
                        placeholder + 2
                    ));
                    placeholder += 2;
                }
                Filter::In(column, values) => {
                    if values.is_empty() {
                        return Err(BenchError::InvalidQuery(format!(
                            "empty IN list on {column}"
                        )));
                    }
                    clauses.push(format!("{column} IN ({})", join(values)));
                }
            }
        }
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }

        if !self.order_by.is_empty() {
            sql.push_str(" ORDER BY ");
            sql.push_str(&join(&self.order_by));
        }
        Ok(sql)
    }
}

/// Upper bound on bound parameters per statement in the bundled SQLite.
pub const MAX_PARAMETERS: usize = 32_766;

/// `INSERT` builder; `rows(n)` emits a multi-row `VALUES` list so one
/// execution writes `n` rows. Placeholders run row by row.
#[derive(Debug, Clone)]
pub struct Insert {
    table: Ident,
    columns: Vec<Ident>,
    rows: usize,
}

impl Insert {
    pub fn into_table(table: Ident) -> Self {
        Self {
            table,
            columns: Vec::new(),
            rows: 1,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Ident>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn rows(mut self, rows: usize) -> Self {
        self.rows = rows;
        self
    }

    pub fn build(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(BenchError::InvalidQuery(format!(
                "insert into {} has no columns",
                self.table
            )));
        }
        if self.rows == 0 {
            return Err(BenchError::InvalidQuery(format!(
                "insert into {} writes no rows",
                self.table
            )));
        }
        let width = self.columns.len();
        if width * self.rows > MAX_PARAMETERS {
            return Err(BenchError::InvalidQuery(format!(
                "insert into {} needs {} parameters, limit is {MAX_PARAMETERS}",
                self.table,
                width * self.rows
            )));
        }
        ensure_distinct("INSERT", &self.columns)?;

        let tuples: Vec<String> = (0..self.rows)
            .map(|row| {
                let placeholders: Vec<String> = (1..=width)
                    .map(|col| format!("?{}", row * width + col))
                    .collect();
                format!("({})", placeholders.join(", "))
            })
            .collect();
        Ok(format!(
            "INSERT INTO {} ({}) VALUES {}",
            self.table,
            join(&self.columns),
            tuples.join(", ")
        ))
    }
}

pub fn count_rows(table: &Ident) -> String {
    format!("SELECT COUNT(*) FROM {table}")
}

pub fn count_distinct(table: &Ident, column: &Ident) -> String {
    format!("SELECT COUNT(DISTINCT {column}) FROM {table}")
}

pub fn max_of(table: &Ident, column: &Ident) -> String {
    format!("SELECT MAX({column}) FROM {table}")
}

/// `UPDATE table SET c0 = ?1, ... WHERE key = ?n`; the key binds last.
#[derive(Debug, Clone)]
pub struct Update {
    table: Ident,
    columns: Vec<Ident>,
    key: Ident,
}

impl Update {
    pub fn new(table: Ident, key: Ident) -> Self {
        Self {
            table,
            columns: Vec::new(),
            key,
        }
    }

    pub fn columns(mut self, columns: impl IntoIterator<Item = Ident>) -> Self {
        self.columns.extend(columns);
        self
    }

    pub fn build(&self) -> Result<String> {
        if self.columns.is_empty() {
            return Err(BenchError::InvalidQuery(format!(
                "update of {} sets no columns",
                self.table
            )));
        }
        ensure_distinct("UPDATE", &self.columns)?;
        let sets: Vec<String> = self
            .columns
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect();
        Ok(format!(
            "UPDATE {} SET {} WHERE {} = ?{}",
            self.table,
            sets.join(", "),
            self.key,
            self.columns.len() + 1
        ))
    }
}
