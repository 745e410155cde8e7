use crate::sandbox::Sandbox;
use rusqlite::types::ValueRef;
use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;

/// A column value as the driver produced it. No coercion beyond SQLite's storage classes.
#[derive(Debug, Clone)]
pub enum Cell {
    Null,
    Integer(i64),
    Real(f64),
    Text(String),
    Blob(Vec<u8>),
}

impl Cell {
    fn class_rank(&self) -> u8 {
        match self {
            Cell::Null => 0,
            Cell::Integer(_) | Cell::Real(_) => 1,
            Cell::Text(_) => 2,
            Cell::Blob(_) => 3,
        }
    }
}

impl From<ValueRef<'_>> for Cell {
    fn from(v: ValueRef<'_>) -> Self {
        match v {
            ValueRef::Null => Cell::Null,
            ValueRef::Integer(i) => Cell::Integer(i),
            ValueRef::Real(f) => Cell::Real(f),
            ValueRef::Text(t) => Cell::Text(String::from_utf8_lossy(t).into_owned()),
            ValueRef::Blob(b) => Cell::Blob(b.to_vec()),
        }
    }
}

// Total order following SQLite's cross-class ordering: NULL < numbers < text < blob.
// Integers and reals compare by exact numeric value, so 2 and 2.0 are equal.
impl Ord for Cell {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Cell::Integer(a), Cell::Integer(b)) => a.cmp(b),
            (Cell::Real(a), Cell::Real(b)) => cmp_reals(*a, *b),
            (Cell::Integer(a), Cell::Real(b)) => cmp_int_real(*a, *b),
            (Cell::Real(a), Cell::Integer(b)) => cmp_int_real(*b, *a).reverse(),
            (Cell::Text(a), Cell::Text(b)) => a.cmp(b),
            (Cell::Blob(a), Cell::Blob(b)) => a.cmp(b),
            _ => self.class_rank().cmp(&other.class_rank()),
        }
    }
}

fn cmp_reals(a: f64, b: f64) -> Ordering {
    // -0.0 == 0.0, matching the integer comparison below.
    if a == b {
        Ordering::Equal
    } else {
        a.total_cmp(&b)
    }
}

/// Exact comparison of an integer with a real, without rounding the integer to f64.
fn cmp_int_real(i: i64, r: f64) -> Ordering {
    const TWO_POW_63: f64 = 9_223_372_036_854_775_808.0;
    if r.is_nan() {
        return if r.is_sign_negative() {
            Ordering::Greater
        } else {
            Ordering::Less
        };
    }
    if r >= TWO_POW_63 {
        return Ordering::Less;
    }
    if r < -TWO_POW_63 {
        return Ordering::Greater;
    }
    // r is within i64 range, so its integral part converts exactly.
    let whole = r.trunc();
    match i.cmp(&(whole as i64)) {
        Ordering::Equal if r > whole => Ordering::Less,
        Ordering::Equal if r < whole => Ordering::Greater,
        other => other,
    }
}

impl PartialOrd for Cell {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for Cell {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cell {}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => write!(f, "NULL"),
            Cell::Integer(i) => write!(f, "{}", i),
            Cell::Real(r) => write!(f, "{}", r),
            Cell::Text(t) => write!(f, "{}", t),
            Cell::Blob(b) => write!(f, "x'{}'", hex::encode(b)),
        }
    }
}

impl Serialize for Cell {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        match self {
            Cell::Null => s.serialize_unit(),
            Cell::Integer(i) => s.serialize_i64(*i),
            Cell::Real(f) => s.serialize_f64(*f),
            Cell::Text(t) => s.serialize_str(t),
            Cell::Blob(b) => s.serialize_str(&hex::encode(b)),
        }
    }
}

pub type Row = Vec<Cell>;

/// Materialized output of one statement. Never persisted.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct ResultSet {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
}

impl ResultSet {
    /// Rows under the lexicographic tuple order. Duplicates are kept.
    pub fn sorted_rows(&self) -> Vec<Row> {
        let mut rows = self.rows.clone();
        rows.sort();
        rows
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecError {
    TimedOut(u64),
    TooManyRows(usize),
    Sqlite(String),
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecError::TimedOut(ms) => write!(f, "statement timed out after {} ms", ms),
            ExecError::TooManyRows(max) => write!(f, "result exceeds {} rows", max),
            ExecError::Sqlite(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for ExecError {}

pub(crate) fn map_sqlite_error(sandbox: &Sandbox, e: rusqlite::Error) -> ExecError {
    match &e {
        rusqlite::Error::SqliteFailure(f, _)
            if f.code == rusqlite::ErrorCode::OperationInterrupted =>
        {
            ExecError::TimedOut(sandbox.timeout_ms().unwrap_or(0))
        }
        _ => ExecError::Sqlite(e.to_string()),
    }
}

/// Executes exactly one statement and fetches all of its rows.
///
/// Statements without a result set yield no columns and no rows.
pub fn run(sandbox: &Sandbox, sql: &str) -> Result<ResultSet, ExecError> {
    let _deadline = sandbox.arm_deadline();
    let err = |e| map_sqlite_error(sandbox, e);

    let mut stmt = sandbox.conn().prepare(sql).map_err(err)?;
    let columns: Vec<String> = stmt
        .column_names()
        .into_iter()
        .map(str::to_string)
        .collect();

    if columns.is_empty() {
        stmt.execute([]).map_err(err)?;
        return Ok(ResultSet {
            columns,
            rows: Vec::new(),
        });
    }

    let width = columns.len();
    let max_rows = sandbox.max_rows();
    let mut rows = Vec::new();
    let mut cursor = stmt.query([]).map_err(err)?;
    while let Some(row) = cursor.next().map_err(err)? {
        if rows.len() >= max_rows {
            return Err(ExecError::TooManyRows(max_rows));
        }
        let mut cells = Vec::with_capacity(width);
        for i in 0..width {
            cells.push(Cell::from(row.get_ref(i).map_err(err)?));
        }
        rows.push(cells);
    }

    Ok(ResultSet { columns, rows })
}
