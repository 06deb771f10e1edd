use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};

/// Name of the trial-identifier column required for sequencing.
pub const TRIAL_COL: &str = "trial";

/// One table cell. `Missing` marks outcome cells not yet written for a
/// trial, and serializes as an empty CSV field.
#[derive(Clone, Debug, PartialEq)]
pub enum Cell {
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
    Missing,
}

impl Cell {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Cell::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Float(v) => Some(*v),
            Cell::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Cell::Bool(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Cell::Text(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_missing(&self) -> bool {
        matches!(self, Cell::Missing)
    }

    /// Field text used when flushing to CSV.
    pub fn csv_field(&self) -> String {
        match self {
            Cell::Int(v) => v.to_string(),
            Cell::Float(v) => {
                if v.is_nan() {
                    "NaN".to_string()
                } else {
                    v.to_string()
                }
            }
            Cell::Bool(v) => v.to_string(),
            Cell::Text(v) => v.clone(),
            Cell::Missing => String::new(),
        }
    }
}

impl From<i64> for Cell {
    fn from(v: i64) -> Self {
        Cell::Int(v)
    }
}

impl From<f64> for Cell {
    fn from(v: f64) -> Self {
        Cell::Float(v)
    }
}

impl From<bool> for Cell {
    fn from(v: bool) -> Self {
        Cell::Bool(v)
    }
}

impl From<&str> for Cell {
    fn from(v: &str) -> Self {
        Cell::Text(v.to_string())
    }
}

impl From<String> for Cell {
    fn from(v: String) -> Self {
        Cell::Text(v)
    }
}

/// Row key of a table. Tables built from records use consecutive integer
/// keys; shuffled or externally supplied tables may carry labels.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum RowKey {
    Int(i64),
    Label(String),
}

impl fmt::Display for RowKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowKey::Int(v) => write!(f, "{v}"),
            RowKey::Label(v) => f.write_str(v),
        }
    }
}

/// Snapshot of a single table row, detached from the table so callers can
/// hold it across mutating calls.
#[derive(Clone, Debug)]
pub struct Row {
    pub key: RowKey,
    pub position: usize,
    columns: Vec<String>,
    cells: Vec<Cell>,
}

impl Row {
    pub fn get(&self, column: &str) -> Option<&Cell> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.cells.get(idx)
    }

    pub fn trial(&self) -> Option<i64> {
        self.get(TRIAL_COL).and_then(Cell::as_i64)
    }
}

/// Ordered rows with named columns; the trial table and the behavioral log
/// are both instances of this. Columns keep insertion order, which is also
/// the CSV column order on flush. Rows can be appended while a run is in
/// progress (open-ended trial tables).
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Table {
    columns: Vec<String>,
    index: Vec<RowKey>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(columns: Vec<String>) -> Self {
        Table { columns, index: Vec::new(), rows: Vec::new() }
    }

    /// Build a table from rows of cells; rows get consecutive integer keys.
    pub fn from_records(
        columns: Vec<String>,
        records: Vec<Vec<Cell>>,
    ) -> Result<Self> {
        let mut table = Table::new(columns);
        for record in records {
            table.push_row(record)?;
        }
        Ok(table)
    }

    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn index(&self) -> &[RowKey] {
        &self.index
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<()> {
        if self.has_column(name) {
            Ok(())
        } else {
            Err(Error::Config(format!("table has no `{name}` column")))
        }
    }

    fn column_pos(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// Append a column filled with `Missing` if it does not exist yet.
    pub fn ensure_column(&mut self, name: &str) {
        if self.has_column(name) {
            return;
        }
        self.columns.push(name.to_string());
        for row in &mut self.rows {
            row.push(Cell::Missing);
        }
    }

    fn next_int_key(&self) -> i64 {
        self.index
            .iter()
            .filter_map(|k| match k {
                RowKey::Int(v) => Some(*v),
                RowKey::Label(_) => None,
            })
            .max()
            .map_or(0, |v| v + 1)
    }

    /// Append a row with an auto-assigned integer key.
    pub fn push_row(&mut self, cells: Vec<Cell>) -> Result<RowKey> {
        let key = RowKey::Int(self.next_int_key());
        self.push_row_with_key(key.clone(), cells)?;
        Ok(key)
    }

    pub fn push_row_with_key(&mut self, key: RowKey, cells: Vec<Cell>) -> Result<()> {
        if cells.len() != self.columns.len() {
            return Err(Error::Config(format!(
                "row has {} cells, table has {} columns",
                cells.len(),
                self.columns.len()
            )));
        }
        if self.position(&key).is_some() {
            return Err(Error::Config(format!("duplicate row key `{key}`")));
        }
        self.index.push(key);
        self.rows.push(cells);
        Ok(())
    }

    pub fn key_at(&self, position: usize) -> Option<&RowKey> {
        self.index.get(position)
    }

    pub fn position(&self, key: &RowKey) -> Option<usize> {
        self.index.iter().position(|k| k == key)
    }

    pub fn get(&self, position: usize, column: &str) -> Option<&Cell> {
        let col = self.column_pos(column)?;
        self.rows.get(position).map(|row| &row[col])
    }

    /// Write a cell, creating the column on first use. Out-of-range rows
    /// are a configuration error.
    pub fn set(
        &mut self,
        position: usize,
        column: &str,
        value: Cell,
    ) -> Result<()> {
        if position >= self.rows.len() {
            return Err(Error::Config(format!(
                "row position {position} out of range ({} rows)",
                self.rows.len()
            )));
        }
        self.ensure_column(column);
        let col = self.column_pos(column).expect("column just ensured");
        self.rows[position][col] = value;
        Ok(())
    }

    pub fn row(&self, position: usize) -> Option<Row> {
        Some(Row {
            key: self.index.get(position)?.clone(),
            position,
            columns: self.columns.clone(),
            cells: self.rows.get(position)?.clone(),
        })
    }

    pub fn row_cells(&self, position: usize) -> Option<&[Cell]> {
        self.rows.get(position).map(Vec::as_slice)
    }

    /// Trial identifier of a row; errors when the column is absent or the
    /// cell is not an integer.
    pub fn trial_at(&self, position: usize) -> Result<i64> {
        self.get(position, TRIAL_COL)
            .and_then(Cell::as_i64)
            .ok_or_else(|| {
                Error::Config(format!(
                    "row {position} has no integer `{TRIAL_COL}` value"
                ))
            })
    }

    /// Position of the first row whose trial identifier matches exactly.
    pub fn find_trial(&self, trial: i64) -> Option<usize> {
        let col = self.column_pos(TRIAL_COL)?;
        self.rows
            .iter()
            .position(|row| row[col].as_i64() == Some(trial))
    }

    /// Cells of one column keyed by row position.
    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell>> {
        let col = self.column_pos(name)?;
        Some(self.rows.iter().map(move |row| &row[col]))
    }

    /// Build a row of cells from a column-name map, filling unnamed
    /// columns with `Missing`. Unknown names are a configuration error.
    pub fn record(&self, values: HashMap<String, Cell>) -> Result<Vec<Cell>> {
        for name in values.keys() {
            if !self.has_column(name) {
                return Err(Error::Config(format!("unknown column `{name}`")));
            }
        }
        let mut cells = vec![Cell::Missing; self.columns.len()];
        for (name, value) in values {
            let col = self.column_pos(&name).expect("checked above");
            cells[col] = value;
        }
        Ok(cells)
    }
}
