//! Conceptual-table assembly for table views.
//!
//! A walk of a table OID such as `ifTable` (`1.3.6.1.2.1.2.2`) returns
//! bindings shaped `<table>.<entry>.<column>.<index...>`. [`Table`] files
//! each one under its row index and column number.

use std::collections::{BTreeMap, BTreeSet};

use crate::oid::Oid;
use crate::value::Value;

/// One cell as it arrives during a table view.
#[derive(Debug, Clone, PartialEq)]
pub struct TableCell {
    /// Row index (the arcs after the column number).
    pub row: Oid,
    pub column: u32,
    pub value: Value,
}

/// Rows keyed by index OID, columns by number.
#[derive(Debug, Clone, PartialEq)]
pub struct Table {
    root: Oid,
    columns: BTreeSet<u32>,
    rows: BTreeMap<Oid, BTreeMap<u32, Value>>,
}

impl Table {
    pub fn new(root: Oid) -> Self {
        Self {
            root,
            columns: BTreeSet::new(),
            rows: BTreeMap::new(),
        }
    }

    pub fn root(&self) -> &Oid {
        &self.root
    }

    /// Split `oid` into row and column and store `value` there.
    ///
    /// Returns `None` when `oid` is not shaped like a cell of this table
    /// (outside the root, or missing the entry/column/index arcs).
    pub fn insert(&mut self, oid: &Oid, value: Value) -> Option<TableCell> {
        let cell = self.cell_of(oid, value)?;
        self.columns.insert(cell.column);
        self.rows
            .entry(cell.row.clone())
            .or_default()
            .insert(cell.column, cell.value.clone());
        Some(cell)
    }

    fn cell_of(&self, oid: &Oid, value: Value) -> Option<TableCell> {
        match oid.suffix_after(&self.root)? {
            [_entry, column, index @ ..] if !index.is_empty() => Some(TableCell {
                row: Oid::from_slice(index),
                column: *column,
                value,
            }),
            _ => None,
        }
    }

    pub fn columns(&self) -> impl Iterator<Item = u32> + '_ {
        self.columns.iter().copied()
    }

    pub fn rows(&self) -> impl Iterator<Item = (&Oid, &BTreeMap<u32, Value>)> {
        self.rows.iter()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn get(&self, row: &Oid, column: u32) -> Option<&Value> {
        self.rows.get(row)?.get(&column)
    }
}
