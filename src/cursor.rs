//! Row Cursor
//!
//! An immutable view over the rows still to be consumed. Consuming calls
//! return a new cursor instead of truncating shared state, so every caller
//! sees exactly how many rows a projection took.

use crate::source::Row;

#[derive(Debug, Clone, Copy)]
pub struct RowCursor<'a> {
    rows: &'a [Row],
}

impl<'a> RowCursor<'a> {
    pub fn new(rows: &'a [Row]) -> Self {
        Self { rows }
    }

    pub fn count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &'a [Row] {
        self.rows
    }

    pub fn peek_first(&self) -> Option<&'a Row> {
        self.rows.first()
    }

    /// The cursor past the first `n` rows
    pub fn drop_first(self, n: usize) -> Self {
        Self {
            rows: &self.rows[n.min(self.rows.len())..],
        }
    }

    /// A cursor over the first row only
    pub fn first_only(self) -> Self {
        Self {
            rows: &self.rows[..self.rows.len().min(1)],
        }
    }

    /// Split off the run starting at the first row.
    ///
    /// The first row always belongs to the run; following rows join it while
    /// `key_column` is empty on them. A row without the column counts as
    /// empty. Returns `(run, rest)`.
    pub fn take_run(self, key_column: &str) -> (Self, Self) {
        if self.rows.is_empty() {
            return (self, self);
        }

        let len = 1 + self.rows[1..]
            .iter()
            .take_while(|row| row.text(key_column).is_none())
            .count();

        let (run, rest) = self.rows.split_at(len);
        (Self { rows: run }, Self { rows: rest })
    }
}
