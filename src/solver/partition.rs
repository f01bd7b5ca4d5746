//! Row-band partitioning of the plate across ranks.
//!
//! The full grid has `rows + 2` rows (both boundary rows included). Every
//! rank owns `floor((rows + 2) / P)` consecutive rows starting at
//! `rank * floor((rows + 2) / P)`. When `P` does not divide `rows + 2` the
//! last rank absorbs the remainder, so it always ends at row `rows + 1`.
//!
//! The map is recomputed identically on every rank from `(rows, P)`; it is
//! never sent between ranks.

use crate::error::{Result, ThermoplateError};

/// Inclusive range of global row indices owned by one rank.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowRange {
    pub first: usize,
    pub last: usize,
}

#[allow(clippy::len_without_is_empty)]
impl RowRange {
    /// Never zero: every rank owns at least one row.
    pub fn len(&self) -> usize {
        self.last - self.first + 1
    }

    pub fn contains(&self, row: usize) -> bool {
        (self.first..=self.last).contains(&row)
    }

    pub fn rows(&self) -> std::ops::RangeInclusive<usize> {
        self.first..=self.last
    }
}

/// Which side of the band a neighbor sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    /// Lower-indexed rank; supplies the row just above our first row.
    Prev,
    /// Higher-indexed rank; supplies the row just below our last row.
    Next,
}

/// A neighboring rank and the single row we read from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Neighbor {
    pub side: Side,
    pub rank: usize,
    pub halo_row: usize,
}

/// The ranks adjacent to one band in the ownership order.
///
/// Rank 0 has no `prev`, the last rank has no `next`, and a single rank has
/// neither. Computed once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Neighbors {
    pub prev: Option<Neighbor>,
    pub next: Option<Neighbor>,
}

impl Neighbors {
    pub fn iter(&self) -> impl Iterator<Item = Neighbor> + '_ {
        self.prev.iter().chain(self.next.iter()).copied()
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.prev.is_none() && self.next.is_none()
    }
}

/// Block partition of `rows + 2` global rows over `num_ranks` ranks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RowPartition {
    total_rows: usize,
    num_ranks: usize,
    rows_per_rank: usize,
}

impl RowPartition {
    /// Partition a plate with `rows` interior rows.
    ///
    /// Fails when there are no ranks or more ranks than grid rows.
    pub fn new(rows: usize, num_ranks: usize) -> Result<Self> {
        let total_rows = rows + 2;
        if num_ranks == 0 {
            return Err(ThermoplateError::Partition(
                "cannot partition the plate over zero ranks".into(),
            ));
        }
        if num_ranks > total_rows {
            return Err(ThermoplateError::Partition(format!(
                "{num_ranks} ranks exceed the {total_rows} grid rows; every rank must own at least one row"
            )));
        }
        Ok(Self {
            total_rows,
            num_ranks,
            rows_per_rank: total_rows / num_ranks,
        })
    }

    pub fn num_ranks(&self) -> usize {
        self.num_ranks
    }

    /// Rows left over after the even split; all of them go to the last rank.
    pub fn remainder(&self) -> usize {
        self.total_rows % self.num_ranks
    }

    pub fn range(&self, rank: usize) -> Result<RowRange> {
        self.check_rank(rank)?;
        let first = rank * self.rows_per_rank;
        let last = if rank + 1 == self.num_ranks {
            self.total_rows - 1
        } else {
            first + self.rows_per_rank - 1
        };
        Ok(RowRange { first, last })
    }

    /// Neighbor set for `rank`, including which row each neighbor supplies.
    pub fn neighbors(&self, rank: usize) -> Result<Neighbors> {
        let range = self.range(rank)?;
        let prev = (rank > 0).then(|| Neighbor {
            side: Side::Prev,
            rank: rank - 1,
            halo_row: range.first - 1,
        });
        let next = (rank + 1 < self.num_ranks).then(|| Neighbor {
            side: Side::Next,
            rank: rank + 1,
            halo_row: range.last + 1,
        });
        Ok(Neighbors { prev, next })
    }

    fn check_rank(&self, rank: usize) -> Result<()> {
        if rank >= self.num_ranks {
            return Err(ThermoplateError::RankOutOfRange {
                rank,
                num_ranks: self.num_ranks,
            });
        }
        Ok(())
    }
}
