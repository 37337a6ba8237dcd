use bytes::Bytes;
use tms_api::{Cell, TransactionSnapshot};

/// Cells dropped by one janitor pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct JanitorStats {
    /// Written by an invalid transaction.
    pub invalid: u64,
    /// Superseded by a version every active transaction can read.
    pub stale: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct CellIdentity {
    row: Bytes,
    family: Bytes,
    qualifier: Bytes,
}

impl CellIdentity {
    fn of(cell: &Cell) -> Self {
        Self {
            row: cell.row.clone(),
            family: cell.family.clone(),
            qualifier: cell.qualifier.clone(),
        }
    }

    fn matches(&self, cell: &Cell) -> bool {
        self.row == cell.row && self.family == cell.family && self.qualifier == cell.qualifier
    }
}

/// Walk state carried from one batch to the next, so a column whose
/// versions straddle a batch boundary is still filtered as one.
#[derive(Debug, Default)]
pub struct FilterState {
    previous: Option<CellIdentity>,
    skip_same: bool,
    pub stats: JanitorStats,
}

/// Append to `out` the cells of `input` that must survive.
///
/// `input` is in engine order: grouped by column, newest version first.
/// A cell is dropped when its version is an invalid write pointer, or when
/// an earlier kept version of the same column is already at or below the
/// oldest in-use read pointer.
pub fn filter_cells(
    input: impl IntoIterator<Item = Cell>,
    snapshot: &TransactionSnapshot,
    state: &mut FilterState,
    out: &mut Vec<Cell>,
) {
    for cell in input {
        if snapshot.is_invalid(cell.version) {
            state.stats.invalid += 1;
            continue;
        }

        let same_as_previous = state.previous.as_ref().is_some_and(|p| p.matches(&cell));
        if same_as_previous && state.skip_same {
            state.stats.stale += 1;
            continue;
        }

        if !same_as_previous {
            state.previous = Some(CellIdentity::of(&cell));
        }
        state.skip_same = cell.version <= snapshot.oldest_in_use_read_pointer;
        out.push(cell);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cell(row: &'static str, qualifier: &'static str, version: i64) -> Cell {
        Cell {
            row: Bytes::from_static(row.as_bytes()),
            family: Bytes::from_static(b"d"),
            qualifier: Bytes::from_static(qualifier.as_bytes()),
            version,
            value: Bytes::new(),
        }
    }

    fn versions(cells: &[Cell]) -> Vec<i64> {
        cells.iter().map(|c| c.version).collect()
    }

    #[test]
    fn boundary_version_is_kept_and_older_ones_dropped() {
        let snapshot = TransactionSnapshot::new(5, [7]);
        let mut state = FilterState::default();
        let mut out = Vec::new();
        filter_cells(
            [cell("r", "p", 10), cell("r", "p", 7), cell("r", "p", 5), cell("r", "p", 2)],
            &snapshot,
            &mut state,
            &mut out,
        );
        assert_eq!(versions(&out), vec![10, 5]);
        assert_eq!(state.stats, JanitorStats { invalid: 1, stale: 1 });
    }

    #[test]
    fn new_column_resets_skipping() {
        let snapshot = TransactionSnapshot::new(5, []);
        let mut state = FilterState::default();
        let mut out = Vec::new();
        filter_cells(
            [cell("r", "p", 4), cell("r", "p", 3), cell("r", "t", 4), cell("s", "p", 2)],
            &snapshot,
            &mut state,
            &mut out,
        );
        assert_eq!(versions(&out), vec![4, 4, 2]);
        assert_eq!(state.stats.stale, 1);
    }

    #[test]
    fn versions_above_the_read_pointer_all_survive() {
        let snapshot = TransactionSnapshot::new(5, []);
        let mut state = FilterState::default();
        let mut out = Vec::new();
        filter_cells(
            [cell("r", "p", 9), cell("r", "p", 8), cell("r", "p", 6)],
            &snapshot,
            &mut state,
            &mut out,
        );
        assert_eq!(versions(&out), vec![9, 8, 6]);
        assert_eq!(state.stats, JanitorStats::default());
    }

    #[test]
    fn state_spans_batches() {
        let snapshot = TransactionSnapshot::new(5, []);
        let mut state = FilterState::default();
        let mut out = Vec::new();
        filter_cells([cell("r", "p", 5)], &snapshot, &mut state, &mut out);
        filter_cells([cell("r", "p", 1)], &snapshot, &mut state, &mut out);
        assert_eq!(versions(&out), vec![5]);
        assert_eq!(state.stats.stale, 1);
    }
}
