use crate::error::{NnError, Result};
use crate::layers::layer::Cache;
use crate::math::matrix::Matrix;

/// Per-step memory of a [`crate::shadow::Shadow`].
///
/// `history[0]` is a zero seed of the record shape; forward step `t` appends
/// entry `t + 1` and moves the cursor onto it. A backward step works on the
/// entry under the cursor and then retreats. Next to every remembered value
/// the record keeps a [`crate::layers::Layer::snapshot`] of the wrapped
/// layer, nested members included, so the layer can be put back exactly into
/// the state it had at that step.
#[derive(Debug, Clone)]
pub struct Record {
    history: Vec<Matrix>,
    snapshots: Vec<Vec<Cache>>,
    cursor: usize,
    rows: usize,
    cols: usize,
}

impl Record {
    pub fn new(rows: usize, cols: usize) -> Record {
        Record {
            history: vec![Matrix::zeros(rows, cols)],
            snapshots: vec![Vec::new()],
            cursor: 0,
            rows,
            cols,
        }
    }

    pub fn reset(&mut self) {
        *self = Record::new(self.rows, self.cols);
    }

    /// Appends a step after the cursor. Entries beyond the cursor left over
    /// from an abandoned unroll are dropped first.
    pub fn push(&mut self, value: Matrix, snapshot: Vec<Cache>) {
        self.history.truncate(self.cursor + 1);
        self.snapshots.truncate(self.cursor + 1);
        self.history.push(value);
        self.snapshots.push(snapshot);
        self.cursor += 1;
    }

    pub fn retreat(&mut self) -> Result<()> {
        if self.cursor == 0 {
            return Err(self.out_of_range(0));
        }
        self.cursor -= 1;
        Ok(())
    }

    pub fn current(&self) -> Result<&Matrix> {
        self.history.get(self.cursor).ok_or_else(|| self.out_of_range(self.cursor))
    }

    pub fn previous(&self) -> Result<&Matrix> {
        let index = self.cursor.checked_sub(1).ok_or_else(|| self.out_of_range(0))?;
        self.history.get(index).ok_or_else(|| self.out_of_range(index))
    }

    pub fn snapshot(&self) -> Result<&[Cache]> {
        self.snapshots
            .get(self.cursor)
            .map(Vec::as_slice)
            .ok_or_else(|| self.out_of_range(self.cursor))
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Number of entries including the zero seed.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn dim(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    fn out_of_range(&self, index: usize) -> NnError {
        NnError::OutOfRange { what: "shadow history", index, len: self.history.len() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_on_a_zero_seed() {
        let r = Record::new(1, 3);
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.len(), 1);
        assert_eq!(r.current().unwrap(), &Matrix::zeros(1, 3));
        assert!(matches!(r.previous(), Err(NnError::OutOfRange { .. })));
    }

    #[test]
    fn push_and_retreat_walk_the_history() {
        let mut r = Record::new(1, 1);
        r.push(Matrix::filled(1, 1, 1.0), Vec::new());
        r.push(Matrix::filled(1, 1, 2.0), Vec::new());
        assert_eq!(r.cursor(), 2);
        assert_eq!(r.current().unwrap().get(0, 0).unwrap(), 2.0);
        assert_eq!(r.previous().unwrap().get(0, 0).unwrap(), 1.0);

        r.retreat().unwrap();
        r.retreat().unwrap();
        assert_eq!(r.cursor(), 0);
        assert!(matches!(r.retreat(), Err(NnError::OutOfRange { index: 0, len: 3, .. })));
    }

    #[test]
    fn push_after_retreat_drops_stale_steps() {
        let mut r = Record::new(1, 1);
        r.push(Matrix::filled(1, 1, 1.0), Vec::new());
        r.push(Matrix::filled(1, 1, 2.0), Vec::new());
        r.retreat().unwrap();
        r.push(Matrix::filled(1, 1, 5.0), Vec::new());
        assert_eq!(r.len(), 3);
        assert_eq!(r.current().unwrap().get(0, 0).unwrap(), 5.0);
    }

    #[test]
    fn reset_keeps_shape() {
        let mut r = Record::new(2, 2);
        r.push(Matrix::filled(2, 2, 1.0), Vec::new());
        r.reset();
        assert_eq!(r.cursor(), 0);
        assert_eq!(r.len(), 1);
        assert_eq!(r.dim(), (2, 2));
    }
}
