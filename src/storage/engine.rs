use crate::error::Result;

/// One column requested from a table source
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFetch {
    /// Storage position of the column in a row
    pub index: usize,
    /// Width in doubles
    pub size: usize,
    pub has_missing: bool,
    pub missing_value: f64,
}

/// A backend that can produce row iterators over a table
///
/// Rows are flat buffers of doubles. Each iterator only decodes the columns
/// it was created for.
pub trait TableSource {
    fn iterator(&self, columns: &[ColumnFetch]) -> Result<Box<dyn TableIterator + '_>>;

    /// Total number of rows, when the backend knows it
    fn rows(&self) -> Option<usize> {
        None
    }
}

/// Cursor over the rows of a table
pub trait TableIterator {
    /// Positions before the first row and drops any restriction
    fn rewind(&mut self) -> Result<()>;
    /// Moves to the next row, false once exhausted
    fn next(&mut self) -> Result<bool>;
    /// Limits iteration to `length` rows starting at row `offset` and
    /// positions before the first of them
    fn restrict(&mut self, offset: usize, length: usize) -> Result<()>;
    /// Skips `n` rows, false if the iterator ran out first
    fn advance(&mut self, n: usize) -> Result<bool> {
        for _ in 0..n {
            if !self.next()? {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Decoded values of the requested columns for the current row
    fn data(&self) -> &[f64];
    /// Start of each requested column in `data()`
    fn column_offsets(&self) -> &[usize];
    /// Width in doubles of each requested column
    fn doubles_sizes(&self) -> &[usize];
    fn columns_have_missing(&self) -> &[bool];
    fn missing_values(&self) -> &[f64];
    /// True once after the backing buffer switched to data carrying
    /// different missing-value metadata
    fn metadata_changed(&mut self) -> bool;
}

#[cfg(test)]
mod tests {
    use super::{ColumnFetch, TableIterator, TableSource};
    use crate::{error::Result, storage::memory::MemoryTable};

    fn fetch(index: usize, size: usize) -> ColumnFetch {
        ColumnFetch {
            index,
            size,
            has_missing: true,
            missing_value: -1.0,
        }
    }

    fn collect(iter: &mut dyn TableIterator) -> Result<Vec<Vec<f64>>> {
        let mut rows = Vec::new();
        while iter.next()? {
            rows.push(iter.data().to_vec());
        }
        Ok(rows)
    }

    fn test_scan(source: &dyn TableSource) -> Result<()> {
        let mut iter = source.iterator(&[fetch(2, 1), fetch(0, 1)])?;
        assert_eq!(iter.column_offsets(), &[0, 1]);
        assert_eq!(iter.doubles_sizes(), &[1, 1]);
        assert_eq!(
            collect(iter.as_mut())?,
            vec![vec![30.0, 1.0], vec![31.0, 2.0], vec![32.0, 3.0], vec![33.0, 4.0]]
        );

        iter.rewind()?;
        assert!(iter.advance(3)?);
        assert_eq!(iter.data(), &[32.0, 3.0]);
        assert!(!iter.advance(2)?);
        Ok(())
    }

    fn test_restrict(source: &dyn TableSource) -> Result<()> {
        let mut iter = source.iterator(&[fetch(0, 1)])?;
        iter.restrict(1, 2)?;
        assert_eq!(collect(iter.as_mut())?, vec![vec![2.0], vec![3.0]]);

        iter.restrict(3, 10)?;
        assert_eq!(collect(iter.as_mut())?, vec![vec![4.0]]);

        iter.restrict(4, 1)?;
        assert!(collect(iter.as_mut())?.is_empty());

        iter.rewind()?;
        assert_eq!(collect(iter.as_mut())?.len(), 4);
        Ok(())
    }

    #[test]
    fn test_memory() -> Result<()> {
        let mut table = MemoryTable::new(vec![1, 1, 1]);
        table.push_row(vec![1.0, 20.0, 30.0])?;
        table.push_row(vec![2.0, 21.0, 31.0])?;
        table.start_chunk(Some(vec![Some(-9.0), None, None]))?;
        table.push_row(vec![3.0, 22.0, 32.0])?;
        table.push_row(vec![4.0, 23.0, 33.0])?;

        test_scan(&table)?;
        test_restrict(&table)?;
        Ok(())
    }
}
