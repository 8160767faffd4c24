use crate::{
    error::{Error, Result},
    storage::engine::{ColumnFetch, TableIterator, TableSource},
};

/// Per storage column missing-value override carried by a chunk,
/// `None` meaning the column has no missing value in that chunk
pub type ChunkMissing = Vec<Option<f64>>;

struct Chunk {
    rows: Vec<Vec<f64>>,
    missing: Option<ChunkMissing>,
}

/// In-memory table backend
///
/// Rows are stored in chunks, the way decoded file blocks arrive: each chunk
/// may override the missing-value metadata of the columns.
pub struct MemoryTable {
    layout: Vec<usize>,
    chunks: Vec<Chunk>,
}

impl MemoryTable {
    /// `layout` holds the width in doubles of every storage column
    pub fn new(layout: Vec<usize>) -> Self {
        Self {
            layout,
            chunks: Vec::new(),
        }
    }

    fn row_width(&self) -> usize {
        self.layout.iter().sum()
    }

    /// Opens a new chunk, later rows are appended to it
    pub fn start_chunk(&mut self, missing: Option<ChunkMissing>) -> Result<()> {
        if let Some(m) = &missing {
            if m.len() != self.layout.len() {
                return Err(Error::Internal(format!(
                    "chunk metadata has {} columns, table has {}",
                    m.len(),
                    self.layout.len()
                )));
            }
        }
        self.chunks.push(Chunk {
            rows: Vec::new(),
            missing,
        });
        Ok(())
    }

    pub fn push_row(&mut self, row: Vec<f64>) -> Result<()> {
        if row.len() != self.row_width() {
            return Err(Error::Internal(format!(
                "row has {} doubles, table rows have {}",
                row.len(),
                self.row_width()
            )));
        }
        if self.chunks.is_empty() {
            self.start_chunk(None)?;
        }
        if let Some(chunk) = self.chunks.last_mut() {
            chunk.rows.push(row);
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(|c| c.rows.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TableSource for MemoryTable {
    fn iterator(&self, columns: &[ColumnFetch]) -> Result<Box<dyn TableIterator + '_>> {
        let mut starts = vec![0; self.layout.len()];
        for i in 1..self.layout.len() {
            starts[i] = starts[i - 1] + self.layout[i - 1];
        }

        let mut row_offsets = Vec::with_capacity(columns.len());
        let mut column_offsets = Vec::with_capacity(columns.len());
        let mut sizes = Vec::with_capacity(columns.len());
        let mut width = 0;
        for c in columns {
            let size = *self.layout.get(c.index).ok_or(Error::Internal(format!(
                "column index {} out of range",
                c.index
            )))?;
            row_offsets.push(starts[c.index]);
            column_offsets.push(width);
            // narrower requests read a prefix of the stored column
            let size = if c.size == 0 { size } else { c.size.min(size) };
            sizes.push(size);
            width += size;
        }

        let mut chunk_starts = Vec::with_capacity(self.chunks.len());
        let mut total = 0;
        for chunk in &self.chunks {
            chunk_starts.push(total);
            total += chunk.rows.len();
        }

        Ok(Box::new(MemoryTableIterator {
            table: self,
            fetches: columns.to_vec(),
            row_offsets,
            column_offsets,
            sizes,
            has_missing: columns.iter().map(|c| c.has_missing).collect(),
            missing_values: columns.iter().map(|c| c.missing_value).collect(),
            data: vec![0.0; width],
            chunk_starts,
            total,
            window: (0, total),
            position: None,
            chunk: None,
            metadata_changed: false,
        }))
    }

    fn rows(&self) -> Option<usize> {
        Some(self.len())
    }
}

/// In-memory table iterator
pub struct MemoryTableIterator<'a> {
    table: &'a MemoryTable,
    fetches: Vec<ColumnFetch>,
    row_offsets: Vec<usize>,
    column_offsets: Vec<usize>,
    sizes: Vec<usize>,
    has_missing: Vec<bool>,
    missing_values: Vec<f64>,
    data: Vec<f64>,
    chunk_starts: Vec<usize>,
    total: usize,
    window: (usize, usize),
    position: Option<usize>,
    chunk: Option<usize>,
    metadata_changed: bool,
}

impl<'a> MemoryTableIterator<'a> {
    fn locate(&self, position: usize) -> usize {
        match self.chunk_starts.binary_search(&position) {
            Ok(mut i) => {
                // skip empty chunks sharing the same start
                while i + 1 < self.chunk_starts.len() && self.chunk_starts[i + 1] == position {
                    i += 1;
                }
                i
            }
            Err(i) => i - 1,
        }
    }

    fn switch_chunk(&mut self, index: usize) {
        let chunk = &self.table.chunks[index];
        for (i, fetch) in self.fetches.iter().enumerate() {
            let (has, value) = match &chunk.missing {
                Some(missing) => match missing[fetch.index] {
                    Some(v) => (true, v),
                    None => (false, fetch.missing_value),
                },
                None => (fetch.has_missing, fetch.missing_value),
            };
            self.has_missing[i] = has;
            self.missing_values[i] = value;
        }
        self.chunk = Some(index);
        self.metadata_changed = true;
    }
}

impl<'a> TableIterator for MemoryTableIterator<'a> {
    fn rewind(&mut self) -> Result<()> {
        self.window = (0, self.total);
        self.position = None;
        Ok(())
    }

    fn next(&mut self) -> Result<bool> {
        let position = self.position.map_or(self.window.0, |p| p + 1);
        if position >= self.window.1 {
            self.position = Some(self.window.1);
            return Ok(false);
        }
        let index = self.locate(position);
        if self.chunk != Some(index) {
            self.switch_chunk(index);
        }
        let row = &self.table.chunks[index].rows[position - self.chunk_starts[index]];
        for i in 0..self.sizes.len() {
            let (from, to, size) = (self.row_offsets[i], self.column_offsets[i], self.sizes[i]);
            self.data[to..to + size].copy_from_slice(&row[from..from + size]);
        }
        self.position = Some(position);
        Ok(true)
    }

    fn restrict(&mut self, offset: usize, length: usize) -> Result<()> {
        let start = offset.min(self.total);
        self.window = (start, offset.saturating_add(length).min(self.total));
        self.position = None;
        Ok(())
    }

    fn data(&self) -> &[f64] {
        &self.data
    }

    fn column_offsets(&self) -> &[usize] {
        &self.column_offsets
    }

    fn doubles_sizes(&self) -> &[usize] {
        &self.sizes
    }

    fn columns_have_missing(&self) -> &[bool] {
        &self.has_missing
    }

    fn missing_values(&self) -> &[f64] {
        &self.missing_values
    }

    fn metadata_changed(&mut self) -> bool {
        std::mem::replace(&mut self.metadata_changed, false)
    }
}
