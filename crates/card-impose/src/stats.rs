use crate::options::PageLayout;

/// Statistics about a batch before it runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchStatistics {
    /// Number of data rows
    pub data_rows: usize,
    /// Number of output pages
    pub pages: usize,
    /// Cells per page
    pub capacity_per_page: usize,
    /// Filled cells on the final page
    pub filled_cells_last_page: usize,
    /// Empty cells on the final page
    pub blank_cells_last_page: usize,
}

/// Calculate statistics for a batch of `row_count` rows on this layout.
pub fn calculate_statistics(row_count: usize, layout: &PageLayout) -> BatchStatistics {
    let resolved = layout.resolve();
    let capacity = resolved.capacity();
    let pages = resolved.page_count(row_count);

    let filled_cells_last_page = if pages == 0 {
        0
    } else {
        let remainder = row_count % capacity;
        if remainder == 0 { capacity } else { remainder }
    };
    let blank_cells_last_page = if pages == 0 {
        0
    } else {
        capacity - filled_cells_last_page
    };

    BatchStatistics {
        data_rows: row_count,
        pages,
        capacity_per_page: capacity,
        filled_cells_last_page,
        blank_cells_last_page,
    }
}
