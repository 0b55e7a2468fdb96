//! Page slicing over a document's elements.
//!
//! Pages are 1-based. Out-of-range requests clamp to the first or last page
//! instead of failing; only a zero page size is rejected.

use crate::models::ValidationError;

/// Elements per page when nothing else is configured.
pub const DEFAULT_PAGE_SIZE: usize = 200;

/// Visible slice of a collection plus the numbers needed to draw a pager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageView<'a, T> {
    pub visible: &'a [T],
    pub effective_page: usize,
    pub total_pages: usize,
    pub is_pagination_required: bool,
}

/// Number of pages needed for `len` items, never less than one.
pub fn total_pages(len: usize, page_size: usize) -> Result<usize, ValidationError> {
    if page_size == 0 {
        return Err(ValidationError::InvalidPageSize(page_size));
    }
    Ok(len.div_ceil(page_size).max(1))
}

/// Clamp a requested page number into `1..=total_pages`.
pub fn clamp_page(requested: i64, total_pages: usize) -> usize {
    let last = total_pages.max(1) as i64;
    requested.clamp(1, last) as usize
}

/// Compute the visible page of `elements`.
pub fn compute_page<T>(
    elements: &[T],
    page_size: usize,
    requested_page: i64,
) -> Result<PageView<'_, T>, ValidationError> {
    let total = total_pages(elements.len(), page_size)?;
    let effective_page = clamp_page(requested_page, total);

    let start = ((effective_page - 1) * page_size).min(elements.len());
    let end = (start + page_size).min(elements.len());

    Ok(PageView {
        visible: &elements[start..end],
        effective_page,
        total_pages: total,
        is_pagination_required: elements.len() > page_size,
    })
}

/// Page on which the element at `index` is shown.
pub fn page_of_index(index: usize, page_size: usize) -> Result<usize, ValidationError> {
    if page_size == 0 {
        return Err(ValidationError::InvalidPageSize(page_size));
    }
    Ok(index / page_size + 1)
}

/// Current page and page size of a panel.
///
/// Holds no elements; callers pass the collection in whenever it changes so
/// the current page can be re-clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Paginator {
    page_size: usize,
    current_page: usize,
}

impl Paginator {
    pub fn new(page_size: usize) -> Result<Self, ValidationError> {
        if page_size == 0 {
            return Err(ValidationError::InvalidPageSize(page_size));
        }
        Ok(Self {
            page_size,
            current_page: 1,
        })
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    /// Slice `elements` at the current page.
    pub fn view<'a, T>(&self, elements: &'a [T]) -> PageView<'a, T> {
        // page_size is non-zero by construction
        compute_page(elements, self.page_size, self.current_page as i64).unwrap_or(PageView {
            visible: &[],
            effective_page: 1,
            total_pages: 1,
            is_pagination_required: false,
        })
    }

    /// Move to `requested`, clamped against a collection of `len` items.
    /// Returns the page actually selected.
    pub fn go_to(&mut self, requested: i64, len: usize) -> usize {
        let total = len.div_ceil(self.page_size).max(1);
        self.current_page = clamp_page(requested, total);
        self.current_page
    }

    /// Re-clamp after the underlying collection changed.
    pub fn collection_changed(&mut self, len: usize) {
        self.go_to(self.current_page as i64, len);
    }

    /// Change the page size; the view restarts at the first page.
    pub fn set_page_size(&mut self, page_size: usize) -> Result<(), ValidationError> {
        if page_size == 0 {
            return Err(ValidationError::InvalidPageSize(page_size));
        }
        self.page_size = page_size;
        self.current_page = 1;
        Ok(())
    }

    pub fn reset(&mut self) {
        self.current_page = 1;
    }

    /// Jump to the page that shows the element at `index`.
    pub fn reveal(&mut self, index: usize, len: usize) -> usize {
        let page = index / self.page_size + 1;
        self.go_to(page as i64, len)
    }
}

impl Default for Paginator {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            current_page: 1,
        }
    }
}
