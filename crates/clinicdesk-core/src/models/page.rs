use serde::{Deserialize, Serialize};

/// Page sizes offered on the patients screen
pub const PATIENT_PAGE_SIZES: [u32; 3] = [5, 10, 25];

/// Page sizes offered on the appointments screen
pub const APPOINTMENT_PAGE_SIZES: [u32; 3] = [2, 5, 10];

/// One page of a list endpoint: `{content: [...], totalElements: n}`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    #[serde(default = "Vec::new")]
    pub content: Vec<T>,
    #[serde(default)]
    pub total_elements: u64,
}

impl<T> Default for Page<T> {
    fn default() -> Self {
        Self {
            content: Vec::new(),
            total_elements: 0,
        }
    }
}

impl<T> Page<T> {
    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Number of pages needed for `total_elements` at the given size.
    pub fn page_count(&self, page_size: u32) -> u64 {
        if page_size == 0 {
            return 0;
        }
        self.total_elements.div_ceil(u64::from(page_size))
    }
}

/// `pageNo` / `pageSize` query parameters. `page_no` is zero-based.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page_no: u32,
    pub page_size: u32,
}

impl PageRequest {
    pub fn new(page_no: u32, page_size: u32) -> Self {
        Self {
            page_no,
            page_size: page_size.max(1),
        }
    }

    pub fn query(&self) -> [(&'static str, String); 2] {
        [
            ("pageNo", self.page_no.to_string()),
            ("pageSize", self.page_size.to_string()),
        ]
    }

    pub fn next(&self, page_count: u64) -> Self {
        if u64::from(self.page_no) + 1 < page_count {
            Self::new(self.page_no + 1, self.page_size)
        } else {
            *self
        }
    }

    pub fn prev(&self) -> Self {
        Self::new(self.page_no.saturating_sub(1), self.page_size)
    }

    /// After a fetch: an empty page past the first means the last row on it
    /// was deleted, so step back one page.
    pub fn settle<T>(&self, page: &Page<T>) -> Option<Self> {
        if page.is_empty() && self.page_no > 0 {
            Some(self.prev())
        } else {
            None
        }
    }

    /// Cycle to the next size in `options`, going back to the first page.
    pub fn cycle_size(&self, options: &[u32]) -> Self {
        let next = options
            .iter()
            .position(|&s| s == self.page_size)
            .map(|i| options[(i + 1) % options.len()])
            .or_else(|| options.first().copied())
            .unwrap_or(self.page_size);
        Self::new(0, next)
    }
}
