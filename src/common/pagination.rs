use serde::Serialize;

pub const DEFAULT_LIMIT: i64 = 50;
pub const MAX_LIMIT: i64 = 100;

/// Resolved paging window for a list query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: i64,
    pub limit: i64,
}

impl Page {
    /// Clamps raw query values: page is at least 1, limit lies in 1..=100.
    pub fn new(page: Option<i64>, limit: Option<i64>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            limit: limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT),
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    pub fn meta(&self, total: i64) -> PageMeta {
        PageMeta {
            total,
            page: self.page,
            limit: self.limit,
            pages: (total + self.limit - 1) / self.limit,
        }
    }

    /// Slices an already materialized list, for filters computed in memory.
    pub fn slice<T>(&self, items: Vec<T>) -> Vec<T> {
        items
            .into_iter()
            .skip(self.offset() as usize)
            .take(self.limit as usize)
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct PageMeta {
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub pages: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_and_clamps() {
        assert_eq!(Page::new(None, None), Page { page: 1, limit: 50 });
        assert_eq!(Page::new(Some(0), Some(500)), Page { page: 1, limit: 100 });
        assert_eq!(Page::new(Some(-3), Some(0)), Page { page: 1, limit: 1 });
    }

    #[test]
    fn meta_rounds_pages_up() {
        let page = Page::new(Some(2), Some(10));
        assert_eq!(page.offset(), 10);
        let meta = page.meta(21);
        assert_eq!(meta.pages, 3);
        assert_eq!(page.meta(0).pages, 0);
    }

    #[test]
    fn slice_takes_window() {
        let page = Page::new(Some(2), Some(2));
        assert_eq!(page.slice(vec![1, 2, 3, 4, 5]), vec![3, 4]);
    }
}
