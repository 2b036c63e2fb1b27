//! Paged results

use serde::Serialize;

/// One window of a query plus the total the unpaged query would return
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub offset: u64,
    pub limit: Option<u64>,
}

impl<T> Page<T> {
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Whether rows exist past this window
    pub fn has_next(&self) -> bool {
        self.offset + (self.items.len() as u64) < self.total
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        }
    }

    pub(crate) fn try_map<U, E, F>(self, f: F) -> Result<Page<U>, E>
    where
        F: FnOnce(Vec<T>) -> Result<Vec<U>, E>,
    {
        Ok(Page {
            items: f(self.items)?,
            total: self.total,
            offset: self.offset,
            limit: self.limit,
        })
    }

    pub fn into_items(self) -> Vec<T> {
        self.items
    }
}
