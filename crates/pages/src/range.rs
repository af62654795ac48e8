use std::fmt;

use thiserror::Error;

/// Errors produced while building or transforming page ranges.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PageRangeError {
    #[error("range start {start} is after end {end}")]
    Inverted { start: u32, end: u32 },
    #[error("offsetting {range} by {delta} leaves the page index domain")]
    OffsetOutOfBounds { range: PageRange, delta: i64 },
    #[error("page selection is empty")]
    EmptySelection,
    #[error("malformed page selection entry `{0}`")]
    Malformed(String),
    #[error("page {page} is outside the document (1..={page_count})")]
    PageOutOfDocument { page: u32, page_count: u32 },
}

/// Inclusive, zero-based page range.
///
/// `All` stands for every page of a document whose count is unknown or
/// irrelevant. It is a distinct value: `All` never compares equal to a
/// numeric range, even one spanning the whole index domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PageRange {
    All,
    Range { start: u32, end: u32 },
}

impl PageRange {
    /// Builds a numeric range, rejecting `start > end`.
    pub fn new(start: u32, end: u32) -> Result<Self, PageRangeError> {
        if start > end {
            return Err(PageRangeError::Inverted { start, end });
        }
        Ok(PageRange::Range { start, end })
    }

    /// Range covering exactly one page.
    pub const fn single(page: u32) -> Self {
        PageRange::Range {
            start: page,
            end: page,
        }
    }

    /// Same range with its bounds in ascending order.
    pub const fn ordered(self) -> Self {
        match self {
            PageRange::Range { start, end } if start > end => PageRange::Range {
                start: end,
                end: start,
            },
            other => other,
        }
    }

    pub const fn is_all(&self) -> bool {
        matches!(self, PageRange::All)
    }

    /// First page index covered; `All` starts at zero.
    pub const fn start(&self) -> u32 {
        match self {
            PageRange::All => 0,
            PageRange::Range { start, .. } => *start,
        }
    }

    /// Last page index covered; `All` extends to the end of the index domain.
    pub const fn end(&self) -> u32 {
        match self {
            PageRange::All => u32::MAX,
            PageRange::Range { end, .. } => *end,
        }
    }

    pub fn contains(&self, page: u32) -> bool {
        match self {
            PageRange::All => true,
            PageRange::Range { start, end } => *start <= page && page <= *end,
        }
    }

    /// Whether every page of `other` is also covered by `self`.
    pub fn covers(&self, other: &PageRange) -> bool {
        match (self, other) {
            (PageRange::All, _) => true,
            (PageRange::Range { .. }, PageRange::All) => false,
            (PageRange::Range { start, end }, PageRange::Range { start: s, end: e }) => {
                start <= s && e <= end
            }
        }
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => f.write_str("ALL"),
            PageRange::Range { start, end } if start == end => write!(f, "[{start}]"),
            PageRange::Range { start, end } => write!(f, "[{start}-{end}]"),
        }
    }
}
