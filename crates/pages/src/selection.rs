use once_cell::sync::Lazy;
use regex::Regex;

use crate::algebra::normalize;
use crate::range::{PageRange, PageRangeError};

/// One comma separated entry: `N`, `N-M`, or `N-` (a dangling dash while the
/// user is still typing).
static ENTRY_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*([0-9]+)\s*(?:-\s*([0-9]*)\s*)?$").expect("valid page entry pattern")
});

/// Parses user-facing, one-based page selection text such as `"1-3, 5"`.
///
/// Returns the normalized zero-based selection. Reversed bounds are swapped;
/// when `page_count` is known every page must fall inside the document.
pub fn parse_page_selection(
    text: &str,
    page_count: Option<u32>,
) -> Result<Vec<PageRange>, PageRangeError> {
    let mut ranges = Vec::new();

    for entry in text.split(',') {
        if entry.trim().is_empty() {
            continue;
        }
        let captures = ENTRY_PATTERN
            .captures(entry)
            .ok_or_else(|| PageRangeError::Malformed(entry.trim().to_string()))?;

        let from = parse_page(&captures[1], entry, page_count)?;
        let to = match captures.get(2).map(|m| m.as_str()) {
            Some(digits) if !digits.is_empty() => parse_page(digits, entry, page_count)?,
            _ => from,
        };

        ranges.push(PageRange::Range {
            start: from.min(to) - 1,
            end: from.max(to) - 1,
        });
    }

    if ranges.is_empty() {
        return Err(PageRangeError::EmptySelection);
    }
    Ok(normalize(&ranges))
}

fn parse_page(digits: &str, entry: &str, page_count: Option<u32>) -> Result<u32, PageRangeError> {
    let page: u32 = digits
        .parse()
        .map_err(|_| PageRangeError::Malformed(entry.trim().to_string()))?;
    if page == 0 {
        return Err(PageRangeError::PageOutOfDocument {
            page,
            page_count: page_count.unwrap_or(0),
        });
    }
    if let Some(count) = page_count {
        if page > count {
            return Err(PageRangeError::PageOutOfDocument {
                page,
                page_count: count,
            });
        }
    }
    Ok(page)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn r(start: u32, end: u32) -> PageRange {
        PageRange::Range { start, end }
    }

    #[test]
    fn parses_single_pages_and_spans() {
        assert_eq!(
            parse_page_selection("1-3, 5", Some(10)),
            Ok(vec![r(0, 2), r(4, 4)])
        );
        assert_eq!(parse_page_selection(" 7 ", None), Ok(vec![r(6, 6)]));
    }

    #[test]
    fn swaps_reversed_bounds_and_merges() {
        assert_eq!(
            parse_page_selection("4-2,5", Some(5)),
            Ok(vec![r(1, 4)])
        );
    }

    #[test]
    fn dangling_dash_selects_single_page() {
        assert_eq!(parse_page_selection("3-", Some(5)), Ok(vec![r(2, 2)]));
        assert_eq!(parse_page_selection("1-2,", Some(5)), Ok(vec![r(0, 1)]));
    }

    #[test]
    fn rejects_pages_outside_document() {
        assert_eq!(
            parse_page_selection("2-9", Some(4)),
            Err(PageRangeError::PageOutOfDocument {
                page: 9,
                page_count: 4
            })
        );
        assert!(matches!(
            parse_page_selection("0", Some(4)),
            Err(PageRangeError::PageOutOfDocument { page: 0, .. })
        ));
    }

    #[test]
    fn rejects_malformed_and_empty_text() {
        assert_eq!(
            parse_page_selection("1-2-3", None),
            Err(PageRangeError::Malformed("1-2-3".to_string()))
        );
        assert_eq!(
            parse_page_selection("a", None),
            Err(PageRangeError::Malformed("a".to_string()))
        );
        assert_eq!(
            parse_page_selection(" , ", None),
            Err(PageRangeError::EmptySelection)
        );
        assert!(matches!(
            parse_page_selection("99999999999", None),
            Err(PageRangeError::Malformed(_))
        ));
    }
}
