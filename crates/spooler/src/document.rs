use printspool_pages::{normalize, PageRange};

use crate::job::DocumentInfo;

/// Last-known document metadata plus the pages whose content was fetched.
///
/// `info` is `None` until the first layout completes. `pages` is `None` when no
/// write has completed since the metadata last changed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DocumentState {
    info: Option<DocumentInfo>,
    pages: Option<Vec<PageRange>>,
}

impl DocumentState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn info(&self) -> Option<&DocumentInfo> {
        self.info.as_ref()
    }

    /// Delivered pages, always normalized.
    pub fn pages(&self) -> Option<&[PageRange]> {
        self.pages.as_deref()
    }

    /// Stores `info` when it differs from the current metadata for layout
    /// purposes. Returns whether it changed.
    pub fn update_info(&mut self, info: &DocumentInfo) -> bool {
        let changed = match &self.info {
            Some(current) => !current.equals_ignoring_size(info),
            None => true,
        };
        if changed {
            self.info = Some(info.clone());
        }
        changed
    }

    /// Records the artifact size after a write. No-op before the first layout.
    pub fn set_data_size(&mut self, data_size: u64) -> Option<&DocumentInfo> {
        let info = self.info.as_mut()?;
        info.data_size = data_size;
        Some(info)
    }

    pub fn set_pages(&mut self, pages: &[PageRange]) {
        self.pages = Some(normalize(pages));
    }

    pub fn clear_pages(&mut self) {
        self.pages = None;
    }

    /// Whether the already delivered pages cover `requested`.
    pub fn has_pages(&self, requested: &[PageRange]) -> bool {
        self.pages
            .as_deref()
            .is_some_and(|pages| printspool_pages::contains(pages, requested))
    }
}
