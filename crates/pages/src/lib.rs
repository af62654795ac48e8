//! Page range values and the set algebra used to reconcile requested and
//! delivered print pages.

pub mod algebra;
pub mod range;
pub mod selection;

pub use algebra::{contains, is_normalized, normalize, offset};
pub use range::{PageRange, PageRangeError};
pub use selection::parse_page_selection;
