//! Session filtering: criteria values, their evaluation, and a textual syntax
//! that parses into them.

pub mod apply;
pub mod criteria;
pub mod parser;

pub use apply::{apply_filters, matches};
pub use criteria::{BranchMatch, DateWindow, FilterCriteria};
pub use parser::parse_filter;
