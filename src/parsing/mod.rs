pub mod address_parser;
pub mod range_expander;

pub use address_parser::{parse, parse_record};
pub use range_expander::{expand, expand_with_cap, DEFAULT_MAX_RANGE_SPAN};
