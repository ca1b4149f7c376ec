//! Client side of the Phenomate data-offloading console.
//!
//! File names of raw instrument data are parsed with per-project patterns
//! ([`name`]), shown in filterable tables ([`table`], [`filter`]) in the user's
//! timezone ([`datetime`]), and offloaded through the backend ([`api`]).

pub mod api;
pub mod config;
pub mod consts;
pub mod context;
pub mod datetime;
pub mod filter;
pub mod name;
pub mod preview;
pub mod table;
pub mod types;
pub mod vfs;

pub use api::ApiClient;
pub use name::{NameParse, ParsedFile, RegexMap, parse_file_data, parse_file_name};
pub use preview::{Preview, PreviewDebouncer, PreviewInput, PreviewState};
