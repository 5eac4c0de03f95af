pub mod completions;
pub mod fetch;

pub use fetch::{FetchCommand, FetchOptions, fetch_credentials};
