//! Utilities shared by the comparison library and the CLI: hierarchical
//! timing, logging setup, JSON round-trips, and a few string helpers.

pub use crate::io::{
    deserialize_btreemap, file_exists, list_dir, read_json, serialize_btreemap, to_json,
    write_json,
};
pub use crate::time::{elapsed_seconds, prettyprint_time, Timer};
pub use crate::utils::{basename, prettyprint_usize};

mod io;
pub mod logger;
mod time;
mod utils;
