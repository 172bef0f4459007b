//! Small shared utilities.

mod timestamps;
mod uuid_utils;

pub use timestamps::{format_iso8601, iso_timestamp, now_utc, Timestamp};
pub use uuid_utils::new_run_id;
