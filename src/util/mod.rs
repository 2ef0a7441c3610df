mod format;
mod path;

pub use format::{format_timestamp, rst_heading};
pub use path::{file_name, unique_id};
