//! Tabular input and output
//!
//! Reads cell coordinate tables and writes dated region tables as CSV.

mod reader;
mod types;
mod writer;

pub use reader::{read_points, read_points_file};
pub use types::{CoordinateColumns, PointTable, SkippedRow, TableError};
pub use writer::{dated_file_name, write_table, write_table_file};
