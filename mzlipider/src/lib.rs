mod driver;
mod io;
mod proc;
mod progress;
mod time_range;
mod types;
mod write;

pub use driver::{MZLipider, MZLipiderError};
pub use io::{read_hits, read_scans, ScanRecord};
pub use proc::CancellationToken;
pub use progress::ProgressRecord;
pub use time_range::{TimeRange, TimeRangeParseError};
