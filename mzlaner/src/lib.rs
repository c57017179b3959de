mod args;
mod driver;
mod progress;
mod time_range;
mod write;

pub use args::{Target, TargetParseError};
pub use driver::{MZLaner, MZLanerError, CONFIG_FILE_NAME, ENV_PREFIX};
pub use progress::ProgressRecord;
pub use time_range::{TimeRange, TimeRangeParseError};
pub use write::write_ensembles;
