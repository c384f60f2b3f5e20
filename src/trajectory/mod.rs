//! Agent trajectory conversion.
//!
//! Every stage that runs the coding agent with an output directory leaves
//! raw completion logs behind. Accepted stages convert the newest log into
//! a normalized message record under the runtime's `converted_data/`.
//!
//! ```rust,ignore
//! use swe_playground::trajectory::convert_log;
//!
//! let path = convert_log(&log_dir, &runtime.join("converted_data"), "1.1.1_fix").await?;
//! ```

pub mod converter;
pub mod types;

pub use converter::{
    convert_log, load_trajectory, normalize, select_completion_log, COMPLETIONS_DIR,
};
pub use types::{CompletionLog, ConvertedTrajectory, MessageContent, TrajectoryMessage};
