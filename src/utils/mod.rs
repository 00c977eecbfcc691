//! Utilities shared by the pipelines and the CLI
//!
//! - [`fs`] - directory creation and small file helpers
//! - [`path_validation`] - checks for untrusted path input
//! - [`progress`] - terminal progress for update cycles

pub mod fs;
pub mod path_validation;
pub mod progress;

pub use fs::{ensure_dir, remove_file_if_exists, top_level_entries};
pub use path_validation::sanitize_entry_path;
pub use progress::UpdateProgress;
