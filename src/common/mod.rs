//! Shared utilities across bootforge modules.

pub mod files;
pub mod temp;

pub use files::{
    copy_file_with_dirs, ensure_parent_exists, files_with_extension, write_file_with_dirs,
};
pub use temp::{TempFile, WorkDir};
