//! Path and URL utilities.
//!
//! Pure functions for path manipulation. No side effects.
//!
//! - [`fs`]: Filesystem path normalization (`normalize_path`, `expand_tilde`, `expand_dir`)
//! - [`route`]: URL utilities (`is_external_link`, `split_path_fragment`)

pub mod fs;
pub mod route;

pub use fs::{expand_dir, expand_tilde, normalize_path};
pub use route::{is_external_link, split_path_fragment};
