//! Configuration section definitions.
//!
//! Each module corresponds to a section in `phantom.toml`:
//!
//! | Module   | TOML Section | Purpose                              |
//! |----------|--------------|--------------------------------------|
//! | `site`   | `[site]`     | Source and public address, mirror dir |
//! | `mirror` | `[mirror]`   | wget binary and recursion depth      |
//! | `serve`  | `[serve]`    | Preview server                       |
//! | `deploy` | `[deploy]`   | Publishing repository                |

mod deploy;
mod mirror;
mod serve;
mod site;

pub use deploy::DeployConfig;
pub use mirror::MirrorConfig;
pub use serve::ServeConfig;
pub use site::{DEFAULT_SOURCE, SiteSectionConfig};
