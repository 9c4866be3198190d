//! Kernel module handling: manifests, resolution, staging.
//!
//! - `manifest` - ordered module lists (early lists first)
//! - `resolve` - basename lookup in the installed module tree
//! - `depmap` - `modules.dep` parsing and mount-prefix rewriting
//! - `staging` - flat on-device module layout in a scoped work dir

pub mod depmap;
pub mod manifest;
pub mod resolve;
pub mod staging;

pub use depmap::DependencyMap;
pub use manifest::{image_sources, parse_module_list, ManifestSource, ModuleManifest, MODULE_SUFFIX};
pub use resolve::{resolve_modules, ResolvedModule};
pub use staging::{build_staging_tree, find_kernel_release, StagingTree};
