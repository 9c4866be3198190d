//! Build artifacts - module images, device-tree images and boot images.
//!
//! - `kind` - the three module image kinds and how each is packaged
//! - `package` - lz4 cpio fragments and EROFS partitions
//! - `dtb` - dtb.img concatenation and dtbo.img packing
//! - `boot` - boot.img / vendor_boot.img composition

pub mod boot;
pub mod dtb;
pub mod kind;
pub mod package;

pub use boot::{compose_boot_images, BootImageSpec, RamdiskFragment, RamdiskType};
pub use dtb::{build_dtbo, concat_dtbs};
pub use kind::{ImageKind, PackagingMode};
pub use package::package_image;
