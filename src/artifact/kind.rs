//! The module images this pipeline knows how to build.

use std::fmt;
use std::str::FromStr;

use crate::error::PipelineError;

/// How a staging tree is turned into a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackagingMode {
    /// cpio stream compressed with lz4 (ramdisk fragment).
    Archive,
    /// Mountable EROFS image.
    Filesystem,
}

/// A module image built from a manifest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ImageKind {
    /// dlkm fragment of the vendor_boot ramdisk.
    VendorRamdisk,
    /// /vendor_dlkm partition.
    VendorDlkm,
    /// /system_dlkm partition (signed GKI modules).
    SystemDlkm,
}

impl ImageKind {
    pub const ALL: [ImageKind; 3] = [
        ImageKind::VendorRamdisk,
        ImageKind::VendorDlkm,
        ImageKind::SystemDlkm,
    ];

    pub fn name(self) -> &'static str {
        match self {
            ImageKind::VendorRamdisk => "vendor_ramdisk",
            ImageKind::VendorDlkm => "vendor_dlkm",
            ImageKind::SystemDlkm => "system_dlkm",
        }
    }

    pub fn mode(self) -> PackagingMode {
        match self {
            ImageKind::VendorRamdisk => PackagingMode::Archive,
            ImageKind::VendorDlkm | ImageKind::SystemDlkm => PackagingMode::Filesystem,
        }
    }

    /// Absolute path the image's root is mounted at on the device.
    ///
    /// The ramdisk is unpacked at `/`, so its prefix is empty.
    pub fn mount_prefix(self) -> &'static str {
        match self {
            ImageKind::VendorRamdisk => "",
            ImageKind::VendorDlkm => "/vendor_dlkm",
            ImageKind::SystemDlkm => "/system_dlkm",
        }
    }

    /// Security-context mapping file (under `sepolicy/`) for filesystem images.
    pub fn file_contexts(self) -> Option<&'static str> {
        match self {
            ImageKind::VendorRamdisk => None,
            ImageKind::VendorDlkm => Some("vendor_file_contexts"),
            ImageKind::SystemDlkm => Some("system_file_contexts"),
        }
    }

    /// Whether every module is code-signed before packaging.
    pub fn signs_modules(self) -> bool {
        matches!(self, ImageKind::SystemDlkm)
    }

    /// File name of the packaged artifact in the dist directory.
    pub fn output_name(self) -> &'static str {
        match self {
            ImageKind::VendorRamdisk => "vendor_ramdisk_dlkm.cpio.lz4",
            ImageKind::VendorDlkm => "vendor_dlkm.img",
            ImageKind::SystemDlkm => "system_dlkm.img",
        }
    }
}

impl fmt::Display for ImageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for ImageKind {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ImageKind::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| PipelineError::config(format!("unknown image kind '{}'", s)))
    }
}
