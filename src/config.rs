//! Configuration management for bootforge.
//!
//! Reads configuration from a .env file and environment variables.
//! Environment variables take precedence over .env file. The resulting
//! [`Config`] is built once at startup and handed to every stage by
//! reference; nothing reads the environment after that.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Locations of the prebuilt tools the pipeline drives.
#[derive(Debug, Clone)]
pub struct ToolSet {
    /// Archiver producing a newc cpio stream on stdout.
    pub mkbootfs: PathBuf,
    /// Compressor for ramdisk fragments.
    pub lz4: PathBuf,
    /// Filesystem image builder.
    pub mkfs_erofs: PathBuf,
    /// Module dependency metadata generator.
    pub depmod: PathBuf,
    /// Boot image composer.
    pub mkbootimg: PathBuf,
    /// Kernel module signer.
    pub sign_file: PathBuf,
    /// Verified-boot footer tool.
    pub avbtool: PathBuf,
    /// Device-tree overlay image builder.
    pub mkdtimg: PathBuf,
}

impl ToolSet {
    /// Resolve every tool: prebuilt bin dir first, then PATH.
    pub fn resolve(prebuilt_bin: &Path) -> Self {
        let find = |name: &str| -> PathBuf {
            let prebuilt = prebuilt_bin.join(name);
            if prebuilt.is_file() {
                return prebuilt;
            }
            crate::process::which(name).unwrap_or(prebuilt)
        };

        Self {
            mkbootfs: find("mkbootfs"),
            lz4: find("lz4"),
            mkfs_erofs: find("mkfs.erofs"),
            depmod: find("depmod"),
            mkbootimg: find("mkbootimg"),
            sign_file: find("sign-file"),
            avbtool: find("avbtool"),
            mkdtimg: find("mkdtimg"),
        }
    }

    /// All tools as (name, path) pairs, for preflight and display.
    pub fn entries(&self) -> [(&'static str, &Path); 8] {
        [
            ("mkbootfs", self.mkbootfs.as_path()),
            ("lz4", self.lz4.as_path()),
            ("mkfs.erofs", self.mkfs_erofs.as_path()),
            ("depmod", self.depmod.as_path()),
            ("mkbootimg", self.mkbootimg.as_path()),
            ("sign-file", self.sign_file.as_path()),
            ("avbtool", self.avbtool.as_path()),
            ("mkdtimg", self.mkdtimg.as_path()),
        ]
    }
}

/// Key material for module and partition signing.
#[derive(Debug, Clone)]
pub struct KeySet {
    /// Private key used by avbtool.
    pub avb_key: PathBuf,
    /// Private key used by sign-file.
    pub module_key: PathBuf,
    /// Certificate matching `module_key`.
    pub module_cert: PathBuf,
}

/// Bootforge configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Kernel build output root (contains arch/arm64/boot/Image).
    pub kernel_out: PathBuf,
    /// Installed module tree holding exactly one kernel-release directory.
    pub installed_modules: PathBuf,
    /// Prebuilt tools, keys, ramdisks and security contexts.
    pub prebuilts_dir: PathBuf,
    /// Where every artifact is written.
    pub dist_dir: PathBuf,
    /// Directory with `<kind>.modules[.early]` lists.
    pub module_lists_dir: PathBuf,
    /// Prebuilt platform ramdisk fragment.
    pub platform_ramdisk: PathBuf,
    /// Optional prebuilt recovery ramdisk fragment.
    pub recovery_ramdisk: Option<PathBuf>,
    /// Optional plain-text boot config.
    pub bootconfig: Option<PathBuf>,
    /// Directory containing compiled *.dtb files.
    pub dtb_dir: PathBuf,
    /// Directory containing compiled *.dtbo files.
    pub dtbo_dir: PathBuf,
    /// Fail instead of warn when a module basename appears more than once.
    pub strict_module_resolution: bool,
    /// Reject dependency maps that reference unstaged modules.
    pub validate_dep_closure: bool,
    /// Append-only build log.
    pub build_log: PathBuf,
    pub tools: ToolSet,
    pub keys: KeySet,
}

impl Config {
    /// Load configuration from .env file and environment.
    ///
    /// Relative paths are resolved against `base_dir`.
    pub fn load(base_dir: &Path) -> Self {
        // A missing .env is fine; values then come from the environment or defaults.
        dotenvy::from_path(base_dir.join(".env")).ok();

        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_vars(base_dir, &vars)
    }

    /// Build configuration from an explicit variable map.
    pub fn from_vars(base_dir: &Path, vars: &HashMap<String, String>) -> Self {
        let path = |key: &str, default: PathBuf| -> PathBuf {
            vars.get(key)
                .filter(|s| !s.is_empty())
                .map(|s| absolutize(base_dir, s))
                .unwrap_or(default)
        };
        let optional_path = |key: &str| -> Option<PathBuf> {
            vars.get(key)
                .filter(|s| !s.is_empty())
                .map(|s| absolutize(base_dir, s))
        };
        let flag = |key: &str, default: bool| -> bool {
            vars.get(key)
                .map(|v| matches!(v.trim(), "1" | "true" | "yes" | "on"))
                .unwrap_or(default)
        };

        let kernel_out = path("KERNEL_OUT", base_dir.join("out"));
        let prebuilts_dir = path("PREBUILTS_DIR", base_dir.join("prebuilts"));
        let dist_dir = path("DIST_DIR", base_dir.join("dist"));

        let installed_modules = path(
            "INSTALLED_MODULES",
            kernel_out.join("modules_install/lib/modules"),
        );
        let module_lists_dir = path("MODULE_LISTS_DIR", prebuilts_dir.join("modules"));
        let platform_ramdisk = path(
            "PLATFORM_RAMDISK",
            prebuilts_dir.join("ramdisk/vendor_ramdisk.cpio.lz4"),
        );
        let dtb_dir = path("DTB_DIR", kernel_out.join("arch/arm64/boot/dts/exynos"));
        let dtbo_dir = path("DTBO_DIR", kernel_out.join("arch/arm64/boot/dts/samsung"));
        let build_log = path("BUILD_LOG", dist_dir.join("bootforge.log"));

        let keys = KeySet {
            avb_key: path("AVB_KEY", prebuilts_dir.join("keys/testkey_rsa4096.pem")),
            module_key: path(
                "MODULE_SIGNING_KEY",
                kernel_out.join("certs/signing_key.pem"),
            ),
            module_cert: path(
                "MODULE_SIGNING_CERT",
                kernel_out.join("certs/signing_key.x509"),
            ),
        };

        let tools = ToolSet::resolve(&prebuilts_dir.join("bin"));

        Self {
            kernel_out,
            installed_modules,
            module_lists_dir,
            platform_ramdisk,
            recovery_ramdisk: optional_path("RECOVERY_RAMDISK"),
            bootconfig: optional_path("BOOTCONFIG"),
            dtb_dir,
            dtbo_dir,
            strict_module_resolution: flag("STRICT_MODULE_RESOLUTION", false),
            validate_dep_closure: flag("VALIDATE_DEP_CLOSURE", true),
            build_log,
            prebuilts_dir,
            dist_dir,
            tools,
            keys,
        }
    }

    /// Compiled kernel image.
    pub fn kernel_image(&self) -> PathBuf {
        self.kernel_out.join("arch/arm64/boot/Image")
    }

    /// Security-context mapping file for a filesystem image.
    pub fn file_contexts(&self, name: &str) -> PathBuf {
        self.prebuilts_dir.join("sepolicy").join(name)
    }

    /// Directory that receives signed copies of every artifact.
    pub fn signed_dir(&self) -> PathBuf {
        self.dist_dir.join("signed")
    }

    /// Print configuration for debugging.
    pub fn print(&self) {
        println!("Configuration:");
        println!("  KERNEL_OUT: {}", self.kernel_out.display());
        println!("  INSTALLED_MODULES: {}", self.installed_modules.display());
        println!("  PREBUILTS_DIR: {}", self.prebuilts_dir.display());
        println!("  DIST_DIR: {}", self.dist_dir.display());
        println!("  MODULE_LISTS_DIR: {}", self.module_lists_dir.display());
        println!("  PLATFORM_RAMDISK: {}", self.platform_ramdisk.display());
        println!("  RECOVERY_RAMDISK: {}", display_opt(&self.recovery_ramdisk));
        println!("  BOOTCONFIG: {}", display_opt(&self.bootconfig));
        println!("  DTB_DIR: {}", self.dtb_dir.display());
        println!("  DTBO_DIR: {}", self.dtbo_dir.display());
        println!("  AVB_KEY: {}", self.keys.avb_key.display());
        println!("  MODULE_SIGNING_KEY: {}", self.keys.module_key.display());
        println!("  MODULE_SIGNING_CERT: {}", self.keys.module_cert.display());
        println!("  STRICT_MODULE_RESOLUTION: {}", self.strict_module_resolution);
        println!("  VALIDATE_DEP_CLOSURE: {}", self.validate_dep_closure);
        println!("  BUILD_LOG: {}", self.build_log.display());
        println!("Tools:");
        for (name, path) in self.tools.entries() {
            let state = if path.is_file() { "FOUND" } else { "NOT FOUND" };
            println!("  {}: {} ({})", name, path.display(), state);
        }
    }
}

fn absolutize(base_dir: &Path, value: &str) -> PathBuf {
    let path = PathBuf::from(value.trim());
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

fn display_opt(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "(none)".to_string())
}
