//! Boot image composition with mkbootimg (header v4).
//!
//! One invocation writes both `boot.img` (kernel) and `vendor_boot.img`
//! (dtb, bootconfig and the ordered vendor ramdisk fragments).

use anyhow::Result;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::ToolSet;
use crate::error::PipelineError;
use crate::process::{Cmd, ToolRunner};

/// Boot image header version.
pub const BOOT_HEADER_VERSION: u32 = 4;

/// Logical vendor ramdisk fragment type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RamdiskType {
    None,
    Platform,
    Recovery,
    Dlkm,
}

impl RamdiskType {
    /// Value for `--ramdisk_type`.
    pub fn as_arg(self) -> &'static str {
        match self {
            RamdiskType::None => "NONE",
            RamdiskType::Platform => "PLATFORM",
            RamdiskType::Recovery => "RECOVERY",
            RamdiskType::Dlkm => "DLKM",
        }
    }
}

impl fmt::Display for RamdiskType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_arg())
    }
}

/// One named vendor ramdisk fragment.
#[derive(Debug, Clone)]
pub struct RamdiskFragment {
    pub name: String,
    pub ramdisk_type: RamdiskType,
    pub path: PathBuf,
}

impl RamdiskFragment {
    pub fn new(name: &str, ramdisk_type: RamdiskType, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.to_string(),
            ramdisk_type,
            path: path.into(),
        }
    }
}

/// Inputs and outputs of one composition.
#[derive(Debug, Clone)]
pub struct BootImageSpec {
    pub kernel: PathBuf,
    pub dtb: PathBuf,
    pub bootconfig: Option<PathBuf>,
    /// Order is kept on the command line and therefore in the image.
    pub fragments: Vec<RamdiskFragment>,
    pub boot_output: PathBuf,
    pub vendor_boot_output: PathBuf,
}

impl BootImageSpec {
    /// Every input file the composition reads.
    pub fn inputs(&self) -> Vec<(String, &Path)> {
        let mut inputs = vec![
            ("kernel".to_string(), self.kernel.as_path()),
            ("dtb".to_string(), self.dtb.as_path()),
        ];
        if let Some(bootconfig) = &self.bootconfig {
            inputs.push(("bootconfig".to_string(), bootconfig.as_path()));
        }
        for fragment in &self.fragments {
            inputs.push((
                format!("{} ramdisk '{}'", fragment.ramdisk_type, fragment.name),
                fragment.path.as_path(),
            ));
        }
        inputs
    }

    /// Inputs that do not exist, each described.
    pub fn missing_inputs(&self) -> Vec<String> {
        self.inputs()
            .into_iter()
            .filter(|(_, path)| !path.is_file())
            .map(|(what, path)| format!("{} ({})", what, path.display()))
            .collect()
    }

    /// mkbootimg invocation for these inputs.
    pub fn command(&self, tools: &ToolSet) -> Cmd {
        let mut cmd = Cmd::tool(&tools.mkbootimg)
            .arg("--header_version")
            .arg(BOOT_HEADER_VERSION.to_string())
            .arg("--kernel")
            .arg_path(&self.kernel)
            .arg("--output")
            .arg_path(&self.boot_output)
            .arg("--vendor_boot")
            .arg_path(&self.vendor_boot_output)
            .arg("--dtb")
            .arg_path(&self.dtb);

        if let Some(bootconfig) = &self.bootconfig {
            cmd = cmd.arg("--vendor_bootconfig").arg_path(bootconfig);
        }

        for fragment in &self.fragments {
            cmd = cmd
                .args(["--ramdisk_type", fragment.ramdisk_type.as_arg()])
                .args(["--ramdisk_name", fragment.name.as_str()])
                .arg("--vendor_ramdisk_fragment")
                .arg_path(&fragment.path);
        }

        cmd.error_msg("mkbootimg failed")
    }
}

/// Validate inputs, then run mkbootimg.
///
/// Missing inputs are each logged and the tool is never started.
pub fn compose_boot_images(
    tools: &ToolSet,
    runner: &dyn ToolRunner,
    spec: &BootImageSpec,
) -> Result<()> {
    let missing = spec.missing_inputs();
    if !missing.is_empty() {
        for what in &missing {
            tracing::error!("Missing boot image input: {}", what);
        }
        return Err(PipelineError::build(format!(
            "{} boot image input(s) missing: {}",
            missing.len(),
            missing.join(", ")
        ))
        .into());
    }

    tracing::info!(
        "Composing boot images (header v{}, {} ramdisk fragments)",
        BOOT_HEADER_VERSION,
        spec.fragments.len()
    );

    let outputs = [&spec.boot_output, &spec.vendor_boot_output];
    for output in outputs {
        remove_if_exists(output);
    }

    let result = runner
        .run(spec.command(tools))
        .map_err(|e| anyhow::Error::from(PipelineError::build(format!("{:#}", e))))
        .and_then(|_| {
            match outputs.iter().find(|o| !o.is_file()) {
                Some(absent) => Err(PipelineError::build(format!(
                    "mkbootimg did not produce {}",
                    absent.display()
                ))
                .into()),
                None => Ok(()),
            }
        });

    if result.is_err() {
        for output in outputs {
            remove_if_exists(output);
        }
    }
    result
}

fn remove_if_exists(path: &Path) {
    if path.exists() {
        if let Err(e) = fs::remove_file(path) {
            tracing::warn!("Failed to remove {}: {}", path.display(), e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec() -> BootImageSpec {
        BootImageSpec {
            kernel: PathBuf::from("/dist/Image"),
            dtb: PathBuf::from("/dist/dtb.img"),
            bootconfig: Some(PathBuf::from("/cfg/bootconfig")),
            fragments: vec![
                RamdiskFragment::new(
                    "platform",
                    RamdiskType::Platform,
                    "/pre/vendor_ramdisk.cpio.lz4",
                ),
                RamdiskFragment::new(
                    "dlkm",
                    RamdiskType::Dlkm,
                    "/dist/vendor_ramdisk_dlkm.cpio.lz4",
                ),
                RamdiskFragment::new("recovery", RamdiskType::Recovery, "/pre/recovery.cpio.lz4"),
            ],
            boot_output: PathBuf::from("/dist/boot.img"),
            vendor_boot_output: PathBuf::from("/dist/vendor_boot.img"),
        }
    }

    #[test]
    fn test_command_keeps_fragment_order() {
        let tools = ToolSet::resolve(Path::new("/prebuilts/bin"));
        let args = spec().command(&tools).get_args().to_vec();

        let types: Vec<&str> = args
            .iter()
            .enumerate()
            .filter(|(_, a)| *a == "--ramdisk_type")
            .map(|(i, _)| args[i + 1].as_str())
            .collect();
        assert_eq!(types, vec!["PLATFORM", "DLKM", "RECOVERY"]);

        let pos = args.iter().position(|a| a == "--header_version").unwrap();
        assert_eq!(args[pos + 1], "4");
        assert!(args.iter().any(|a| a == "--vendor_bootconfig"));
    }

    #[test]
    fn test_missing_inputs_listed_individually() {
        let missing = spec().missing_inputs();
        // None of the paths exist
        assert_eq!(missing.len(), 6);
        assert!(missing[0].starts_with("kernel"));
        assert!(missing.iter().any(|m| m.contains("DLKM ramdisk 'dlkm'")));
    }
}
