//! The assemble pipeline.
//!
//! ```text
//! Image, dtb.img, dtbo.img
//! per kind: manifest -> resolve -> stage -> package
//! boot.img + vendor_boot.img  (platform, dlkm, recovery fragments)
//! signed/<partition>.img      (AVB footers on copies)
//! artifacts.json
//! ```
//!
//! Every step runs to completion before the next starts; the first error
//! aborts the run.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::{
    build_dtbo, compose_boot_images, concat_dtbs, package_image, BootImageSpec, ImageKind,
    RamdiskFragment, RamdiskType,
};
use crate::common::copy_file_with_dirs;
use crate::config::Config;
use crate::error::PipelineError;
use crate::modules::{build_staging_tree, resolve_modules, ModuleManifest, StagingTree};
use crate::process::ToolRunner;
use crate::report::{ArtifactRecord, ArtifactReport};
use crate::sign::{sign_partition, SignedPartition, SigningPolicy};
use crate::timing::Timer;

pub const KERNEL_IMAGE: &str = "Image";
pub const DTB_IMAGE: &str = "dtb.img";
pub const DTBO_IMAGE: &str = "dtbo.img";
pub const BOOT_IMAGE: &str = "boot.img";
pub const VENDOR_BOOT_IMAGE: &str = "vendor_boot.img";

/// A packaged module image.
#[derive(Debug, Clone)]
pub struct ModuleImage {
    pub kind: ImageKind,
    pub path: PathBuf,
    pub kernel_release: String,
}

/// Manifest, resolution and staging for one kind. The returned tree owns
/// its staging directory.
pub fn stage_module_image(
    config: &Config,
    runner: &dyn ToolRunner,
    kind: ImageKind,
) -> Result<StagingTree> {
    let manifest = ModuleManifest::for_image(config, kind)?;
    let resolved = resolve_modules(
        &manifest,
        &config.installed_modules,
        config.strict_module_resolution,
    )?;
    build_staging_tree(
        config,
        runner,
        kind.name(),
        &manifest,
        &resolved,
        kind.mount_prefix(),
    )
}

/// Build one module image end to end. Staging is gone when this returns.
pub fn build_module_image(
    config: &Config,
    runner: &dyn ToolRunner,
    kind: ImageKind,
) -> Result<ModuleImage> {
    let tree = stage_module_image(config, runner, kind)?;
    let path = package_image(config, runner, kind, &tree)?;
    Ok(ModuleImage {
        kind,
        path,
        kernel_release: tree.kernel_release().to_string(),
    })
}

/// Ramdisk fragments for vendor_boot, in boot order.
pub fn vendor_ramdisk_fragments(config: &Config) -> Vec<RamdiskFragment> {
    let mut fragments = vec![
        RamdiskFragment::new("platform", RamdiskType::Platform, &config.platform_ramdisk),
        RamdiskFragment::new(
            "dlkm",
            RamdiskType::Dlkm,
            config.dist_dir.join(ImageKind::VendorRamdisk.output_name()),
        ),
    ];
    if let Some(recovery) = &config.recovery_ramdisk {
        fragments.push(RamdiskFragment::new("recovery", RamdiskType::Recovery, recovery));
    }
    fragments
}

/// Partitions that get a signed copy, with their dist file names.
pub fn signed_partitions() -> [(&'static str, &'static str); 5] {
    [
        ("boot", BOOT_IMAGE),
        ("vendor_boot", VENDOR_BOOT_IMAGE),
        ("dtbo", DTBO_IMAGE),
        ("vendor_dlkm", ImageKind::VendorDlkm.output_name()),
        ("system_dlkm", ImageKind::SystemDlkm.output_name()),
    ]
}

/// Run the whole pipeline, writing everything under `config.dist_dir`.
pub fn assemble(config: &Config, runner: &dyn ToolRunner) -> Result<ArtifactReport> {
    let dist = &config.dist_dir;
    fs::create_dir_all(dist).with_context(|| format!("Failed to create {}", dist.display()))?;

    let mut report = ArtifactReport::default();

    // Kernel
    let timer = Timer::start("Kernel image");
    let kernel = dist.join(KERNEL_IMAGE);
    copy_kernel(&config.kernel_image(), &kernel)?;
    report.push(ArtifactRecord::unsigned("kernel", &kernel)?);
    timer.finish();

    // Device trees
    let timer = Timer::start("Device trees");
    let dtb = dist.join(DTB_IMAGE);
    concat_dtbs(&config.dtb_dir, &dtb)?;
    report.push(ArtifactRecord::unsigned("dtb", &dtb)?);
    let dtbo = dist.join(DTBO_IMAGE);
    build_dtbo(&config.tools, runner, &config.dtbo_dir, &dtbo)?;
    report.push(ArtifactRecord::unsigned("dtbo", &dtbo)?);
    timer.finish();

    // Module images
    for kind in ImageKind::ALL {
        let timer = Timer::start(kind.name());
        let image = build_module_image(config, runner, kind)?;
        report.kernel_release = Some(image.kernel_release);
        report.push(ArtifactRecord::unsigned(kind.name(), &image.path)?);
        timer.finish();
    }

    // Boot images
    let timer = Timer::start("Boot images");
    let spec = BootImageSpec {
        kernel: kernel.clone(),
        dtb: dtb.clone(),
        bootconfig: config.bootconfig.clone(),
        fragments: vendor_ramdisk_fragments(config),
        boot_output: dist.join(BOOT_IMAGE),
        vendor_boot_output: dist.join(VENDOR_BOOT_IMAGE),
    };
    compose_boot_images(&config.tools, runner, &spec)?;
    report.push(ArtifactRecord::unsigned("boot", &spec.boot_output)?);
    report.push(ArtifactRecord::unsigned("vendor_boot", &spec.vendor_boot_output)?);
    timer.finish();

    // Signing
    let timer = Timer::start("Signing");
    let policy = SigningPolicy::default();
    let signed_dir = config.signed_dir();
    for (partition, file) in signed_partitions() {
        let copy = signed_dir.join(file);
        copy_file_with_dirs(&dist.join(file), &copy)?;
        let signed =
            sign_partition(&config.tools, &config.keys, runner, &policy, partition, &copy)?;
        report.push(ArtifactRecord::signed(partition, &signed)?);
    }
    timer.finish();

    report.write(dist)?;
    Ok(report)
}

/// Sign a single image in place.
pub fn sign_image(
    config: &Config,
    runner: &dyn ToolRunner,
    partition: &str,
    image: &Path,
) -> Result<SignedPartition> {
    sign_partition(
        &config.tools,
        &config.keys,
        runner,
        &SigningPolicy::default(),
        partition,
        image,
    )
}

fn copy_kernel(src: &Path, dst: &Path) -> Result<()> {
    if !src.is_file() {
        return Err(PipelineError::build(format!(
            "kernel image not found at {}",
            src.display()
        ))
        .into());
    }
    let bytes = copy_file_with_dirs(src, dst)?;
    tracing::info!("  Copied kernel image ({} KB)", bytes / 1024);
    Ok(())
}
