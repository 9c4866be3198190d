//! Build input checks (kernel, module tree, lists, prebuilts, keys).

use std::path::Path;

use crate::artifact::ImageKind;
use crate::common::files_with_extension;
use crate::config::Config;
use crate::modules::{image_sources, ManifestSource, ModuleManifest};

use super::types::CheckResult;
use super::validators::{
    validate_kernel_image, validate_module_list, validate_module_tree, validate_pem,
};

/// Check every file and directory assemble reads.
pub fn check_inputs(config: &Config) -> Vec<CheckResult> {
    let mut results = Vec::new();

    let kernel = config.kernel_image();
    results.push(if kernel.is_file() {
        match validate_kernel_image(&kernel) {
            Ok(size) => CheckResult::pass_with("kernel Image", &format!("{} KB", size / 1024)),
            Err(e) => CheckResult::fail("kernel Image", &e),
        }
    } else {
        CheckResult::fail("kernel Image", &format!("Not found at {}", kernel.display()))
    });

    results.push(match validate_module_tree(&config.installed_modules) {
        Ok((release, count)) => CheckResult::pass_with(
            "installed modules",
            &format!("{} ({} modules)", release, count),
        ),
        Err(e) => CheckResult::fail("installed modules", &e),
    });

    for kind in ImageKind::ALL {
        let sources = image_sources(&config.module_lists_dir, kind);
        results.extend(sources.iter().map(check_list_source));

        // A missing required list already failed above
        if sources.iter().all(|s| !s.required || s.path.is_file()) {
            let name = format!("{} manifest", kind);
            results.push(match ModuleManifest::for_image(config, kind) {
                Ok(manifest) => {
                    CheckResult::pass_with(&name, &format!("{} modules", manifest.len()))
                }
                Err(e) => CheckResult::fail(&name, &format!("{:#}", e)),
            });
        }

        if let Some(contexts) = kind.file_contexts() {
            results.push(required_file(
                &format!("{} file contexts", kind),
                &config.file_contexts(contexts),
            ));
        }
    }

    results.push(required_file("platform ramdisk", &config.platform_ramdisk));
    results.push(optional_file("recovery ramdisk", config.recovery_ramdisk.as_deref()));
    results.push(optional_file("bootconfig", config.bootconfig.as_deref()));

    results.push(blob_dir("device trees", &config.dtb_dir, "dtb"));
    results.push(blob_dir("device-tree overlays", &config.dtbo_dir, "dtbo"));

    results.push(key("AVB key", &config.keys.avb_key, "PRIVATE KEY"));
    results.push(key("module signing key", &config.keys.module_key, "PRIVATE KEY"));
    results.push(required_file("module signing cert", &config.keys.module_cert));

    results.push(check_dist_writable(&config.dist_dir));

    results
}

/// One list file on its own. Empty lists only warn: the combined manifest
/// check decides whether the kind has any modules at all.
fn check_list_source(source: &ManifestSource) -> CheckResult {
    if !source.path.is_file() {
        let details = format!("Not found at {}", source.path.display());
        return if source.required {
            CheckResult::fail(&source.name, &details)
        } else {
            CheckResult::warn(&source.name, &details)
        };
    }
    match validate_module_list(&source.path) {
        Ok(0) => CheckResult::warn(&source.name, "no module entries"),
        Ok(n) => CheckResult::pass_with(&source.name, &format!("{} entries", n)),
        Err(e) => CheckResult::fail(&source.name, &e),
    }
}

fn required_file(name: &str, path: &Path) -> CheckResult {
    if path.is_file() {
        CheckResult::pass_with(name, &path.display().to_string())
    } else {
        CheckResult::fail(name, &format!("Not found at {}", path.display()))
    }
}

fn optional_file(name: &str, path: Option<&Path>) -> CheckResult {
    match path {
        None => CheckResult::skip(name, "not configured"),
        Some(path) => required_file(name, path),
    }
}

fn key(name: &str, path: &Path, block: &str) -> CheckResult {
    if !path.is_file() {
        return CheckResult::fail(name, &format!("Not found at {}", path.display()));
    }
    match validate_pem(path, block) {
        Ok(()) => CheckResult::pass(name),
        Err(e) => CheckResult::fail(name, &e),
    }
}

fn blob_dir(name: &str, dir: &Path, ext: &str) -> CheckResult {
    match files_with_extension(dir, ext) {
        Ok(files) if !files.is_empty() => {
            CheckResult::pass_with(name, &format!("{} *.{} files", files.len(), ext))
        }
        Ok(_) => CheckResult::fail(name, &format!("No *.{} files in {}", ext, dir.display())),
        Err(_) => CheckResult::fail(name, &format!("Not found at {}", dir.display())),
    }
}

fn check_dist_writable(dist_dir: &Path) -> CheckResult {
    if let Err(e) = std::fs::create_dir_all(dist_dir) {
        return CheckResult::fail("dist writable", &format!("Cannot create: {}", e));
    }
    let marker = dist_dir.join(".preflight-test");
    match std::fs::write(&marker, "test") {
        Ok(_) => {
            let _ = std::fs::remove_file(&marker);
            CheckResult::pass_with("dist writable", &dist_dir.display().to_string())
        }
        Err(e) => CheckResult::fail("dist writable", &format!("Cannot write: {}", e)),
    }
}
