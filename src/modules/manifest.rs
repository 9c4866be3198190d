//! Module manifests: ordered lists of module file names.
//!
//! Order is the boot-time load order, so sources are concatenated exactly
//! as supplied (early lists before normal lists) with no sorting or
//! de-duplication.

use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};

use crate::artifact::ImageKind;
use crate::config::Config;
use crate::error::PipelineError;

/// Suffix every manifest entry must carry.
pub const MODULE_SUFFIX: &str = ".ko";

/// One named list file contributing to a manifest.
#[derive(Debug, Clone)]
pub struct ManifestSource {
    pub name: String,
    pub path: PathBuf,
    /// A missing required source is a configuration error; a missing
    /// optional one is skipped.
    pub required: bool,
}

impl ManifestSource {
    pub fn required(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required: true,
        }
    }

    pub fn optional(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            required: false,
        }
    }
}

/// Non-empty, ordered list of module file names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModuleManifest {
    entries: Vec<String>,
}

impl ModuleManifest {
    /// Build a manifest from already-parsed entries.
    pub fn from_entries(entries: Vec<String>) -> Result<Self> {
        if entries.is_empty() {
            return Err(PipelineError::config("module manifest is empty").into());
        }
        if let Some(bad) = entries.iter().find(|e| !e.ends_with(MODULE_SUFFIX)) {
            return Err(PipelineError::config(format!(
                "manifest entry '{}' is not a {} module",
                bad, MODULE_SUFFIX
            ))
            .into());
        }
        Ok(Self { entries })
    }

    /// Read and concatenate `sources` in the order given.
    pub fn from_sources(sources: &[ManifestSource]) -> Result<Self> {
        let mut entries = Vec::new();

        for source in sources {
            if !source.path.is_file() {
                if source.required {
                    return Err(PipelineError::config(format!(
                        "required module list '{}' not found at {}",
                        source.name,
                        source.path.display()
                    ))
                    .into());
                }
                tracing::warn!(
                    "Optional module list '{}' absent ({})",
                    source.name,
                    source.path.display()
                );
                continue;
            }

            let content = fs::read_to_string(&source.path)
                .with_context(|| format!("Failed to read {}", source.path.display()))?;
            let list = parse_module_list(&content);
            tracing::debug!("Module list '{}': {} entries", source.name, list.len());
            entries.extend(list);
        }

        Self::from_entries(entries).with_context(|| {
            let names: Vec<&str> = sources.iter().map(|s| s.name.as_str()).collect();
            format!("Invalid module manifest from [{}]", names.join(", "))
        })
    }

    /// Manifest for an image kind: `<kind>.modules.early` (optional) then
    /// `<kind>.modules` (required), both from the module lists directory.
    pub fn for_image(config: &Config, kind: ImageKind) -> Result<Self> {
        Self::from_sources(&image_sources(&config.module_lists_dir, kind))
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Early list first, then the normal list.
pub fn image_sources(lists_dir: &Path, kind: ImageKind) -> Vec<ManifestSource> {
    vec![
        ManifestSource::optional(
            format!("{}.modules.early", kind.name()),
            lists_dir.join(format!("{}.modules.early", kind.name())),
        ),
        ManifestSource::required(
            format!("{}.modules", kind.name()),
            lists_dir.join(format!("{}.modules", kind.name())),
        ),
    ]
}

/// Strip comments and blank lines, trimming whitespace.
pub fn parse_module_list(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};

    #[test]
    fn test_parse_strips_comments_and_blanks() {
        let content = "# early modules\n\nclk.ko\n   \n  pinctrl.ko  \n# trailing\n";
        assert_eq!(parse_module_list(content), vec!["clk.ko", "pinctrl.ko"]);
    }

    #[test]
    fn test_sources_concatenate_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let early = dir.path().join("early");
        let normal = dir.path().join("normal");
        fs::write(&early, "z.ko\na.ko\n").unwrap();
        fs::write(&normal, "# comment\nm.ko\na.ko\n").unwrap();

        let manifest = ModuleManifest::from_sources(&[
            ManifestSource::required("early", &early),
            ManifestSource::required("normal", &normal),
        ])
        .unwrap();

        // No sorting, no de-duplication
        assert_eq!(manifest.entries(), &["z.ko", "a.ko", "m.ko", "a.ko"]);
    }

    #[test]
    fn test_missing_optional_source_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let normal = dir.path().join("normal");
        fs::write(&normal, "a.ko\n").unwrap();

        let manifest = ModuleManifest::from_sources(&[
            ManifestSource::optional("early", dir.path().join("absent")),
            ManifestSource::required("normal", &normal),
        ])
        .unwrap();
        assert_eq!(manifest.entries(), &["a.ko"]);
    }

    #[derive(Clone, Default)]
    struct LogBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for LogBuffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_missing_optional_source_logged_as_warning() {
        let dir = tempfile::tempdir().unwrap();
        let normal = dir.path().join("normal");
        fs::write(&normal, "a.ko\n").unwrap();

        let logs = LogBuffer::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::WARN)
            .finish();
        tracing::subscriber::with_default(subscriber, || {
            ModuleManifest::from_sources(&[
                ManifestSource::optional("early", dir.path().join("absent")),
                ManifestSource::required("normal", &normal),
            ])
            .unwrap();
        });

        let text = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert!(text.contains("WARN"), "{}", text);
        assert!(text.contains("Optional module list 'early' absent"), "{}", text);
    }

    #[test]
    fn test_missing_required_source_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = ModuleManifest::from_sources(&[ManifestSource::required(
            "normal",
            dir.path().join("absent"),
        )])
        .unwrap_err();

        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_comment_only_source_is_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let normal = dir.path().join("normal");
        fs::write(&normal, "# nothing here\n\n").unwrap();

        let err = ModuleManifest::from_sources(&[ManifestSource::required("normal", &normal)])
            .unwrap_err();
        assert!(matches!(
            crate::error::classify(&err),
            Some(PipelineError::Config(_))
        ));
    }

    #[test]
    fn test_entry_without_suffix_rejected() {
        let err = ModuleManifest::from_entries(vec!["a.ko".into(), "modules.dep".into()])
            .unwrap_err();
        assert!(err.to_string().contains("modules.dep"));
    }

    #[test]
    fn test_image_sources_early_first() {
        let sources = image_sources(Path::new("/lists"), ImageKind::VendorDlkm);
        assert_eq!(sources[0].name, "vendor_dlkm.modules.early");
        assert!(!sources[0].required);
        assert_eq!(sources[1].path, PathBuf::from("/lists/vendor_dlkm.modules"));
        assert!(sources[1].required);
    }
}
