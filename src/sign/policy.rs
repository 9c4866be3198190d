//! Partition signing policy: footer class and partition size per partition.

use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

/// Bytes reserved after the image for AVB footer metadata.
pub const FOOTER_HEADROOM: u64 = 131_072;

/// Partition sizes are rounded up to this.
pub const BLOCK_SIZE: u64 = 4096;

/// Size of the boot and vendor_boot partitions.
pub const BOOT_PARTITION_SIZE: u64 = 64 * 1024 * 1024;

/// Kind of verified-boot footer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FooterClass {
    /// One hash over the whole padded image, checked before use.
    Hash,
    /// Per-block hash tree, checked incrementally as blocks are read.
    Hashtree,
}

impl FooterClass {
    /// avbtool subcommand adding this footer.
    pub fn avbtool_command(self) -> &'static str {
        match self {
            FooterClass::Hash => "add_hash_footer",
            FooterClass::Hashtree => "add_hashtree_footer",
        }
    }
}

impl fmt::Display for FooterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FooterClass::Hash => f.write_str("hash"),
            FooterClass::Hashtree => f.write_str("hashtree"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionSize {
    Fixed(u64),
    /// Derived from the image with [`padded_size`].
    Computed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PartitionRule {
    pub footer: FooterClass,
    pub size: PartitionSize,
}

impl PartitionRule {
    /// Rule for any partition the policy does not list.
    pub const DEFAULT: PartitionRule = PartitionRule {
        footer: FooterClass::Hashtree,
        size: PartitionSize::Computed,
    };
}

/// `ceil((raw + FOOTER_HEADROOM) / BLOCK_SIZE) * BLOCK_SIZE`.
pub fn padded_size(raw_size: u64) -> u64 {
    (raw_size + FOOTER_HEADROOM).div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// Partition name -> rule. Unlisted partitions get [`PartitionRule::DEFAULT`].
#[derive(Debug, Clone)]
pub struct SigningPolicy {
    rules: BTreeMap<String, PartitionRule>,
}

impl Default for SigningPolicy {
    fn default() -> Self {
        let boot = PartitionRule {
            footer: FooterClass::Hash,
            size: PartitionSize::Fixed(BOOT_PARTITION_SIZE),
        };

        Self::empty()
            .with_rule("boot", boot)
            .with_rule("vendor_boot", boot)
            .with_rule("dtbo", PartitionRule::DEFAULT)
    }
}

impl SigningPolicy {
    pub fn empty() -> Self {
        Self {
            rules: BTreeMap::new(),
        }
    }

    pub fn with_rule(mut self, partition: &str, rule: PartitionRule) -> Self {
        self.rules.insert(partition.to_string(), rule);
        self
    }

    pub fn rule(&self, partition: &str) -> PartitionRule {
        self.rules
            .get(partition)
            .copied()
            .unwrap_or(PartitionRule::DEFAULT)
    }

    pub fn footer_class(&self, partition: &str) -> FooterClass {
        self.rule(partition).footer
    }

    /// Partition size for an image of `raw_size` bytes.
    pub fn padded_size(&self, partition: &str, raw_size: u64) -> u64 {
        match self.rule(partition).size {
            PartitionSize::Fixed(size) => size,
            PartitionSize::Computed => padded_size(raw_size),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_boot_size_is_fixed() {
        let policy = SigningPolicy::default();
        assert_eq!(policy.padded_size("boot", 1), 67_108_864);
        assert_eq!(policy.padded_size("boot", 40_000_000), 67_108_864);
    }

    #[test]
    fn test_unlisted_size_is_computed() {
        let policy = SigningPolicy::default();
        let expected = (10_000_000u64 + 131_072).div_ceil(4096) * 4096;
        assert_eq!(policy.padded_size("odm_dlkm", 10_000_000), expected);
        assert_eq!(expected, 10_133_504);
    }

    #[test]
    fn test_padded_size_block_aligned() {
        assert_eq!(padded_size(0), 131_072);
        assert_eq!(padded_size(1), 131_072 + 4096);
        assert_eq!(padded_size(4096) % BLOCK_SIZE, 0);
    }

    #[test]
    fn test_footer_classes() {
        let policy = SigningPolicy::default();
        assert_eq!(policy.footer_class("boot"), FooterClass::Hash);
        assert_eq!(policy.footer_class("vendor_boot"), FooterClass::Hash);
        assert_eq!(policy.footer_class("dtbo"), FooterClass::Hashtree);
        assert_eq!(policy.footer_class("vendor_dlkm"), FooterClass::Hashtree);
        assert_eq!(policy.footer_class("anything_else"), FooterClass::Hashtree);
    }
}
