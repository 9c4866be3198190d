//! Signing: kernel module code-signing and verified-boot partition footers.

pub mod avb;
pub mod module;
pub mod policy;

pub use avb::{sign_partition, SignedPartition, AVB_ALGORITHM};
pub use module::{sign_modules, MODULE_SIG_HASH};
pub use policy::{padded_size, FooterClass, PartitionRule, PartitionSize, SigningPolicy};
