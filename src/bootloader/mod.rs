//! Bootloader Entry Reconciler (§4.8) and Boot Payload Store (§4.9): a
//! parallel set of per-snapshot bootloader entries and kernel/initramfs
//! archives so that every retained filesystem snapshot stays bootable.
pub mod entry;
pub mod payload;

pub use entry::{reconcile, EntryOutcome, EntryStatus};
pub use payload::BootPayloadSnapshot;
