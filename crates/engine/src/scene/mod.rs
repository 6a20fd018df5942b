//! Scene compilation.

pub mod manifest;

pub use manifest::{ExitEntry, ManifestBuilder, ManifestEntry, NarratorManifest, PlayerSummary};
