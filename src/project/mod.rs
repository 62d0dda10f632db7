pub mod manifest;

pub use manifest::{find_manifest, ManifestError, WaspManifest, MANIFEST_FILE};
