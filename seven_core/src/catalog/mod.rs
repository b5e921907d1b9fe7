mod error;
mod manifest;
mod registry;

pub use error::ManifestError;
pub use manifest::{ClassManifest, FilterManifest, PolicyManifest, RuleManifest};
pub use registry::{abilities_for, ManifestClass, PolicyCatalog};

pub type Result<T> = std::result::Result<T, ManifestError>;
