mod registry;
mod selectors;

pub use registry::{ModelRegistry, ModelSpec, VideoModel};
pub(crate) use registry::lookup_key;
pub use selectors::{normalize_model, ModelSelection, ModelSelector};
