mod canonical;
mod credentials;
mod mode;
mod resolution;

pub use canonical::{
    mime_for_path, validate, CanonicalRequest, GenerationRequest, InputImage, MediaParams,
};
pub use credentials::{resolve_credential, Credential};
pub use mode::{resolve_media_kind, select_mode, GenerationMode, KindResolution, MediaKind};
pub use resolution::{
    lookup_resolution, normalize_resolution, select_resolution, Resolution, ResolutionSelection,
};
