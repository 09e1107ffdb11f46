pub mod error;
pub mod events;
pub mod models;
pub mod request;
pub mod runs;
pub mod settings;

pub use error::GenerationError;
