//! Artifact resolution.
//!
//! Turns `(language, date, variant)` requests into files in the local cache:
//! - `variant`: artifact kinds, their parameters and file names
//! - `store`: remote storage (`HubStore`) and directory mirrors (`LocalMirror`)
//! - `catalog`: memoised listings of languages, dates and files
//! - `resolver`: date resolution, cache lookup and atomic downloads

pub mod catalog;
pub mod resolver;
pub mod store;
pub mod variant;

pub use catalog::Catalog;
pub use resolver::{ResolvedArtifact, Resolver};
pub use store::{HubStore, LocalMirror, RemoteStore};
pub use variant::{ArtifactKey, ArtifactVariant, DateSpec, LATEST, TokenUnit, TokenizerFormat};
