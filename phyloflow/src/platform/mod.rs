//! Host platform detection, shell selection, and path-grammar translation.
//!
//! A single [`PlatformAdapter`] is constructed once per process lifetime and
//! passed explicitly to every collaborator that needs to address the host -
//! there is no hidden global platform state.

mod host;
mod paths;

pub use host::{HostKind, PlatformAdapter};
pub use paths::PathDirection;
