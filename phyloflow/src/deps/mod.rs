//! External tool and interpreter-package dependency resolution.
//!
//! Absence of a dependency is routine, not exceptional: every question about
//! a dependency is answered with a measured [`DependencyStatus`] value, and
//! only a run that actually needs a missing dependency turns that value into
//! an error.

mod resolver;
mod spec;

pub use resolver::DependencyResolver;
pub use spec::{
    standard_catalog, DependencyKind, DependencySpec, DependencyStatus, InstallerBackend,
};
