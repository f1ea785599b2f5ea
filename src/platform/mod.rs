//! Platform-specific module for Windows utilities.
//!
//! This module contains process lookup, registry access and icon generation.

#[cfg(windows)]
pub mod icons;
pub mod process;
#[cfg(windows)]
pub mod registry;

pub use process::{ProcessError, ProcessFinder, ProcessPattern};
#[cfg(windows)]
pub use registry::{RegistryError, StartupEntry};
