//! Environment detection module.
//!
//! Determines whether the program is running on the host or inside a container,
//! and with that where the host's root filesystem is found.
mod checks;
mod detect;
mod error;

pub use detect::{CONTAINER_ROOTFS, RuntimeEnvironment, detect_runtime_environment};
pub use error::{Error, Result};
