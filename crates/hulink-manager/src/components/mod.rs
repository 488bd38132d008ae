//! Managed sub-components
//!
//! Each component owns one capability slice of the session (remote files,
//! permissions, screen), reports its readiness through [`SubComponent`]
//! and is created/disposed exclusively by the manager facade. They are
//! deliberately thin: the coordination layer only depends on their
//! readiness lifecycle and the asset-upload contract.

pub mod files;
pub mod permissions;
pub mod screen;

pub use files::{FileTransferComponent, UploadError};
pub use permissions::PermissionComponent;
pub use screen::{ScreenComponent, ScreenError};
