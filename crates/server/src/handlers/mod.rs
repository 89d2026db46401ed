//! HTTP request handlers.

pub mod admin;
pub mod common;
pub mod downloads;
pub mod logs;
pub mod releases;
pub mod rollback;
pub mod settings;
pub mod updates;

pub use admin::*;
pub use downloads::*;
pub use logs::*;
pub use releases::*;
pub use rollback::*;
pub use settings::*;
pub use updates::*;
