//! Request handlers.

pub mod files;
pub mod health;
pub mod index;
pub mod logs;
pub mod vod;
pub mod webcam;

pub use files::*;
pub use health::*;
pub use index::*;
pub use logs::*;
pub use vod::*;
pub use webcam::*;
