pub mod config;
pub mod debug;
pub mod lipsync;

pub use self::config::*;
pub use self::debug::*;
pub use self::lipsync::*;
