pub mod core;
pub mod delta;
pub mod sse;

pub use self::core::*;
pub use delta::extract_delta;
pub use sse::{Frame, LineSplitter, decode_frame};
