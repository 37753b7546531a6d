//! Planning side of reel rendering: timeline layout, transition catalog,
//! filter-graph compilation and transcoder argument templates. No I/O.

pub mod compiler;
pub mod render;
pub mod timeline;
pub mod transitions;

pub use compiler::*;
pub use timeline::*;
pub use transitions::*;
