//! Text preparation: bilingual line filtering and chunking.

mod chunker;
mod filter;

pub use chunker::TextSplitter;
pub use filter::{JoinMode, LineFilter};
