//! Vector index and the conversational retrieval loop

mod index;
mod session;

pub use index::{UpsertReport, VectorIndex};
pub use session::{RetrievalSession, SessionAnswer};
