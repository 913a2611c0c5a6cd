pub mod continuation;
pub mod sql_chain;
pub mod summary;
pub mod upload;

pub use continuation::continue_conversation;
pub use sql_chain::{SqlChain, SqlChainResult};
pub use summary::{NoProgress, ProgressSink, Summarizer, SummaryReport};
pub use upload::PdfExtractor;
