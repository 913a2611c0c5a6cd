use clap::{Parser, Subcommand};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pdf-summarizer")]
#[command(author, version, about = "Summarize PDFs and ask questions about them", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Send a PDF to the extraction service and store its conversation
    Upload { pdf: PathBuf },

    /// Summarize a plain-text file chunk by chunk
    Summarize {
        file: PathBuf,

        /// Override the configured chunk size in characters
        #[arg(long)]
        max_chars_per_request: Option<usize>,
    },

    /// Answer a question with SQL over the stored conversation
    Ask {
        question: String,

        /// Also print the generated query and its result
        #[arg(long)]
        steps: bool,
    },

    /// Answer a question with the model, using the stored conversation as context
    Chat { question: String },

    /// Delete every stored message
    Clear,

    /// Start an interactive session
    Interactive {
        /// PDF to upload when the session starts
        #[arg(long)]
        pdf: Option<PathBuf>,
    },
}
