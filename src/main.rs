use anyhow::{Context, Result};
use clap::Parser;
use pdf_summarizer::cli::{Cli, Commands};
use pdf_summarizer::utils::{self, TerminalProgress};
use pdf_summarizer::{Session, Settings, SqlChainResult};
use std::path::{Path, PathBuf};
use tokio::io::{self, AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let mut settings = Settings::new().context("failed to load settings")?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&settings.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let api_key = Settings::api_key();
    let cli = Cli::parse();

    if let Commands::Summarize {
        max_chars_per_request: Some(chars),
        ..
    } = &cli.command
    {
        settings.summarizer.max_chars_per_request = *chars;
    }

    let mut session = Session::start(settings, api_key)?;

    match cli.command {
        Commands::Upload { pdf } => handle_upload(&mut session, &pdf).await,
        Commands::Summarize { file, .. } => handle_summarize(&mut session, &file).await,
        Commands::Ask { question, steps } => handle_ask(&session, &question, steps).await,
        Commands::Chat { question } => handle_chat(&mut session, &question).await,
        Commands::Clear => handle_clear(&mut session),
        Commands::Interactive { pdf } => handle_interactive(&mut session, pdf).await,
    }
}

async fn handle_upload(session: &mut Session, pdf: &Path) -> Result<()> {
    utils::print_info(&format!("Uploading {}...", pdf.display()));
    session.upload_pdf(pdf).await?;
    utils::print_success(&format!(
        "Stored {} messages in '{}'",
        session.message_count(),
        session.store().table()
    ));
    Ok(())
}

async fn handle_summarize(session: &mut Session, file: &Path) -> Result<()> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("failed to read {}", file.display()))?;

    let progress = TerminalProgress::new("Operation in progress. Please wait.");
    let report = session.summarize_text(&text, &progress).await?;

    utils::print_header("Summary");
    for message in session.conversation().messages() {
        utils::print_message(message);
    }
    utils::print_success(&format!(
        "{} chunk(s) of up to {} characters",
        report.chunks, report.chars_per_request
    ));
    Ok(())
}

async fn handle_ask(session: &Session, question: &str, steps: bool) -> Result<()> {
    let result = session.ask(question).await?;
    print_answer(&result, steps);
    Ok(())
}

async fn handle_chat(session: &mut Session, question: &str) -> Result<()> {
    let restored = session.restore()?;
    tracing::debug!("Restored {} messages as context", restored);

    let answer = session.chat(question).await?;
    println!("\n{}", answer);
    Ok(())
}

fn handle_clear(session: &mut Session) -> Result<()> {
    session.clear()?;
    utils::print_success("All stored messages deleted");
    Ok(())
}

async fn handle_interactive(session: &mut Session, pdf: Option<PathBuf>) -> Result<()> {
    utils::print_header("PDF Summarizer");
    utils::print_info("Type a question to query the conversation, /help for commands\n");

    if let Some(pdf) = pdf {
        handle_upload(session, &pdf).await?;
    }

    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin);

    loop {
        utils::print_prompt("You: ");
        let mut input = String::new();
        if reader.read_line(&mut input).await? == 0 {
            break;
        }

        let input = input.trim();
        if input.is_empty() {
            continue;
        }

        let outcome = match input.split_once(' ').unwrap_or((input, "")) {
            ("/help", _) => {
                println!("Special commands:");
                println!("  /upload <pdf>  - Upload a PDF (once per session)");
                println!("  /chat <text>   - Ask the model directly");
                println!("  /clear         - Clear conversation and stored messages");
                println!("  /count         - Show message count");
                println!("  /quit          - Exit\n");
                Ok(())
            }
            ("/quit", _) => break,
            ("/count", _) => {
                utils::print_info(&format!("Messages in session: {}\n", session.message_count()));
                Ok(())
            }
            ("/clear", _) => handle_clear(session),
            ("/upload", path) => {
                if session.is_uploaded() {
                    utils::print_info("A document is already loaded, /clear first\n");
                    Ok(())
                } else {
                    handle_upload(session, Path::new(path.trim())).await
                }
            }
            ("/chat", question) => session
                .chat(question.trim())
                .await
                .map(|answer| println!("{}\n", answer)),
            _ => session.ask(input).await.map(|result| print_answer(&result, false)),
        };

        if let Err(e) = outcome {
            utils::print_error(&format!("Error: {:#}", e));
        }
    }

    Ok(())
}

fn print_answer(result: &SqlChainResult, steps: bool) {
    if steps {
        utils::print_info(&format!("SQLQuery: {}", result.sql_query));
        utils::print_info(&format!("SQLResult: {}", result.sql_result));
    }
    println!("\n{}\n", result.result);
}
