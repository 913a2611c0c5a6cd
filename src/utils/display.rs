use crate::core::conversation::{Message, Role};
use crate::services::ProgressSink;
use colored::*;
use std::io::Write;

pub fn print_header(text: &str) {
    println!("\n{}", text.bright_cyan().bold());
    println!("{}", "=".repeat(text.chars().count()).bright_cyan());
}

pub fn print_success(text: &str) {
    println!("{}", text.green());
}

pub fn print_error(text: &str) {
    eprintln!("{}", text.red().bold());
}

pub fn print_info(text: &str) {
    println!("{}", text.blue());
}

pub fn print_prompt(text: &str) {
    print!("{}", text.yellow().bold());
    let _ = std::io::stdout().flush();
}

pub fn print_message(message: &Message) {
    let label = match message.role() {
        Role::User => "user".yellow().bold(),
        Role::Assistant => "assistant".green().bold(),
    };
    println!("{}: {}\n", label, message.content());
}

/// Single-line progress indicator for the summarizer.
pub struct TerminalProgress {
    label: String,
}

impl TerminalProgress {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
        }
    }
}

impl ProgressSink for TerminalProgress {
    fn report(&self, index: usize, total: usize) {
        let done = index + 1;
        print!("\r{} [{}/{}]", self.label.blue(), done, total);
        if done == total {
            println!();
        }
        let _ = std::io::stdout().flush();
    }
}
