//! Interactive streaming chat against an OpenAI-compatible server.
//!
//! # Usage
//!
//! ```bash
//! # Talk to a local server with default settings
//! chatline
//!
//! # Pick a model and endpoint
//! chatline --model llama3.1 --endpoint http://gpu-box:8080/v1/
//!
//! # Disable colors (useful for piping output)
//! chatline --no-color
//! ```
//!
//! # Commands
//!
//! While chatting, you can use slash commands:
//! - `/help` - Show available commands
//! - `/model <name>` - Change the model
//! - `/turns` - Show every stored turn
//! - `/stats` - Show session statistics
//! - `/quit` - Exit the application
//!
//! Ctrl+C while a reply streams stops it; the text received so far is kept.
//! Set `RUST_LOG=chatline=debug` to trace requests on stderr.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arrrg::CommandLine;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use time::format_description::well_known::Rfc3339;
use tracing_subscriber::EnvFilter;

use chatline::Error;
use chatline::chat::{
    ChatArgs, ChatCommand, ChatConfig, ChatSession, ChatView, TerminalView, help_text,
    parse_command,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let (args, _) = ChatArgs::from_command_line_relaxed("chatline [OPTIONS]");
    let config = ChatConfig::try_from(args)?;
    let use_color = config.use_color;

    let mut session = ChatSession::new(config)?;
    let mut view = TerminalView::with_color(use_color).echo_user(false);
    let mut rl = DefaultEditor::new()?;

    let interrupted = Arc::new(AtomicBool::new(false));
    let interrupted_clone = interrupted.clone();
    ctrlc::set_handler(move || {
        interrupted_clone.store(true, Ordering::Relaxed);
    })?;

    println!(
        "chatline (model: {}, endpoint: {})",
        session.model(),
        session.state().endpoint
    );
    println!("Type /help for commands, /quit to exit\n");

    loop {
        interrupted.store(false, Ordering::Relaxed);

        match rl.readline("You: ") {
            Ok(line) => {
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(line);

                if let Some(cmd) = parse_command(line) {
                    match cmd {
                        ChatCommand::Quit => {
                            println!("Goodbye!");
                            break;
                        }
                        ChatCommand::Help => {
                            for line in help_text().lines() {
                                println!("    {line}");
                            }
                        }
                        ChatCommand::Model(model) => {
                            view.print_info(&format!("Model changed to: {model}"));
                            session.set_model(model);
                        }
                        ChatCommand::Temperature(value) => {
                            session.set_temperature(Some(value));
                            view.print_info(&format!("temperature set to {value:.2}"));
                        }
                        ChatCommand::ClearTemperature => {
                            session.set_temperature(None);
                            view.print_info("temperature reset to server default");
                        }
                        ChatCommand::MaxTokens(value) => {
                            session.set_max_tokens(Some(value));
                            view.print_info(&format!("max_tokens set to {value}"));
                        }
                        ChatCommand::ClearMaxTokens => {
                            session.set_max_tokens(None);
                            view.print_info("max_tokens reset to server default");
                        }
                        ChatCommand::Turns => print_turns(&session),
                        ChatCommand::Stats => print_stats(&session),
                        ChatCommand::ShowConfig => print_config(&session),
                        ChatCommand::Invalid(message) => view.print_error(&message),
                    }
                    continue;
                }

                if let Err(e) = session.submit(line, &mut view, &interrupted).await {
                    report_error(&mut view, &session, &e);
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!();
                continue;
            }
            Err(ReadlineError::Eof) => {
                println!("\nGoodbye!");
                break;
            }
            Err(err) => {
                view.print_error(&format!("Input error: {err}"));
                break;
            }
        }
    }

    Ok(())
}

fn report_error(view: &mut impl ChatView, session: &ChatSession, err: &Error) {
    view.print_error(&err.to_string());
    if err.is_connection() {
        view.print_info(&format!(
            "Is a server listening at {}?",
            session.state().endpoint
        ));
    } else if err.is_model_not_found() {
        view.print_info("Use /model <name> to pick a model the server has.");
    } else if err.is_stream_error() {
        view.print_info("The reply was cut short; the text received so far is kept.");
    }
}

fn print_turns(session: &ChatSession) {
    let turns = session.transcript().snapshot();
    if turns.is_empty() {
        println!("    (no turns yet)");
        return;
    }
    for (index, turn) in turns.iter().enumerate() {
        let when = turn
            .timestamp
            .format(&Rfc3339)
            .unwrap_or_else(|_| turn.timestamp.unix_timestamp().to_string());
        println!(
            "    {index:>4} {when} {:<9} {:?}",
            turn.author.as_str(),
            turn.text
        );
    }
}

fn print_stats(session: &ChatSession) {
    let stats = session.stats();
    println!("    Session Statistics:");
    println!("      Model: {}", stats.model);
    println!("      Turns: {} ({} blocks)", stats.turn_count, stats.block_count);
    println!("      Turns sent per request: {}", stats.window_len);
    println!(
        "      Replies: {} ({} fragments received)",
        stats.cycles, stats.fragments_received
    );
}

fn print_config(session: &ChatSession) {
    let stats = session.stats();
    println!("    Current Configuration:");
    println!("      Endpoint: {}", stats.endpoint);
    println!("      Model: {}", stats.model);
    println!("      Temperature: {}", describe(stats.temperature));
    println!("      Max tokens: {}", describe(stats.max_tokens));
}

fn describe<T: std::fmt::Display>(value: Option<T>) -> String {
    value
        .map(|v| v.to_string())
        .unwrap_or_else(|| "default".to_string())
}
