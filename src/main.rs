use anyhow::Result;
use colored::Colorize;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use filechat::config::Config;
use filechat::models::{ContentUnit, Role, Turn};
use filechat::orchestrator::{ChatOrchestrator, Phase, Refusal, SendOutcome};

const HELP: &str = "\
Type a message and press enter to send it with any attached files.
  /attach <path>...   attach one or more files (quote paths with spaces)
  /detach <id>        remove a pending attachment
  /files              list pending attachments
  /send               send the pending attachments without text
  /history            print the whole conversation
  /help               show this help
  /quit               exit";

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so the transcript on stdout stays readable
    tracing_subscriber::fmt()
        .with_target(false)
        .with_ansi(false)
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::load();
    if config.credential().is_none() {
        eprintln!(
            "{}",
            "GEMINI_API_KEY is not set; messages will come back as configuration errors."
                .yellow()
        );
    }

    let chat = ChatOrchestrator::from_config(&config);
    println!("{}", HELP.dimmed());

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
        match command {
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP.dimmed()),
            "/attach" => {
                let paths = split_args(rest);
                if paths.is_empty() {
                    println!("{}", "usage: /attach <path>...".yellow());
                    continue;
                }
                for attachment in chat.attach_files(paths).await {
                    println!(
                        "{} #{} {} ({})",
                        "attached".green(),
                        attachment.id,
                        attachment.name,
                        attachment.media_type
                    );
                }
            }
            "/detach" => match rest.trim().parse::<u64>() {
                Ok(id) => {
                    if chat.remove_attachment(id).await {
                        println!("{} #{}", "removed".green(), id);
                    } else {
                        println!("{}", format!("no pending attachment #{id}").yellow());
                    }
                }
                Err(_) => println!("{}", "usage: /detach <id>".yellow()),
            },
            "/files" => {
                let pending = chat.pending_attachments().await;
                if pending.is_empty() {
                    println!("{}", "no pending attachments".dimmed());
                }
                for attachment in pending {
                    println!(
                        "  #{} {} ({})",
                        attachment.id, attachment.name, attachment.media_type
                    );
                }
            }
            "/history" => {
                for turn in chat.snapshot().await {
                    render(&turn);
                }
            }
            "/send" => send(&chat).await,
            _ => {
                chat.submit_text(line).await;
                send(&chat).await;
            }
        }
    }

    tracing::info!("Input closed, exiting");
    Ok(())
}

async fn send(chat: &ChatOrchestrator) {
    if chat.phase().await == Phase::Composing {
        println!("{}", "typing…".dimmed());
    }
    match chat.send_turn().await {
        SendOutcome::Replied(turn) | SendOutcome::Failed(turn) => render(&turn),
        SendOutcome::Refused(Refusal::EmptyTurn) => {
            println!("{}", "nothing to send".yellow())
        }
        SendOutcome::Refused(Refusal::AlreadySending) => {
            println!("{}", "still waiting for the previous reply".yellow())
        }
    }
}

fn render(turn: &Turn) {
    let label = match turn.role {
        Role::User => "you".green().bold(),
        Role::Bot => "gemini".cyan().bold(),
    };
    println!("{} {}", label, turn.created_at.format("%H:%M:%S").to_string().dimmed());
    for unit in &turn.content {
        match unit {
            ContentUnit::Text { text } => println!("{text}"),
            ContentUnit::InlineData { inline_data } => println!(
                "{}",
                format!(
                    "[{} attachment, {} base64 chars]",
                    inline_data.mime_type,
                    inline_data.data.len()
                )
                .dimmed()
            ),
        }
    }
    println!();
}

/// Whitespace-separated arguments; double quotes group a path with spaces.
fn split_args(input: &str) -> Vec<String> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut quoted = false;
    let mut pending = false;
    for ch in input.chars() {
        match ch {
            '"' => {
                quoted = !quoted;
                pending = true;
            }
            c if c.is_whitespace() && !quoted => {
                if pending {
                    args.push(std::mem::take(&mut current));
                    pending = false;
                }
            }
            c => {
                current.push(c);
                pending = true;
            }
        }
    }
    if pending {
        args.push(current);
    }
    args
}
