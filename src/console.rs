use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::error;

use crate::app::{Aggregator, RefreshOutcome};
use crate::archive::ArchiveClient;
use crate::upstream::CatalogClient;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Update,
    Quit,
    Invalid,
}

pub fn parse_command(line: &str) -> Command {
    match line.trim().to_lowercase().as_str() {
        "u" => Command::Update,
        "q" => Command::Quit,
        _ => Command::Invalid,
    }
}

/// Operator loop on stdin. Runs as its own task so the HTTP listener never
/// waits on a prompt. Returns when the operator quits.
pub async fn run<C, A>(aggregator: Arc<Aggregator<C, A>>)
where
    C: CatalogClient + 'static,
    A: ArchiveClient + 'static,
{
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    prompt();
    while let Ok(Some(line)) = lines.next_line().await {
        match parse_command(&line) {
            Command::Update => match aggregator.refresh().await {
                Ok(RefreshOutcome::Created) => {
                    println!("dataset list created at {}", aggregator.store().path());
                }
                Ok(RefreshOutcome::UpToDate) => println!("dataset list is up to date"),
                Ok(RefreshOutcome::Updated) => {
                    println!("dataset list updated, wrote to {}", aggregator.store().path());
                }
                // Refresh failures are never fatal to the process.
                Err(err) => error!("dataset list refresh failed: {err}"),
            },
            Command::Quit => {
                println!("exiting...");
                return;
            }
            Command::Invalid => println!("invalid command"),
        }
        prompt();
    }
}

fn prompt() {
    print!("commands: 'u' update, 'q' quit\n> ");
    let _ = std::io::stdout().flush();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_known_commands() {
        assert_eq!(parse_command("u"), Command::Update);
        assert_eq!(parse_command("U"), Command::Update);
        assert_eq!(parse_command(" q "), Command::Quit);
        assert_eq!(parse_command("Q"), Command::Quit);
    }

    #[test]
    fn parse_rejects_anything_else() {
        assert_eq!(parse_command(""), Command::Invalid);
        assert_eq!(parse_command("update"), Command::Invalid);
        assert_eq!(parse_command("uq"), Command::Invalid);
    }
}
