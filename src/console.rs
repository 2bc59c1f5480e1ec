use log::{ error, info, warn };
use std::error::Error;
use std::io::Write;
use std::str::FromStr;
use std::sync::Arc;
use tokio::io::{ AsyncBufReadExt, BufReader };
use tokio_util::sync::CancellationToken;

use crate::agent::{ ChatAgent, TurnOutcome };
use crate::error::SparkError;
use crate::llm::StreamEvent;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConsoleCommand {
    Prompt(String),
    Regenerate,
    History,
    Quit,
    Empty,
}

impl FromStr for ConsoleCommand {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(ConsoleCommand::Empty);
        }
        if !line.starts_with('/') {
            return Ok(ConsoleCommand::Prompt(line.to_string()));
        }
        match line.to_lowercase().as_str() {
            "/regen" | "/regenerate" => Ok(ConsoleCommand::Regenerate),
            "/history" => Ok(ConsoleCommand::History),
            "/quit" | "/exit" => Ok(ConsoleCommand::Quit),
            _ => Err(format!("Unknown command: '{}'", line)),
        }
    }
}

fn print_event(event: &StreamEvent) {
    let mut stdout = std::io::stdout();
    match event {
        StreamEvent::Delta(text) => {
            let _ = write!(stdout, "{}", text);
        }
        StreamEvent::Restart { attempt } => {
            let _ = write!(stdout, "\n[connection lost, retrying (attempt {})]\n", attempt);
        }
        StreamEvent::Completed => {}
    }
    let _ = stdout.flush();
}

fn print_outcome(outcome: &TurnOutcome) {
    match outcome {
        TurnOutcome::Completed(_) => println!(),
        TurnOutcome::Failed { message } => println!("\n{}", message),
        TurnOutcome::Cancelled { .. } => println!("\n[cancelled]"),
    }
}

/// Cancels `cancel` on Ctrl-C until `done` fires.
fn cancel_on_ctrl_c(cancel: CancellationToken, done: CancellationToken) {
    tokio::spawn(async move {
        tokio::select! {
            _ = done.cancelled() => {}
            res = tokio::signal::ctrl_c() => {
                if res.is_ok() {
                    cancel.cancel();
                }
            }
        }
    });
}

pub async fn run_console(agent: Arc<ChatAgent>) -> Result<(), Box<dyn Error + Send + Sync>> {
    println!("Type a message and press Enter. Commands: /regen, /history, /quit");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => {
                info!("Input closed, leaving console");
                break;
            }
        };

        let command = match line.parse::<ConsoleCommand>() {
            Ok(command) => command,
            Err(e) => {
                println!("{}", e);
                continue;
            }
        };

        let cancel = CancellationToken::new();
        let done = CancellationToken::new();
        let result = match command {
            ConsoleCommand::Empty => {
                continue;
            }
            ConsoleCommand::Quit => {
                break;
            }
            ConsoleCommand::History => {
                for (i, exchange) in agent.exchanges().await.iter().enumerate() {
                    println!("#{} you: {}", i + 1, exchange.user_question);
                    println!("   ai:  {}", exchange.ai_answer.as_deref().unwrap_or("(no reply)"));
                }
                continue;
            }
            ConsoleCommand::Prompt(prompt) => {
                cancel_on_ctrl_c(cancel.clone(), done.clone());
                agent.send(&prompt, cancel, print_event).await
            }
            ConsoleCommand::Regenerate => {
                cancel_on_ctrl_c(cancel.clone(), done.clone());
                agent.regenerate(cancel, print_event).await
            }
        };
        done.cancel();

        match result {
            Ok(outcome) => print_outcome(&outcome),
            Err(e @ SparkError::InvalidPrompt(_)) | Err(e @ SparkError::NothingToRegenerate) => {
                warn!("Rejected: {}", e);
                println!("{}", e);
            }
            Err(e) => {
                error!("Generation call rejected: {}", e);
                println!("{}", e.inline_message());
            }
        }
    }

    Ok(())
}
