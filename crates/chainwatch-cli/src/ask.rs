//! Interactive question mode over the RAG bridge

use crate::commands::App;
use crate::watch::stdin_lines;
use anyhow::Result;
use chainwatch_core::{Conversation, Role};
use chainwatch_poll::{BridgeError, BridgeOutcome, RagBridge, TIMEOUT_MESSAGE};
use std::io::Write;

const HELP: &str = "Type a question and press Enter. /history shows the conversation, /reset clears it, /quit leaves.";

pub fn describe(outcome: &BridgeOutcome) -> String {
    match outcome {
        BridgeOutcome::Resolved(answer) => answer.clone(),
        BridgeOutcome::Failed(error) => format!("Error: {}", error),
        BridgeOutcome::TimedOut => TIMEOUT_MESSAGE.to_string(),
        BridgeOutcome::Cancelled => "Cancelled.".to_string(),
    }
}

fn print_history(history: &Conversation) {
    if history.is_empty() {
        println!("(no messages yet)");
        return;
    }
    for message in history.messages() {
        let who = match message.role {
            Role::User => "you",
            Role::Assistant => "assistant",
        };
        println!("{:>9}: {}", who, message.content);
    }
}

fn prompt() -> Result<()> {
    print!("> ");
    std::io::stdout().flush()?;
    Ok(())
}

pub async fn run(app: &App, repo_id: String, question: Option<String>) -> Result<()> {
    let bridge = RagBridge::new(app.client.clone(), repo_id, app.config.bridge_config());

    if let Some(question) = question {
        let outcome = bridge.ask(&question).await?;
        println!("{}", describe(&outcome));
        return Ok(());
    }

    println!("Asking about repository {}. {}", bridge.repo_id(), HELP);
    let mut lines = stdin_lines();

    loop {
        prompt()?;
        let Some(line) = lines.recv().await else { break };

        match line.trim() {
            "" => continue,
            "/quit" | "/exit" => break,
            "/help" => println!("{}", HELP),
            "/history" => print_history(&bridge.history()),
            "/reset" => {
                bridge.reset()?;
                println!("Conversation cleared.");
            }
            question => {
                let pending = match bridge.submit(question).await {
                    Ok(pending) => pending,
                    Err(BridgeError::EmptyQuestion) => continue,
                    Err(e) => {
                        eprintln!("{}", e);
                        continue;
                    }
                };
                println!("Thinking... (request {})", pending.request_id());

                tokio::select! {
                    outcome = pending.wait() => println!("{}\n", describe(&outcome)),
                    _ = tokio::signal::ctrl_c() => {
                        bridge.cancel();
                        println!("Cancelled.");
                    }
                }
            }
        }
    }

    Ok(())
}
