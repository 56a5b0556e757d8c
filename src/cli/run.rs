//! Run command handler (single message + interactive mode).

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::debug;

use agentharness::agent::{Agent, RunOutcome};
use agentharness::config::Config;

use super::common::{create_agent, start_events};

/// Run the agent once on `message`, or read instructions from stdin.
pub(crate) async fn cmd_run(message: Option<String>, json: bool, max_turns: Option<u32>) -> Result<()> {
    let mut config = Config::load().with_context(|| "Failed to load configuration")?;
    if let Some(max_turns) = max_turns {
        config.agent.max_turns = max_turns;
    }

    let events = start_events(&config).await?;
    let mut agent = create_agent(&config, &events.queue)?;
    let session_id = agent.session_id().to_string();

    // Ctrl-C cancels the current run instead of killing the process
    let cancel = agent.cancel_handle();
    let interrupt = tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = match message {
        Some(msg) => agent
            .run(msg.as_str(), false)
            .await
            .map(|outcome| print_outcome(&outcome, &session_id, json))
            .map_err(anyhow::Error::from),
        None => interactive(&mut agent, json).await,
    };

    interrupt.abort();
    drop(agent);
    drop(events.queue);
    let stats = events
        .consumer
        .await
        .with_context(|| "Event consumer task failed")?;
    debug!(?stats, "Event pipeline drained");
    if stats.transport_detached {
        eprintln!("Warning: live event transport failed; events were only persisted");
    }

    result
}

async fn interactive(agent: &mut Agent, json: bool) -> Result<()> {
    println!("{}", interactive_banner(agent.session_id()));

    let stdin = io::stdin();
    let mut stdout = io::stdout();

    loop {
        print!("> ");
        stdout.flush()?;

        let mut input = String::new();
        match stdin.lock().read_line(&mut input) {
            Ok(0) => {
                println!();
                break;
            }
            Ok(_) => {
                let input = input.trim();
                if input.is_empty() && !agent.can_resume() {
                    continue;
                }
                if input == "quit" || input == "exit" {
                    println!("Goodbye!");
                    break;
                }

                let resume = agent.can_resume();
                match agent.run(input, resume).await {
                    Ok(outcome) => {
                        println!();
                        print_outcome(&outcome, agent.session_id(), json);
                        println!();
                    }
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        eprintln!();
                    }
                }
            }
            Err(e) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
        }
    }
    Ok(())
}

fn interactive_banner(session_id: &str) -> String {
    format!(
        "agentharness interactive session {}\n\
         Each line starts a fresh run; the agent does not remember earlier prompts.\n\
         Ctrl-C interrupts the current run; the next line resumes it with that line added.\n\
         Type 'quit' or 'exit' (or send EOF) to stop.\n",
        session_id
    )
}

fn print_outcome(outcome: &RunOutcome, session_id: &str, json: bool) {
    if json {
        let status = match outcome {
            RunOutcome::Completed(_) => "completed",
            RunOutcome::Interrupted(_) => "interrupted",
            RunOutcome::BudgetExhausted(_) => "budget_exhausted",
        };
        let value = json!({
            "session_id": session_id,
            "status": status,
            "output": outcome.text(),
        });
        println!("{}", value);
        return;
    }
    match outcome {
        RunOutcome::Completed(text) => println!("{}", text),
        RunOutcome::Interrupted(reason) => println!("[interrupted] {}", reason),
        RunOutcome::BudgetExhausted(payload) => println!("[turn budget exhausted] {}", payload),
    }
}
