//! care-cli: interactive prompt against one agent.
//!
//! CARE_AGENT_URL    agent base url (default http://localhost:10010/)
//! CARE_SESSION_ID   session to reuse (default: a fresh one)
//! CARE_SHOW_HISTORY print the whole task history after each reply

use care_backend::connector::AgentConnector;
use care_backend::CareResult;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

const DEFAULT_AGENT_URL: &str = "http://localhost:10010/";

#[tokio::main]
async fn main() {
    dotenv::dotenv().ok();
    env_logger::init();

    let url = std::env::var("CARE_AGENT_URL").unwrap_or_else(|_| DEFAULT_AGENT_URL.to_string());
    let session_id = std::env::var("CARE_SESSION_ID")
        .ok()
        .filter(|s| !s.is_empty() && s != "0")
        .unwrap_or_else(|| uuid::Uuid::new_v4().simple().to_string());
    let show_history = std::env::var("CARE_SHOW_HISTORY")
        .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let connector = AgentConnector::new("agent", url.clone());
    println!("Connected to {} (session {})", url, session_id);

    if let Err(e) = prompt_loop(&connector, &session_id, show_history).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn prompt_loop(
    connector: &AgentConnector,
    session_id: &str,
    show_history: bool,
) -> CareResult<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();

    loop {
        stdout
            .write_all(b"\nWhat would you like the healthcare agent to do? (type ':q' or 'quit' to exit)\n> ")
            .await
            .ok();
        stdout.flush().await.ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => break,
            Err(e) => return Err(care_backend::CareError::transport(format!("stdin: {}", e))),
        };
        let prompt = line.trim();
        if prompt.is_empty() {
            continue;
        }
        if matches!(prompt.to_lowercase().as_str(), ":q" | "quit") {
            println!("Exiting healthcare CLI...");
            break;
        }

        match connector.send_task(prompt, session_id, None).await {
            Ok(task) => {
                match task.last_message().filter(|_| task.history.len() > 1) {
                    Some(reply) => println!("\nAgent response: {}", reply.text()),
                    None => println!("\nNo meaningful response received."),
                }
                if show_history {
                    println!("\nConversation history:");
                    for message in &task.history {
                        println!("[{}] {}", message.role.as_str(), message.text());
                    }
                }
            }
            Err(e) => println!("\nError: {}", e),
        }
    }
    Ok(())
}
