//! `carebridge chat` — Interactive or single-message conversation.

use carebridge_config::AppConfig;
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::bootstrap;

pub async fn run(message: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;
    let assistant = bootstrap::assistant(&config).await?;
    let session = assistant.new_session();

    if let Some(msg) = message {
        // Single message mode
        let exchange = assistant.exchange(&session, &msg).await?;
        println!("{}", exchange.labelled());
        return Ok(());
    }

    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║      CareBridge — Post-Discharge Assistant    ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Provider:  {}", config.default_provider);
    println!("  Model:     {}", config.default_model);
    println!("  Session:   {session}");
    println!();
    println!("  Start by telling the receptionist your full name.");
    println!("  Type 'exit' or Ctrl+C to quit.");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if matches!(line.to_lowercase().as_str(), "exit" | "quit") {
            break;
        }

        eprint!("  ...");
        let exchange = assistant.exchange(&session, line).await?;
        eprint!("\r     \r");
        println!();
        for (i, text) in exchange.labelled().lines().enumerate() {
            if i == 0 {
                println!("  {text}");
            } else {
                println!("    {text}");
            }
        }
        println!();
    }

    println!();
    println!("  Take care!");
    println!();
    Ok(())
}
