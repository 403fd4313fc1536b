use std::io::Write;
use std::sync::Arc;

use tokio::io::AsyncBufReadExt;

use parley_channels::{Channel, LocalChannel};
use parley_config::ParleyConfig;
use parley_core::ParleyError;

/// Terminal chat. Lines go through the same bot loop the Telegram channel
/// uses, over an in-process channel.
pub(super) async fn cmd_chat(
    config: ParleyConfig,
    session: Option<String>,
) -> parley_core::Result<()> {
    let engine = super::build_engine(&config)?;
    let session = session.unwrap_or_else(|| format!("local-{}", uuid::Uuid::new_v4()));

    println!("💬 Parley Interactive Chat");
    println!("   Session: {session}");
    println!("   Type 'exit' or Ctrl+C to quit, '/clear' to start over");
    println!();

    let mut channel = LocalChannel::new("local");
    let events = channel.start().await?;
    let sender = channel.incoming_sender().ok_or_else(|| ParleyError::Channel {
        channel: "local".into(),
        reason: "channel did not start".into(),
    })?;
    let mut replies = channel.take_outgoing().ok_or_else(|| ParleyError::Channel {
        channel: "local".into(),
        reason: "reply queue already taken".into(),
    })?;
    // Typing indicators are meaningless in a terminal.
    drop(channel.take_typing());

    let channel: Arc<dyn Channel> = Arc::new(channel);
    tokio::spawn(parley_runtime::run_channel(engine, channel, events));

    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut lines = stdin.lines();

    loop {
        eprint!("\x1b[36myou>\x1b[0m ");
        std::io::stderr().flush().ok();

        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) | Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "exit" || trimmed == "quit" || trimmed == "/exit" {
            println!("👋 Goodbye!");
            break;
        }

        sender.send_text(&session, trimmed).await?;
        match replies.recv().await {
            Some(reply) => {
                eprint!("\x1b[32mparley>\x1b[0m ");
                println!("{}", reply.text);
                println!();
            }
            None => break,
        }
    }

    Ok(())
}
