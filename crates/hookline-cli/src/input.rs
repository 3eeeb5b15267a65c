//! Shared stdin line source
//!
//! Prompts and confirmation answers both come from stdin. One task reads
//! lines; whoever needs the next line locks the receiver.

use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, Mutex};
use tracing::warn;

pub type Lines = Arc<Mutex<mpsc::UnboundedReceiver<String>>>;

/// Start reading stdin; the channel closes at EOF
pub fn spawn_stdin_lines() -> Lines {
    let (tx, rx) = mpsc::unbounded_channel();
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            match lines.next_line().await {
                Ok(Some(line)) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                }
                Ok(None) => break,
                Err(e) => {
                    warn!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });
    Arc::new(Mutex::new(rx))
}
