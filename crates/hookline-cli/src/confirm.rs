//! Line-based consumer of the confirmation queue

use std::io::Write;
use std::sync::Arc;

use hookline_core::permissions::ConfirmationQueue;
use tracing::info;

use crate::input::Lines;

const DENIED_BY_USER: &str = "User denied this tool call";

/// Present confirmations one at a time until stdin closes
pub async fn run(queue: Arc<ConfirmationQueue>, lines: Lines) {
    loop {
        let mut pending = queue.next_request().await;

        let request = pending.request();
        println!();
        println!("── {} wants to run ──", request.tool_name);
        match &request.preview {
            Some(preview) => println!("{}", preview),
            None => println!("{}", request.arguments),
        }
        print!("Allow? [y/N, or type a reason to deny] ");
        let _ = std::io::stdout().flush();

        let answer = {
            let mut rx = lines.lock().await;
            tokio::select! {
                _ = pending.withdrawn() => {
                    println!("(cancelled)");
                    continue;
                }
                line = rx.recv() => line,
            }
        };

        let Some(answer) = answer else {
            info!("stdin closed, cancelling confirmation");
            pending.cancel();
            return;
        };
        match answer.trim() {
            "y" | "Y" | "yes" => pending.allow(),
            "" | "n" | "N" | "no" => pending.deny(DENIED_BY_USER),
            reason => pending.deny(reason),
        }
    }
}
