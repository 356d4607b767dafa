use log::{ info, warn };
use std::error::Error;
use std::io::{ self, Write };
use std::sync::atomic::{ AtomicUsize, Ordering };
use std::sync::Arc;
use tokio::io::{ AsyncBufRead, AsyncBufReadExt, BufReader };
use tokio::task::JoinHandle;

use crate::conversation::{ ConversationController, ConversationObserver, SendOutcome };
use crate::models::chat::{ Message, Role };

/// Prints assistant replies as they are appended to the log. The user's own
/// lines are already on screen.
pub struct TerminalObserver {
    printed: AtomicUsize,
}

impl TerminalObserver {
    pub fn new(already_printed: usize) -> Self {
        Self { printed: AtomicUsize::new(already_printed) }
    }
}

pub fn format_message(msg: &Message) -> String {
    let label = match msg.role {
        Role::User => "You",
        Role::Assistant => "Assistant",
    };
    format!("{}: {}", label, msg.content)
}

impl ConversationObserver for TerminalObserver {
    fn on_messages_changed(&self, messages: &[Message]) {
        let already = self.printed.swap(messages.len(), Ordering::SeqCst);
        if messages.len() < already {
            println!("-- conversation cleared --");
            for msg in messages {
                println!("{}", format_message(msg));
            }
            return;
        }
        for msg in &messages[already..] {
            if msg.role == Role::Assistant {
                println!("{}", format_message(msg));
            }
        }
    }

    fn on_sending_changed(&self, sending: bool) {
        if sending {
            println!("Assistant is typing…");
        }
    }

    fn on_scroll_to_latest(&self) {
        let _ = io::stdout().flush();
    }
}

/// Line-oriented front-end: `/clear` wipes the log, `/quit` exits, any other
/// line is sent as a message.
pub async fn run(controller: Arc<ConversationController>) -> Result<(), Box<dyn Error + Send + Sync>> {
    let history = controller.messages();
    for msg in &history {
        println!("{}", format_message(msg));
    }
    controller.subscribe(Arc::new(TerminalObserver::new(history.len())));
    println!("Type a message, /clear to wipe history, /quit to exit.");

    run_lines(Arc::clone(&controller), BufReader::new(tokio::io::stdin())).await?;

    info!("Leaving chat; {} messages kept", controller.messages().len());
    Ok(())
}

/// Drives the controller from `reader` until `/quit` or end of input. Sends
/// run in the background so `/clear` stays responsive; at end of input they
/// are awaited, `/quit` abandons them.
pub async fn run_lines<R>(controller: Arc<ConversationController>, reader: R) -> io::Result<()>
    where R: AsyncBufRead + Unpin
{
    let mut pending: Vec<JoinHandle<()>> = Vec::new();
    let mut lines = reader.lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            "/quit" => {
                return Ok(());
            }
            "/clear" => controller.clear().await,
            _ => {
                pending.retain(|handle| !handle.is_finished());
                let c = Arc::clone(&controller);
                let draft = line.clone();
                pending.push(
                    tokio::spawn(async move {
                        c.update_draft(draft);
                        if c.send().await == SendOutcome::Busy {
                            println!("Still waiting for the previous reply.");
                        }
                    })
                );
            }
        }
    }

    for handle in pending {
        if let Err(e) = handle.await {
            warn!("Send task failed: {}", e);
        }
    }
    Ok(())
}
