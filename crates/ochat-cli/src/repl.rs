use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ochat_core::factories::Stores;
use ochat_core::models::{Attachment, CancelHandle, NoticeLevel, Role, SessionEvent};
use ochat_core::{ChatSession, ChatSettings, SessionError};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

const HELP: &str = "\
Commands:
  /connect        connect to Ollama (direct mode)
  /new            start a new chat
  /open ID        switch to a stored conversation
  /list           list stored conversations
  /model NAME     switch model
  /image PATH     attach an image to the next message
  /help           show this help
  /quit           exit
Ctrl-C stops a reply that is still streaming, or exits when idle.";

const PREVIEW_CHARS: usize = 60;

#[derive(Debug, PartialEq, Eq)]
enum Interrupt {
    StoppedReply,
    Quit,
}

/// Ctrl-C stops the streaming reply, or quits when nothing is streaming.
fn interrupt(cancel: &CancelHandle) -> Interrupt {
    if cancel.cancel() {
        Interrupt::StoppedReply
    } else {
        Interrupt::Quit
    }
}

/// First line of `content`, shortened for listings.
pub fn preview(content: &str) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    let mut preview: String = first_line.chars().take(PREVIEW_CHARS).collect();
    if first_line.chars().count() > PREVIEW_CHARS {
        preview.push_str("...");
    }
    preview
}

pub async fn run(
    stores: Stores,
    settings: ChatSettings,
    username: String,
    conversation: Option<String>,
) -> Result<()> {
    let mut session = ChatSession::new(stores.conversations.clone(), settings);
    let printer = tokio::spawn(print_events(session.subscribe()));

    if let Some(id) = conversation {
        session.open(&id).await?;
        for message in session.messages() {
            println!("{}> {}", message.role.as_str(), message.content);
        }
    }

    // Runs on its own task: the loop below is parked inside `submit` while
    // a reply streams
    let quit = Arc::new(Notify::new());
    let cancel = session.cancel_handle();
    let quit_signal = quit.clone();
    tokio::spawn(async move {
        while tokio::signal::ctrl_c().await.is_ok() {
            if interrupt(&cancel) == Interrupt::Quit {
                quit_signal.notify_one();
                break;
            }
        }
    });

    println!(
        "Hi {}. Chatting with {} ({} mode). Type /help for commands.",
        username,
        session.selected_model(),
        session.settings().backend_mode
    );

    let mut changes = session.storage_changes();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut pending_images: Vec<String> = Vec::new();

    loop {
        tokio::select! {
            _ = quit.notified() => {
                println!();
                break;
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let line = line.trim();
                if line.is_empty() {
                    continue;
                }

                if let Some(command) = line.strip_prefix('/') {
                    if !handle_command(&mut session, &stores, command, &mut pending_images).await? {
                        break;
                    }
                    continue;
                }

                match session.submit(line).await {
                    Ok(_) => pending_images.clear(),
                    // The session already raised a notice for this one
                    Err(SessionError::NotConnected) => {}
                    Err(e) => eprintln!("error: {}", e),
                }
            }
            changed = changes.recv() => match changed {
                Ok(_) | Err(RecvError::Lagged(_)) => {
                    if session.refresh_from_store().await {
                        println!("(conversation updated elsewhere)");
                    }
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    drop(session);
    let _ = printer.await;
    Ok(())
}

/// Returns false when the user asked to quit.
async fn handle_command(
    session: &mut ChatSession,
    stores: &Stores,
    command: &str,
    pending_images: &mut Vec<String>,
) -> Result<bool> {
    let (name, arg) = match command.split_once(' ') {
        Some((name, arg)) => (name, arg.trim()),
        None => (command, ""),
    };

    match name {
        "quit" | "exit" => return Ok(false),
        "help" => println!("{}", HELP),
        "connect" => {
            // Failure is reported through the notice
            let _ = session.connect();
        }
        "new" => {
            session.new_chat()?;
            pending_images.clear();
            println!("New chat {}", session.conversation_id());
        }
        "open" if !arg.is_empty() => {
            session.open(arg).await?;
            for message in session.messages() {
                println!("{}> {}", message.role.as_str(), message.content);
            }
        }
        "list" => {
            for id in stores.conversations.list_ids().await? {
                let marker = if id == session.conversation_id() { "*" } else { " " };
                println!("{} {}", marker, id);
            }
        }
        "model" if !arg.is_empty() => {
            session.select_model(arg);
            println!("Model set to {}", arg);
        }
        "image" if !arg.is_empty() => {
            let attachment = load_image(Path::new(arg)).await?;
            pending_images.push(attachment.url);
            session.set_pending_images(pending_images.clone());
            println!("{} image(s) attached to the next message", pending_images.len());
        }
        _ => println!("Unknown command. Type /help for commands."),
    }

    Ok(true)
}

async fn load_image(path: &Path) -> Result<Attachment> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read image {}", path.display()))?;

    let mime = match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    };

    debug!(path = %path.display(), bytes = bytes.len(), mime, "Loaded image");
    Ok(Attachment::from_image_bytes(&bytes, mime))
}

/// Turn session events into terminal output. Streaming replies are printed
/// incrementally from the republished message list.
async fn print_events(mut events: broadcast::Receiver<SessionEvent>) {
    let mut streaming = false;
    let mut printed = 0usize;

    loop {
        let event = match events.recv().await {
            Ok(event) => event,
            Err(RecvError::Lagged(skipped)) => {
                debug!(skipped, "Printer lagged behind session events");
                continue;
            }
            Err(RecvError::Closed) => break,
        };

        match event {
            SessionEvent::GenerationStarted { .. } => {
                streaming = true;
                printed = 0;
                print!("assistant> ");
            }
            SessionEvent::MessagesChanged { messages, .. } if streaming => {
                if let Some(last) = messages.last().filter(|m| m.role == Role::Assistant)
                    && let Some(delta) = last.content.get(printed..)
                {
                    print!("{}", delta);
                    printed = last.content.len();
                }
            }
            SessionEvent::GenerationCommitted { .. } | SessionEvent::GenerationFailed { .. } => {
                if streaming {
                    println!();
                }
                streaming = false;
            }
            SessionEvent::Notice(notice) => match notice.level() {
                NoticeLevel::Success => println!("{}", notice),
                NoticeLevel::Warning => eprintln!("warning: {}", notice),
                NoticeLevel::Error => eprintln!("error: {}", notice),
            },
            _ => {}
        }

        let _ = std::io::stdout().flush();
    }
}
