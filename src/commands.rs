// Command handlers behind the CLI. Each returns the text to print.

use crate::api::TodoApi;
use crate::auth::SessionStore;
use crate::board::{relative_time, BoardEntry, ChatThread, TaskBoard};
use crate::models::{Session, Task, TaskCreate, TaskUpdate};
use anyhow::{Context, Result};
use chrono::Utc;
use std::fmt::Write as _;

// --- Session ---

pub async fn sign_up(
    session: &SessionStore,
    email: &str,
    password: &str,
    name: Option<&str>,
) -> Result<String> {
    log::info!("Signing up {}", email);
    let created = session.sign_up(email, password, name).await?;
    Ok(format!("Signed up as {} ({})", created.user.email, created.user.id))
}

pub async fn sign_in(session: &SessionStore, email: &str, password: &str) -> Result<String> {
    log::info!("Signing in {}", email);
    let current = session.sign_in(email, password).await?;
    Ok(format!("Signed in as {}", display_user(&current)))
}

pub async fn sign_out(session: &SessionStore) -> Result<String> {
    session.sign_out().await;
    Ok("Signed out.".to_string())
}

pub async fn whoami(session: &SessionStore) -> Result<String> {
    Ok(match session.restore_session().await {
        Some(current) => format!("Signed in as {}", display_user(&current)),
        None => "Not signed in.".to_string(),
    })
}

/// Restores the session or fails with a hint to sign in.
pub async fn require_session(session: &SessionStore) -> Result<Session> {
    session
        .restore_session()
        .await
        .context("Not signed in. Run `taskchat signin` first.")
}

fn display_user(session: &Session) -> String {
    match session.user.name.as_deref() {
        Some(name) if !name.is_empty() => format!("{} <{}>", name, session.user.email),
        _ => session.user.email.clone(),
    }
}

// --- Tasks ---

pub async fn list_tasks(api: &dyn TodoApi) -> Result<String> {
    log::info!("Listing tasks");
    let tasks = api.list_tasks().await.context("Failed to load tasks")?;
    let mut board = TaskBoard::new();
    board.replace_all(tasks);
    Ok(render_board(&board))
}

pub async fn add_task(api: &dyn TodoApi, title: &str, description: Option<&str>) -> Result<String> {
    let draft = TaskCreate::from_input(title, description)?;
    let mut board = TaskBoard::new();
    let placeholder = board.insert_pending(draft.clone());

    match api.create_task(&draft).await {
        Ok(task) => {
            log::info!("Created task {}", task.id);
            board.confirm(placeholder, task);
            Ok(render_board(&board))
        }
        Err(e) => {
            board.discard(placeholder);
            log::error!("Failed to create task: {:?}", e);
            Err(e).context("Failed to create task")
        }
    }
}

pub async fn show_task(api: &dyn TodoApi, id: &str) -> Result<String> {
    let task = api
        .get_task(id)
        .await
        .with_context(|| format!("Failed to load task {}", id))?;
    Ok(render_task(&task))
}

pub async fn edit_task(
    api: &dyn TodoApi,
    id: &str,
    title: Option<&str>,
    description: Option<&str>,
) -> Result<String> {
    let update = TaskUpdate::from_input(title, description)?;
    if update.is_empty() {
        anyhow::bail!("Nothing to update: pass --title and/or --description");
    }
    let task = api
        .update_task(id, &update)
        .await
        .with_context(|| format!("Failed to update task {}", id))?;
    Ok(render_task(&task))
}

pub async fn remove_task(api: &dyn TodoApi, id: &str) -> Result<String> {
    log::warn!("Deleting task {}", id);
    api.delete_task(id)
        .await
        .with_context(|| format!("Failed to delete task {}", id))?;
    Ok(format!("Deleted task {}", id))
}

pub async fn toggle_task(api: &dyn TodoApi, id: &str) -> Result<String> {
    let task = api
        .toggle_task_complete(id)
        .await
        .with_context(|| format!("Failed to toggle task {}", id))?;
    let state = if task.completed { "complete" } else { "not complete" };
    Ok(format!("Task {} is now {}: {}", task.id, state, task.title))
}

fn render_task(task: &Task) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{} {}", checkbox(task.completed), task.title);
    let _ = writeln!(out, "  id:      {}", task.id);
    if let Some(description) = &task.description {
        let _ = writeln!(out, "  notes:   {}", description);
    }
    let _ = writeln!(out, "  created: {}", task.created_at.format("%Y-%m-%d %H:%M"));
    let _ = write!(out, "  updated: {}", task.updated_at.format("%Y-%m-%d %H:%M"));
    out
}

fn render_board(board: &TaskBoard) -> String {
    let stats = board.stats();
    let mut out = format!(
        "{} tasks, {} done, {} pending ({}% complete)",
        stats.total, stats.completed, stats.pending, stats.completion_rate
    );
    if board.entries().is_empty() {
        out.push_str("\nNo tasks yet.");
    }
    for entry in board.entries() {
        let _ = write!(
            out,
            "\n{} {}  [{}]",
            checkbox(entry.completed()),
            entry.title(),
            entry.id()
        );
        if let BoardEntry::Confirmed(task) = entry {
            if let Some(description) = &task.description {
                let _ = write!(out, "\n    {}", description);
            }
        }
    }
    out
}

fn checkbox(done: bool) -> &'static str {
    if done {
        "[x]"
    } else {
        "[ ]"
    }
}

// --- Chat ---

pub async fn chat(
    api: &dyn TodoApi,
    user_id: &str,
    message: &str,
    conversation_id: Option<&str>,
) -> Result<String> {
    let mut thread = match conversation_id {
        Some(id) => ChatThread::for_conversation(id),
        None => ChatThread::new(),
    };
    let placeholder = thread
        .push_pending(message)
        .context("Message cannot be empty")?;
    let content = thread.pending_content(placeholder).unwrap_or_default().to_string();

    let conversation = thread.conversation_id().map(str::to_string);
    log::info!("Sending chat message (conversation: {:?})", conversation);
    let response = match api.send_message(user_id, &content, conversation.as_deref()).await {
        Ok(response) => response,
        Err(e) => {
            thread.fail(placeholder);
            return Err(e).context("Failed to send message");
        }
    };
    thread.record_reply(placeholder, &response);

    let mut out = response.response.clone();
    for call in &response.tool_calls {
        match &call.result {
            Some(result) => {
                let _ = write!(out, "\n  - {}: {}", call.name, result);
            }
            None => {
                let _ = write!(out, "\n  - {}", call.name);
            }
        }
    }
    let _ = write!(
        out,
        "\n(conversation {})",
        thread.conversation_id().unwrap_or(&response.conversation_id)
    );
    Ok(out)
}

pub async fn list_conversations(api: &dyn TodoApi, user_id: &str) -> Result<String> {
    let conversations = api
        .list_conversations(user_id)
        .await
        .context("Failed to load conversations")?;
    if conversations.is_empty() {
        return Ok("No conversations yet.".to_string());
    }
    let now = Utc::now();
    let lines: Vec<String> = conversations
        .iter()
        .map(|c| format!("{}  {}", c.id, relative_time(c.updated_at, now)))
        .collect();
    Ok(lines.join("\n"))
}

pub async fn show_conversation(
    api: &dyn TodoApi,
    user_id: &str,
    conversation_id: &str,
) -> Result<String> {
    let detail = api
        .get_conversation(user_id, conversation_id)
        .await
        .context("Failed to load conversation")?;
    let mut thread = ChatThread::new();
    thread.reconcile(detail);

    if thread.entries().is_empty() {
        return Ok("No messages in this conversation.".to_string());
    }
    let lines: Vec<String> = thread
        .entries()
        .iter()
        .map(|e| format!("{:>9}: {}", e.role.as_str(), e.content))
        .collect();
    Ok(lines.join("\n"))
}

pub async fn chatkit_session(api: &dyn TodoApi) -> Result<String> {
    let session = api
        .create_chatkit_session()
        .await
        .context("Failed to create ChatKit session")?;
    Ok(session.client_secret)
}
