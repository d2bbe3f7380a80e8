//! Client-side views over server data with optimistic entries.
//!
//! An entry created locally gets a placeholder id until the backend answers
//! with the authoritative record, which then replaces it. Placeholder ids are
//! display-only and are never sent to the backend.

use crate::models::{ChatResponse, ConversationDetail, Role, Task, TaskCreate};
use chrono::{DateTime, Utc};
use std::fmt;
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryId {
    Placeholder(Uuid),
    Server(String),
}

impl EntryId {
    pub fn is_placeholder(&self) -> bool {
        matches!(self, EntryId::Placeholder(_))
    }

    /// The backend id, if the entry has one.
    pub fn server_id(&self) -> Option<&str> {
        match self {
            EntryId::Server(id) => Some(id),
            EntryId::Placeholder(_) => None,
        }
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryId::Placeholder(id) => write!(f, "temp-{}", id),
            EntryId::Server(id) => f.write_str(id),
        }
    }
}

// --- Tasks ---

#[derive(Debug, Clone, PartialEq)]
pub enum BoardEntry {
    Pending { placeholder: Uuid, draft: TaskCreate },
    Confirmed(Task),
}

impl BoardEntry {
    pub fn id(&self) -> EntryId {
        match self {
            BoardEntry::Pending { placeholder, .. } => EntryId::Placeholder(*placeholder),
            BoardEntry::Confirmed(task) => EntryId::Server(task.id.clone()),
        }
    }

    pub fn title(&self) -> &str {
        match self {
            BoardEntry::Pending { draft, .. } => &draft.title,
            BoardEntry::Confirmed(task) => &task.title,
        }
    }

    pub fn description(&self) -> Option<&str> {
        match self {
            BoardEntry::Pending { draft, .. } => draft.description.as_deref(),
            BoardEntry::Confirmed(task) => task.description.as_deref(),
        }
    }

    pub fn completed(&self) -> bool {
        matches!(self, BoardEntry::Confirmed(task) if task.completed)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    /// Whole percent, 0 for an empty board.
    pub completion_rate: u32,
}

/// The user's tasks, newest first.
#[derive(Debug, Clone, Default)]
pub struct TaskBoard {
    entries: Vec<BoardEntry>,
}

impl TaskBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the board with a fresh listing from the backend.
    pub fn replace_all(&mut self, tasks: Vec<Task>) {
        self.entries = tasks.into_iter().map(BoardEntry::Confirmed).collect();
    }

    /// Shows a task before the backend has confirmed it.
    pub fn insert_pending(&mut self, draft: TaskCreate) -> Uuid {
        let placeholder = Uuid::new_v4();
        self.entries.insert(0, BoardEntry::Pending { placeholder, draft });
        placeholder
    }

    /// Swaps the placeholder for the server record, keeping its position.
    /// If the placeholder is gone (discarded meanwhile) the task goes on top.
    pub fn confirm(&mut self, placeholder: Uuid, task: Task) {
        // Drop any copy of the record a concurrent refresh already brought in
        self.entries
            .retain(|e| !matches!(e, BoardEntry::Confirmed(t) if t.id == task.id));
        let slot = self.entries.iter().position(
            |e| matches!(e, BoardEntry::Pending { placeholder: p, .. } if *p == placeholder),
        );
        match slot {
            Some(index) => self.entries[index] = BoardEntry::Confirmed(task),
            None => self.entries.insert(0, BoardEntry::Confirmed(task)),
        }
    }

    /// Removes a pending entry whose create call failed.
    pub fn discard(&mut self, placeholder: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(
            |e| !matches!(e, BoardEntry::Pending { placeholder: p, .. } if *p == placeholder),
        );
        self.entries.len() != before
    }

    /// Replaces the record with the same id. Unknown ids are ignored.
    pub fn apply_update(&mut self, task: Task) -> bool {
        for entry in &mut self.entries {
            if let BoardEntry::Confirmed(existing) = entry {
                if existing.id == task.id {
                    *existing = task;
                    return true;
                }
            }
        }
        false
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.entries.len();
        self.entries
            .retain(|e| !matches!(e, BoardEntry::Confirmed(t) if t.id == id));
        self.entries.len() != before
    }

    pub fn entries(&self) -> &[BoardEntry] {
        &self.entries
    }

    pub fn has_pending(&self) -> bool {
        self.entries.iter().any(|e| e.id().is_placeholder())
    }

    pub fn stats(&self) -> TaskStats {
        let total = self.entries.len();
        let completed = self.entries.iter().filter(|e| e.completed()).count();
        let completion_rate = if total > 0 {
            ((completed as f64 / total as f64) * 100.0).round() as u32
        } else {
            0
        };
        TaskStats {
            total,
            completed,
            pending: total - completed,
            completion_rate,
        }
    }
}

// --- Chat ---

#[derive(Debug, Clone, PartialEq)]
pub struct ThreadEntry {
    pub id: EntryId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// The conversation on screen. `conversation_id` is `None` until the first
/// reply of a new chat names it.
#[derive(Debug, Clone, Default)]
pub struct ChatThread {
    conversation_id: Option<String>,
    entries: Vec<ThreadEntry>,
}

impl ChatThread {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn for_conversation(conversation_id: &str) -> Self {
        Self {
            conversation_id: Some(conversation_id.to_string()),
            entries: Vec::new(),
        }
    }

    pub fn conversation_id(&self) -> Option<&str> {
        self.conversation_id.as_deref()
    }

    pub fn entries(&self) -> &[ThreadEntry] {
        &self.entries
    }

    /// Starts a new chat.
    pub fn reset(&mut self) {
        self.conversation_id = None;
        self.entries.clear();
    }

    /// Appends the user's message ahead of the reply. Blank input is
    /// ignored and yields `None`.
    pub fn push_pending(&mut self, content: &str) -> Option<Uuid> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        let placeholder = Uuid::new_v4();
        self.entries.push(ThreadEntry {
            id: EntryId::Placeholder(placeholder),
            role: Role::User,
            content: content.to_string(),
            created_at: Utc::now(),
        });
        Some(placeholder)
    }

    /// The text that was queued under `placeholder`.
    pub fn pending_content(&self, placeholder: Uuid) -> Option<&str> {
        self.entries
            .iter()
            .find(|e| e.id == EntryId::Placeholder(placeholder))
            .map(|e| e.content.as_str())
    }

    /// Records the assistant's answer. A new chat adopts the conversation id
    /// the backend assigned. Both entries keep placeholder ids until
    /// [`ChatThread::reconcile`] brings in the stored messages.
    pub fn record_reply(&mut self, placeholder: Uuid, response: &ChatResponse) {
        if self.conversation_id.is_none() {
            self.conversation_id = Some(response.conversation_id.clone());
        }
        let at = self
            .entries
            .iter()
            .position(|e| e.id == EntryId::Placeholder(placeholder))
            .map(|i| i + 1)
            .unwrap_or(self.entries.len());
        self.entries.insert(
            at,
            ThreadEntry {
                id: EntryId::Placeholder(Uuid::new_v4()),
                role: Role::Assistant,
                content: response.response.clone(),
                created_at: Utc::now(),
            },
        );
    }

    /// Drops the pending user entry after a failed send.
    pub fn fail(&mut self, placeholder: Uuid) -> bool {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != EntryId::Placeholder(placeholder));
        self.entries.len() != before
    }

    /// Replaces every entry with the stored history of the conversation.
    pub fn reconcile(&mut self, detail: ConversationDetail) {
        self.conversation_id = Some(detail.id);
        self.entries = detail
            .messages
            .into_iter()
            .map(|m| ThreadEntry {
                id: EntryId::Server(m.id),
                role: m.role,
                content: m.content,
                created_at: m.created_at,
            })
            .collect();
    }

    pub fn needs_sync(&self) -> bool {
        self.entries.iter().any(|e| e.id.is_placeholder())
    }
}

/// Short age label for list views: "Just now", "5m ago", "3h ago", "2d ago",
/// then the calendar date once a week has passed.
pub fn relative_time(then: DateTime<Utc>, now: DateTime<Utc>) -> String {
    let elapsed = now.signed_duration_since(then);
    let mins = elapsed.num_minutes();
    let hours = elapsed.num_hours();
    let days = elapsed.num_days();
    if mins < 1 {
        "Just now".to_string()
    } else if mins < 60 {
        format!("{}m ago", mins)
    } else if hours < 24 {
        format!("{}h ago", hours)
    } else if days < 7 {
        format!("{}d ago", days)
    } else {
        then.format("%Y-%m-%d").to_string()
    }
}
