use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const TITLE_MAX_LEN: usize = 200;
pub const DESCRIPTION_MAX_LEN: usize = 2000;

// The account returned by the auth endpoints
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "createdAt", with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

// The authenticated identity held for the lifetime of the process
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Session {
    pub user: User,
    #[serde(rename = "accessToken")]
    pub access_token: String,
}

// `{ user, accessToken }` as returned by signin/signup. The session probe
// answers with nulls when there is no session, hence the options.
#[derive(Deserialize, Debug)]
pub(crate) struct AuthPayload {
    #[serde(default)]
    pub user: Option<User>,
    #[serde(rename = "accessToken", default)]
    pub access_token: Option<String>,
}

impl AuthPayload {
    pub(crate) fn into_session(self) -> Option<Session> {
        match (self.user, self.access_token) {
            (Some(user), Some(access_token)) if !access_token.is_empty() => {
                Some(Session { user, access_token })
            }
            _ => None,
        }
    }
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub completed: bool,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TaskCreate {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct TaskUpdate {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Rejections raised while normalising task input before it is sent.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Title is required")]
    EmptyTitle,
    #[error("Title must be at most {} characters", TITLE_MAX_LEN)]
    TitleTooLong,
    #[error("Description must be at most {} characters", DESCRIPTION_MAX_LEN)]
    DescriptionTooLong,
}

fn normalize_title(title: &str) -> Result<String, InputError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(InputError::EmptyTitle);
    }
    if title.chars().count() > TITLE_MAX_LEN {
        return Err(InputError::TitleTooLong);
    }
    Ok(title.to_string())
}

fn normalize_description(description: Option<&str>) -> Result<Option<String>, InputError> {
    let Some(description) = description.map(str::trim).filter(|d| !d.is_empty()) else {
        return Ok(None);
    };
    if description.chars().count() > DESCRIPTION_MAX_LEN {
        return Err(InputError::DescriptionTooLong);
    }
    Ok(Some(description.to_string()))
}

impl TaskCreate {
    /// Builds a create payload from raw user input: both fields are trimmed
    /// and a blank description is dropped.
    pub fn from_input(title: &str, description: Option<&str>) -> Result<Self, InputError> {
        Ok(Self {
            title: normalize_title(title)?,
            description: normalize_description(description)?,
        })
    }
}

impl TaskUpdate {
    /// Same normalisation as [`TaskCreate::from_input`]; fields left as
    /// `None` are not touched on the server.
    pub fn from_input(title: Option<&str>, description: Option<&str>) -> Result<Self, InputError> {
        Ok(Self {
            title: title.map(normalize_title).transpose()?,
            description: normalize_description(description)?,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.description.is_none()
    }
}

// A chat thread summary as listed in the sidebar
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Conversation {
    pub id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ConversationDetail {
    pub id: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "timestamp")]
    pub updated_at: DateTime<Utc>,
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

// A single entry in a conversation; append-only on the server
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Message {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(with = "timestamp")]
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct ChatRequest {
    pub message: String,
    // Explicit null starts a new conversation
    pub conversation_id: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ToolCallInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatResponse {
    pub conversation_id: String,
    pub response: String,
    #[serde(default)]
    pub tool_calls: Vec<ToolCallInfo>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct ChatkitSession {
    pub client_secret: String,
}

/// Error body as sent by the backend. FastAPI only sets `detail`, which is a
/// string for handled errors and a list for validation failures.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct ApiErrorBody {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<serde_json::Value>,
}

impl ApiErrorBody {
    pub fn new(error: &str, detail: &str) -> Self {
        Self {
            error: Some(error.to_string()),
            detail: Some(serde_json::Value::String(detail.to_string())),
        }
    }

    /// `detail` if present, else `error`.
    pub fn describe(&self) -> Option<String> {
        let detail = match &self.detail {
            Some(serde_json::Value::String(s)) if !s.is_empty() => Some(s.clone()),
            Some(serde_json::Value::Null) | None => None,
            Some(serde_json::Value::String(_)) => None,
            Some(other) => Some(other.to_string()),
        };
        detail.or_else(|| self.error.clone().filter(|e| !e.is_empty()))
    }
}

// The backend mixes RFC 3339 strings with naive ISO timestamps (no offset).
// Both are read as UTC; output is always RFC 3339.
mod timestamp {
    use chrono::{DateTime, NaiveDateTime, Utc};
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(
        value: &DateTime<Utc>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<Utc>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse(&raw).ok_or_else(|| de::Error::custom(format!("invalid timestamp: {}", raw)))
    }

    pub fn parse(raw: &str) -> Option<DateTime<Utc>> {
        if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
            return Some(dt.with_timezone(&Utc));
        }
        NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
            .ok()
            .map(|naive| naive.and_utc())
    }
}
