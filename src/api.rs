use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::models::{
    ChatRequest, ChatResponse, ChatkitSession, Conversation, ConversationDetail, Task, TaskCreate,
    TaskUpdate,
};
use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::RwLock;
use std::time::Duration;

// Placeholder body type for requests that send none
const NO_BODY: Option<&()> = None;

// Trait defining the data operations the backend offers. `ApiClient` is the
// HTTP implementation; command handlers only see the trait.
#[async_trait]
pub trait TodoApi: Send + Sync {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError>;
    async fn create_task(&self, data: &TaskCreate) -> Result<Task, ApiError>;
    async fn get_task(&self, id: &str) -> Result<Task, ApiError>;
    async fn update_task(&self, id: &str, data: &TaskUpdate) -> Result<Task, ApiError>;
    async fn delete_task(&self, id: &str) -> Result<(), ApiError>;
    /// Flips `completed` server-side and returns the updated record.
    async fn toggle_task_complete(&self, id: &str) -> Result<Task, ApiError>;

    /// Sends one user message. `None` for `conversation_id` starts a new
    /// conversation; the response carries its id.
    async fn send_message(
        &self,
        user_id: &str,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, ApiError>;
    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, ApiError>;
    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationDetail, ApiError>;

    async fn create_chatkit_session(&self) -> Result<ChatkitSession, ApiError>;
}

/// Status and body of a response that arrived within the deadline.
#[derive(Debug)]
pub(crate) struct RawResponse {
    pub status: StatusCode,
    pub body: Vec<u8>,
}

/// HTTP client for the todo backend. Holds the bearer token attached to
/// every request; a 401 on any data operation clears it.
pub struct ApiClient {
    client: Client,
    base_url: Url,
    timeout: Duration,
    token: RwLock<Option<String>>,
}

impl ApiClient {
    pub fn new(config: &ClientConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.api_url.clone(),
            timeout: config.timeout,
            token: RwLock::new(None),
        }
    }

    pub fn set_token(&self, token: Option<String>) {
        *self.token.write().unwrap_or_else(|e| e.into_inner()) = token;
    }

    pub fn token(&self) -> Option<String> {
        self.token.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // Clears the token only if it is still the one the failed request used,
    // so a sign-in that raced the request is not undone.
    fn expire_token(&self, used: Option<&str>) {
        let mut token = self.token.write().unwrap_or_else(|e| e.into_inner());
        if token.as_deref() == used {
            *token = None;
        }
    }

    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        // ClientConfig rejects cannot-be-a-base URLs, so this always applies
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    /// Performs one request/response exchange under the client deadline.
    /// Only transport failures are errors here; any status is returned.
    pub(crate) async fn execute<B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
        bearer: Option<&str>,
    ) -> Result<RawResponse, ApiError>
    where
        B: Serialize + ?Sized + Sync,
    {
        let url = self.url(segments);
        log::info!("Sending {} request to {}", method, url.path());

        let mut request = self
            .client
            .request(method, url.clone())
            .header(CONTENT_TYPE, "application/json");
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let exchange = async {
            let response = request.send().await?;
            let status = response.status();
            let body = response.bytes().await?;
            Ok::<_, reqwest::Error>(RawResponse {
                status,
                body: body.to_vec(),
            })
        };

        match tokio::time::timeout(self.timeout, exchange).await {
            Ok(Ok(raw)) => Ok(raw),
            Ok(Err(e)) if e.is_timeout() => {
                log::error!("Request to {} timed out: {}", url.path(), e);
                Err(ApiError::timeout())
            }
            Ok(Err(e)) => {
                log::error!("Request to {} failed: {}", url.path(), e);
                Err(ApiError::network())
            }
            Err(_) => {
                log::error!("Request to {} timed out after {:?}", url.path(), self.timeout);
                Err(ApiError::timeout())
            }
        }
    }

    async fn fetch<T, B>(
        &self,
        method: Method,
        segments: &[&str],
        body: Option<&B>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized + Sync,
    {
        let token = self.token();
        let raw = self.execute(method.clone(), segments, body, token.as_deref()).await?;

        if !raw.status.is_success() {
            let err = ApiError::from_response(raw.status, &raw.body);
            log::warn!(
                "{} /{} failed with status {}: {}",
                method,
                segments.join("/"),
                raw.status,
                err
            );
            if err.is_unauthorized() {
                self.expire_token(token.as_deref());
            }
            return Err(err);
        }

        // 204 (or an empty 2xx) carries no payload
        let body: &[u8] = if raw.status == StatusCode::NO_CONTENT || raw.body.is_empty() {
            b"null"
        } else {
            &raw.body
        };
        serde_json::from_slice(body).map_err(|e| ApiError::decode(raw.status, e))
    }
}

#[async_trait]
impl TodoApi for ApiClient {
    async fn list_tasks(&self) -> Result<Vec<Task>, ApiError> {
        self.fetch(Method::GET, &["tasks"], NO_BODY).await
    }

    async fn create_task(&self, data: &TaskCreate) -> Result<Task, ApiError> {
        self.fetch(Method::POST, &["tasks"], Some(data)).await
    }

    async fn get_task(&self, id: &str) -> Result<Task, ApiError> {
        self.fetch(Method::GET, &["tasks", id], NO_BODY).await
    }

    async fn update_task(&self, id: &str, data: &TaskUpdate) -> Result<Task, ApiError> {
        self.fetch(Method::PUT, &["tasks", id], Some(data)).await
    }

    async fn delete_task(&self, id: &str) -> Result<(), ApiError> {
        self.fetch(Method::DELETE, &["tasks", id], NO_BODY).await
    }

    async fn toggle_task_complete(&self, id: &str) -> Result<Task, ApiError> {
        self.fetch(Method::PATCH, &["tasks", id, "complete"], NO_BODY).await
    }

    async fn send_message(
        &self,
        user_id: &str,
        message: &str,
        conversation_id: Option<&str>,
    ) -> Result<ChatResponse, ApiError> {
        let request = ChatRequest {
            message: message.to_string(),
            conversation_id: conversation_id.map(str::to_string),
        };
        self.fetch(Method::POST, &[user_id, "chat"], Some(&request)).await
    }

    async fn list_conversations(&self, user_id: &str) -> Result<Vec<Conversation>, ApiError> {
        self.fetch(Method::GET, &[user_id, "conversations"], NO_BODY).await
    }

    async fn get_conversation(
        &self,
        user_id: &str,
        conversation_id: &str,
    ) -> Result<ConversationDetail, ApiError> {
        self.fetch(Method::GET, &[user_id, "conversations", conversation_id], NO_BODY)
            .await
    }

    async fn create_chatkit_session(&self) -> Result<ChatkitSession, ApiError> {
        self.fetch(Method::POST, &["chatkit", "session"], NO_BODY).await
    }
}
