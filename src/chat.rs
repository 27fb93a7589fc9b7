//! Chat pipeline: classify the user's emotion, then generate a reply
//! conditioned on it. Conversation history is persisted best effort behind a
//! circuit breaker and never fails the reply.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::circuit_breaker::CircuitBreaker;

/// Turns of prior conversation included in the reply prompt.
pub const CONTEXT_TURNS: usize = 10;
const HISTORY_CAP_PER_USER: usize = 200;
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(thiserror::Error, Debug)]
pub enum ModelError {
    #[error("model request failed: {0}")]
    Transport(String),
    #[error("model returned status {0}")]
    Status(u16),
    #[error("model returned no text")]
    Empty,
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;
}

/// Google Generative Language API (`generateContent`).
pub struct GeminiClient {
    http: reqwest::Client,
    base: String,
    model: String,
    api_key: String,
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Deserialize)]
struct Part {
    text: Option<String>,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>, base: impl Into<String>) -> Result<Self, ModelError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        Ok(Self { http, base: base.into(), model: model.into(), api_key: api_key.into() })
    }
}

#[async_trait]
impl LanguageModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base.trim_end_matches('/'), self.model);
        let body = serde_json::json!({
            "contents": [{ "role": "user", "parts": [{ "text": prompt }] }]
        });
        let resp = self.http
            .post(&url)
            .query(&[("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await
            .map_err(|e| ModelError::Transport(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(ModelError::Status(resp.status().as_u16()));
        }
        let parsed: GenerateResponse = resp.json().await.map_err(|e| ModelError::Transport(e.to_string()))?;
        let text: String = parsed.candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();
        if text.trim().is_empty() {
            return Err(ModelError::Empty);
        }
        Ok(text)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum Emotion {
    Happy,
    Sad,
    Anxious,
    Angry,
    Stressed,
    Neutral,
}

impl Emotion {
    const LABELS: [(&'static str, Emotion); 6] = [
        ("happy", Emotion::Happy),
        ("sad", Emotion::Sad),
        ("anxious", Emotion::Anxious),
        ("angry", Emotion::Angry),
        ("stressed", Emotion::Stressed),
        ("neutral", Emotion::Neutral),
    ];

    pub fn as_str(&self) -> &'static str {
        Self::LABELS.iter().find(|(_, e)| e == self).map_or("neutral", |(label, _)| *label)
    }

    /// Earliest label mentioned in the model's answer; neutral when none is.
    pub fn from_model_text(text: &str) -> Emotion {
        let lower = text.to_ascii_lowercase();
        Self::LABELS
            .iter()
            .filter_map(|(label, e)| lower.find(*label).map(|pos| (pos, *e)))
            .min_by_key(|(pos, _)| *pos)
            .map_or(Emotion::Neutral, |(_, e)| e)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatTurn {
    pub role: ChatRole,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_uid: String,
    pub role: ChatRole,
    pub text: String,
    pub emotion: Option<Emotion>,
    pub created_at: DateTime<Utc>,
}

/// Typed failures of the history store. Only transient failures count
/// towards opening the breaker.
#[derive(thiserror::Error, Debug)]
pub enum HistoryError {
    #[error("history store unavailable: {0}")]
    Unavailable(String),
    #[error("history write rejected: {0}")]
    Rejected(String),
}

impl HistoryError {
    pub fn is_transient(&self) -> bool {
        matches!(self, HistoryError::Unavailable(_))
    }
}

#[async_trait]
pub trait ChatHistoryStore: Send + Sync {
    async fn append(&self, messages: &[ChatMessage]) -> Result<(), HistoryError>;
    /// Oldest first, at most `limit` messages.
    async fn recent(&self, user_uid: &str, limit: usize) -> Result<Vec<ChatMessage>, HistoryError>;
}

#[derive(Default)]
pub struct InMemoryHistory {
    by_user: RwLock<HashMap<String, Vec<ChatMessage>>>,
}

#[async_trait]
impl ChatHistoryStore for InMemoryHistory {
    async fn append(&self, messages: &[ChatMessage]) -> Result<(), HistoryError> {
        let mut map = self.by_user.write().unwrap_or_else(PoisonError::into_inner);
        for m in messages {
            let log = map.entry(m.user_uid.clone()).or_default();
            log.push(m.clone());
            if log.len() > HISTORY_CAP_PER_USER {
                let excess = log.len() - HISTORY_CAP_PER_USER;
                log.drain(..excess);
            }
        }
        Ok(())
    }

    async fn recent(&self, user_uid: &str, limit: usize) -> Result<Vec<ChatMessage>, HistoryError> {
        let map = self.by_user.read().unwrap_or_else(PoisonError::into_inner);
        let log = map.get(user_uid).map(Vec::as_slice).unwrap_or_default();
        Ok(log[log.len().saturating_sub(limit)..].to_vec())
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct ChatReply {
    pub reply: String,
    pub emotion: Emotion,
    pub history_saved: bool,
}

pub struct ChatPipeline {
    model: Arc<dyn LanguageModel>,
    history: Arc<dyn ChatHistoryStore>,
    breaker: CircuitBreaker,
}

fn classification_prompt(message: &str) -> String {
    format!(
        "Classify the dominant emotion of the following message. Answer with exactly one word from: \
         happy, sad, anxious, angry, stressed, neutral.\n\nMessage: {message}"
    )
}

fn reply_prompt(message: &str, emotion: Emotion, context: &[ChatTurn]) -> String {
    let mut prompt = String::from(
        "You are Chetana, a warm and supportive mental-wellness companion. Respond with empathy in a few \
         sentences. Do not diagnose. If the user mentions self-harm, encourage them to contact a crisis \
         helpline or a trusted person immediately.\n",
    );
    prompt.push_str(&format!("The user currently seems {}.\n", emotion.as_str()));
    let start = context.len().saturating_sub(CONTEXT_TURNS);
    if start < context.len() {
        prompt.push_str("\nConversation so far:\n");
        for turn in &context[start..] {
            let who = match turn.role {
                ChatRole::User => "User",
                ChatRole::Assistant => "Chetana",
            };
            prompt.push_str(&format!("{who}: {}\n", turn.text));
        }
    }
    prompt.push_str(&format!("\nUser: {message}\nChetana:"));
    prompt
}

impl ChatPipeline {
    pub fn new(model: Arc<dyn LanguageModel>, history: Arc<dyn ChatHistoryStore>, breaker: CircuitBreaker) -> Self {
        Self { model, history, breaker }
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    async fn classify(&self, message: &str) -> Emotion {
        match self.model.generate(&classification_prompt(message)).await {
            Ok(text) => Emotion::from_model_text(&text),
            Err(e) => {
                warn!("emotion classification failed, assuming neutral: {e}");
                Emotion::Neutral
            }
        }
    }

    /// Runs both model calls. Only a failure of the reply call is an error.
    pub async fn respond(&self, user_uid: Option<&str>, message: &str, context: &[ChatTurn]) -> Result<ChatReply, ModelError> {
        let emotion = self.classify(message).await;

        let stored;
        let context = match (context.is_empty(), user_uid) {
            (true, Some(uid)) => {
                stored = self.load_context(uid).await;
                stored.as_slice()
            }
            _ => context,
        };

        let reply = self.model.generate(&reply_prompt(message, emotion, context)).await?;
        let reply = reply.trim().to_string();
        if reply.is_empty() {
            return Err(ModelError::Empty);
        }

        let history_saved = match user_uid {
            Some(uid) => self.persist(uid, message, &reply, emotion).await,
            None => false,
        };
        Ok(ChatReply { reply, emotion, history_saved })
    }

    async fn load_context(&self, user_uid: &str) -> Vec<ChatTurn> {
        self.history(user_uid, CONTEXT_TURNS)
            .await
            .into_iter()
            .map(|m| ChatTurn { role: m.role, text: m.text })
            .collect()
    }

    fn settle<T>(&self, result: Result<T, HistoryError>) -> Option<T> {
        match result {
            Ok(v) => {
                self.breaker.record_success();
                Some(v)
            }
            Err(e) if e.is_transient() => {
                self.breaker.record_failure();
                warn!("chat history: {e}");
                None
            }
            Err(e) => {
                // the store answered, so it is healthy even though it refused
                self.breaker.record_success();
                warn!("chat history: {e}");
                None
            }
        }
    }

    async fn persist(&self, user_uid: &str, message: &str, reply: &str, emotion: Emotion) -> bool {
        if !self.breaker.allow() {
            debug!("chat history breaker open, skipping persistence");
            return false;
        }
        let now = Utc::now();
        let messages = [
            ChatMessage {
                id: Uuid::new_v4(),
                user_uid: user_uid.to_string(),
                role: ChatRole::User,
                text: message.to_string(),
                emotion: None,
                created_at: now,
            },
            ChatMessage {
                id: Uuid::new_v4(),
                user_uid: user_uid.to_string(),
                role: ChatRole::Assistant,
                text: reply.to_string(),
                emotion: Some(emotion),
                created_at: now,
            },
        ];
        let result = self.history.append(&messages).await;
        self.settle(result).is_some()
    }

    /// Stored conversation, empty when the store is unavailable.
    pub async fn history(&self, user_uid: &str, limit: usize) -> Vec<ChatMessage> {
        if !self.breaker.allow() {
            return Vec::new();
        }
        let result = self.history.recent(user_uid, limit).await;
        self.settle(result).unwrap_or_default()
    }
}
