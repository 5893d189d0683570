use std::env;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, instrument, warn};
use url::Url;

use tutor_core::model::{
    Bookmark, BookmarkId, Difficulty, NewBookmark, PauseId, QuizId, SentimentReading,
    SessionState, SpacedRepetitionTopic, TeachingMode, TopicId,
};

use crate::contracts::{ChatPrompt, ChatReply, DialogueService, EmotionService, PersistenceService};
use crate::error::RemoteError;
use crate::records::{
    BookmarkListRecord, BookmarkRecord, BookmarkRequest, ChatReplyRecord, ChatRequest,
    DifficultyRequest, ModeRequest, PauseRecord, PauseRequest, QuizAnswerRequest,
    QuizFeedbackRecord, SentimentRecord, SentimentRequest, SessionStateRecord, TopicListRecord,
};

pub const DEFAULT_API_URL: &str = "http://localhost:8000";

#[derive(Clone, Debug)]
pub struct RemoteConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

impl RemoteConfig {
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidUrl` if `base_url` does not parse.
    pub fn new(base_url: &str, token: Option<String>) -> Result<Self, RemoteError> {
        // a trailing slash keeps the last path segment when joining
        let mut base = base_url.trim().trim_end_matches('/').to_string();
        base.push('/');
        Ok(Self {
            base_url: Url::parse(&base)?,
            token: token.filter(|t| !t.trim().is_empty()),
        })
    }

    /// Reads `TUTOR_API_URL` and `TUTOR_API_TOKEN`.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidUrl` if `TUTOR_API_URL` does not parse.
    pub fn from_env() -> Result<Self, RemoteError> {
        let base_url = env::var("TUTOR_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.into());
        Self::new(&base_url, env::var("TUTOR_API_TOKEN").ok())
    }

    /// Replace the URL and/or token, e.g. from command-line flags. A blank
    /// token override clears the token.
    ///
    /// # Errors
    ///
    /// Returns `RemoteError::InvalidUrl` if `base_url` does not parse.
    pub fn with_overrides(
        self,
        base_url: Option<&str>,
        token: Option<String>,
    ) -> Result<Self, RemoteError> {
        if base_url.is_none() && token.is_none() {
            return Ok(self);
        }
        let base = base_url.map_or_else(|| self.base_url.to_string(), str::to_string);
        Self::new(&base, token.or(self.token))
    }

    /// # Errors
    ///
    /// Returns `RemoteError::InvalidUrl` if `path` cannot be joined.
    pub fn endpoint(&self, path: &str) -> Result<Url, RemoteError> {
        Ok(self.base_url.join(path)?)
    }
}

/// Talks to the tutoring backend over HTTP+JSON. Implements all three
/// service contracts.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: RemoteConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: RemoteConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RemoteConfig {
        &self.config
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.config.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder, what: &str) -> Result<Response, RemoteError> {
        let response = self.authorized(request).send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        warn!(%status, endpoint = what, "remote call rejected");
        Err(match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => RemoteError::AuthExpired(status),
            StatusCode::NOT_FOUND => RemoteError::NotFound(what.to_string()),
            _ => RemoteError::Status(status),
        })
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, RemoteError> {
        let bytes = response.bytes().await?;
        serde_json::from_slice(&bytes).map_err(|e| RemoteError::Decode(e.to_string()))
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, RemoteError> {
        let url = self.config.endpoint(path)?;
        let response = self.send(self.client.get(url), path).await?;
        Self::decode(response).await
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, RemoteError>
    where
        B: serde::Serialize + ?Sized + Sync,
        T: DeserializeOwned,
    {
        let url = self.config.endpoint(path)?;
        let response = self.send(self.client.post(url).json(body), path).await?;
        Self::decode(response).await
    }

    async fn post_empty(&self, path: &str) -> Result<(), RemoteError> {
        let url = self.config.endpoint(path)?;
        self.send(self.client.post(url), path).await?;
        Ok(())
    }
}

#[async_trait]
impl EmotionService for HttpBackend {
    #[instrument(skip_all)]
    async fn analyze(&self, text: &str) -> Result<SentimentReading, RemoteError> {
        let record: SentimentRecord = self
            .post_json("sentiment", &SentimentRequest { message: text })
            .await?;
        Ok(record.into_reading())
    }
}

#[async_trait]
impl DialogueService for HttpBackend {
    #[instrument(skip_all, fields(topic = %prompt.topic))]
    async fn generate(&self, prompt: &ChatPrompt) -> Result<ChatReply, RemoteError> {
        let record: ChatReplyRecord = self
            .post_json("chat/message", &ChatRequest::from(prompt))
            .await?;
        debug!(has_quiz = record.quiz.is_some(), "chat reply received");
        Ok(record.into_reply())
    }

    #[instrument(skip(self), fields(quiz_id = quiz_id.value()))]
    async fn quiz_feedback(
        &self,
        quiz_id: QuizId,
        selected: usize,
    ) -> Result<String, RemoteError> {
        let request = QuizAnswerRequest {
            quiz_id: quiz_id.value(),
            selected_option: selected,
        };
        let record: QuizFeedbackRecord = self.post_json("chat/quiz/answer", &request).await?;
        Ok(record.feedback)
    }
}

#[async_trait]
impl PersistenceService for HttpBackend {
    #[instrument(skip_all)]
    async fn session_state(&self) -> Result<SessionState, RemoteError> {
        let record: SessionStateRecord =
            self.get_json("personalization/session-state").await?;
        record.into_state()
    }

    #[instrument(skip_all)]
    async fn pause_session(&self, reason: Option<&str>) -> Result<PauseId, RemoteError> {
        let record: PauseRecord = self
            .post_json("personalization/pause-session", &PauseRequest { reason })
            .await?;
        Ok(PauseId::new(record.pause_id))
    }

    #[instrument(skip(self), fields(pause_id = pause_id.value()))]
    async fn resume_session(&self, pause_id: PauseId) -> Result<(), RemoteError> {
        self.post_empty(&format!("personalization/resume-session/{pause_id}"))
            .await
    }

    #[instrument(skip(self), fields(difficulty = difficulty.value()))]
    async fn update_difficulty(&self, difficulty: Difficulty) -> Result<(), RemoteError> {
        let request = DifficultyRequest {
            difficulty: difficulty.value(),
        };
        let _: serde_json::Value = self
            .post_json("personalization/update-difficulty", &request)
            .await?;
        Ok(())
    }

    #[instrument(skip(self), fields(mode = mode.as_str()))]
    async fn update_mode(&self, mode: TeachingMode) -> Result<(), RemoteError> {
        let request = ModeRequest {
            mode: mode.as_str(),
        };
        let _: serde_json::Value = self
            .post_json("personalization/update-mode", &request)
            .await?;
        Ok(())
    }

    #[instrument(skip_all)]
    async fn spaced_repetition_topics(&self) -> Result<Vec<SpacedRepetitionTopic>, RemoteError> {
        let record: TopicListRecord = self.get_json("personalization/spaced-repetition").await?;
        record
            .topics
            .into_iter()
            .map(|t| t.into_topic())
            .collect()
    }

    #[instrument(skip(self), fields(topic_id = topic_id.value()))]
    async fn record_review(&self, topic_id: TopicId, success: bool) -> Result<(), RemoteError> {
        self.post_empty(&format!(
            "personalization/spaced-repetition/{topic_id}/review?success={success}"
        ))
        .await
    }

    #[instrument(skip_all)]
    async fn create_bookmark(&self, bookmark: &NewBookmark) -> Result<Bookmark, RemoteError> {
        let record: BookmarkRecord = self
            .post_json("personalization/bookmarks", &BookmarkRequest::from(bookmark))
            .await?;
        let mut created = record.into_bookmark()?;
        // the create response omits the message reference
        if created.message_id.is_none() {
            created.message_id = bookmark.message_id();
        }
        Ok(created)
    }

    #[instrument(skip_all)]
    async fn list_bookmarks(&self) -> Result<Vec<Bookmark>, RemoteError> {
        let record: BookmarkListRecord = self.get_json("personalization/bookmarks").await?;
        record
            .bookmarks
            .into_iter()
            .map(BookmarkRecord::into_bookmark)
            .collect()
    }

    #[instrument(skip(self), fields(bookmark_id = id.value()))]
    async fn delete_bookmark(&self, id: BookmarkId) -> Result<(), RemoteError> {
        let url = self
            .config
            .endpoint(&format!("personalization/bookmarks/{id}"))?;
        self.send(self.client.delete(url), "personalization/bookmarks")
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_join_under_base_path() {
        let config = RemoteConfig::new("http://tutor.local/api", None).unwrap();
        assert_eq!(
            config.endpoint("chat/message").unwrap().as_str(),
            "http://tutor.local/api/chat/message"
        );

        let config = RemoteConfig::new("http://localhost:8000/", Some(" ".into())).unwrap();
        assert_eq!(
            config
                .endpoint("personalization/spaced-repetition/4/review?success=true")
                .unwrap()
                .as_str(),
            "http://localhost:8000/personalization/spaced-repetition/4/review?success=true"
        );
        assert!(config.token.is_none());
    }

    #[test]
    fn rejects_unparseable_base_url() {
        assert!(matches!(
            RemoteConfig::new("not a url", None),
            Err(RemoteError::InvalidUrl(_))
        ));
    }

    #[test]
    fn overrides_replace_only_what_is_given() {
        let base = RemoteConfig::new("http://tutor.local/api", Some("env-token".into())).unwrap();

        let same = base.clone().with_overrides(None, None).unwrap();
        assert_eq!(same.base_url, base.base_url);
        assert_eq!(same.token.as_deref(), Some("env-token"));

        let flagged = base
            .clone()
            .with_overrides(Some("http://other.local"), None)
            .unwrap();
        assert_eq!(flagged.base_url.as_str(), "http://other.local/");
        assert_eq!(flagged.token.as_deref(), Some("env-token"));

        let retokened = base.clone().with_overrides(None, Some("cli".into())).unwrap();
        assert_eq!(retokened.base_url, base.base_url);
        assert_eq!(retokened.token.as_deref(), Some("cli"));

        assert!(base.with_overrides(Some("::nope"), None).is_err());
    }
}
