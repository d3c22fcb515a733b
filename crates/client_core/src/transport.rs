//! Boundary to the remote story service.
//!
//! Everything the core needs from the network goes through [`StoryService`];
//! [`HttpStoryService`] is the production implementation.

use async_trait::async_trait;
use reqwest::{Client, Response};
use shared::{
    domain::{StoryId, Username},
    error::ServiceErrorBody,
    protocol::{
        AuthRequest, AuthResponse, CreateStoryRequest, Credentials, NewStory,
        StoriesEnvelope, StoryEnvelope, StoryRecord, TokenBody, UserEnvelope, UserRecord,
    },
};
use tracing::debug;
use url::Url;

use crate::error::{Result, StoryError};

pub const DEFAULT_SERVER_URL: &str = "https://hack-or-snooze-v3.herokuapp.com";

#[async_trait]
pub trait StoryService: Send + Sync {
    async fn list_stories(&self) -> Result<Vec<StoryRecord>>;
    async fn create_story(&self, token: &str, story: &NewStory) -> Result<StoryRecord>;
    async fn delete_story(&self, token: &str, story_id: &StoryId) -> Result<()>;
    async fn add_favorite(&self, token: &str, username: &Username, story_id: &StoryId)
        -> Result<()>;
    async fn remove_favorite(
        &self,
        token: &str,
        username: &Username,
        story_id: &StoryId,
    ) -> Result<()>;
    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse>;
    async fn signup(&self, username: &str, password: &str, name: &str) -> Result<AuthResponse>;
    async fn get_user(&self, token: &str, username: &Username) -> Result<UserRecord>;
}

pub struct MissingStoryService;

fn unavailable() -> StoryError {
    StoryError::ServiceUnavailable("story service is not configured".to_string())
}

#[async_trait]
impl StoryService for MissingStoryService {
    async fn list_stories(&self) -> Result<Vec<StoryRecord>> {
        Err(unavailable())
    }

    async fn create_story(&self, _token: &str, _story: &NewStory) -> Result<StoryRecord> {
        Err(unavailable())
    }

    async fn delete_story(&self, _token: &str, _story_id: &StoryId) -> Result<()> {
        Err(unavailable())
    }

    async fn add_favorite(
        &self,
        _token: &str,
        _username: &Username,
        _story_id: &StoryId,
    ) -> Result<()> {
        Err(unavailable())
    }

    async fn remove_favorite(
        &self,
        _token: &str,
        _username: &Username,
        _story_id: &StoryId,
    ) -> Result<()> {
        Err(unavailable())
    }

    async fn login(&self, _username: &str, _password: &str) -> Result<AuthResponse> {
        Err(unavailable())
    }

    async fn signup(&self, _username: &str, _password: &str, _name: &str) -> Result<AuthResponse> {
        Err(unavailable())
    }

    async fn get_user(&self, _token: &str, _username: &Username) -> Result<UserRecord> {
        Err(unavailable())
    }
}

pub struct HttpStoryService {
    http: Client,
    base_url: Url,
}

impl HttpStoryService {
    pub fn new(server_url: &str) -> Result<Self> {
        let trimmed = server_url.trim().trim_end_matches('/');
        let base_url = Url::parse(trimmed)
            .map_err(|err| StoryError::ValidationFailed(format!("invalid server url: {err}")))?;
        if base_url.cannot_be_a_base() {
            return Err(StoryError::ValidationFailed(format!(
                "server url cannot be used as a base: {trimmed}"
            )));
        }
        Ok(Self {
            http: Client::new(),
            base_url,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn expect_success(response: Response, target: Option<&StoryId>) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ServiceErrorBody>(&body)
            .ok()
            .and_then(|parsed| parsed.message())
            .unwrap_or_else(|| {
                status
                    .canonical_reason()
                    .unwrap_or("unexpected response")
                    .to_string()
            });
        Err(StoryError::from_status(status.as_u16(), message, target))
    }
}

#[async_trait]
impl StoryService for HttpStoryService {
    async fn list_stories(&self) -> Result<Vec<StoryRecord>> {
        let response = self.http.get(self.endpoint(&["stories"])).send().await?;
        let envelope: StoriesEnvelope = Self::expect_success(response, None)
            .await?
            .json()
            .await?;
        debug!(count = envelope.stories.len(), "stories: fetched list");
        Ok(envelope.stories)
    }

    async fn create_story(&self, token: &str, story: &NewStory) -> Result<StoryRecord> {
        let response = self
            .http
            .post(self.endpoint(&["stories"]))
            .json(&CreateStoryRequest {
                token: token.to_string(),
                story: story.clone(),
            })
            .send()
            .await?;
        let envelope: StoryEnvelope = Self::expect_success(response, None)
            .await?
            .json()
            .await?;
        Ok(envelope.story)
    }

    async fn delete_story(&self, token: &str, story_id: &StoryId) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&["stories", story_id.as_str()]))
            .json(&TokenBody {
                token: token.to_string(),
            })
            .send()
            .await?;
        Self::expect_success(response, Some(story_id)).await?;
        Ok(())
    }

    async fn add_favorite(
        &self,
        token: &str,
        username: &Username,
        story_id: &StoryId,
    ) -> Result<()> {
        let response = self
            .http
            .post(self.endpoint(&[
                "users",
                username.as_str(),
                "favorites",
                story_id.as_str(),
            ]))
            .json(&TokenBody {
                token: token.to_string(),
            })
            .send()
            .await?;
        Self::expect_success(response, Some(story_id)).await?;
        Ok(())
    }

    async fn remove_favorite(
        &self,
        token: &str,
        username: &Username,
        story_id: &StoryId,
    ) -> Result<()> {
        let response = self
            .http
            .delete(self.endpoint(&[
                "users",
                username.as_str(),
                "favorites",
                story_id.as_str(),
            ]))
            .json(&TokenBody {
                token: token.to_string(),
            })
            .send()
            .await?;
        Self::expect_success(response, Some(story_id)).await?;
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        let response = self
            .http
            .post(self.endpoint(&["login"]))
            .json(&AuthRequest {
                user: Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                    name: None,
                },
            })
            .send()
            .await?;
        Ok(Self::expect_success(response, None).await?.json().await?)
    }

    async fn signup(&self, username: &str, password: &str, name: &str) -> Result<AuthResponse> {
        let response = self
            .http
            .post(self.endpoint(&["signup"]))
            .json(&AuthRequest {
                user: Credentials {
                    username: username.to_string(),
                    password: password.to_string(),
                    name: Some(name.to_string()),
                },
            })
            .send()
            .await?;
        Ok(Self::expect_success(response, None).await?.json().await?)
    }

    async fn get_user(&self, token: &str, username: &Username) -> Result<UserRecord> {
        let response = self
            .http
            .get(self.endpoint(&["users", username.as_str()]))
            .query(&[("token", token)])
            .send()
            .await?;
        let envelope: UserEnvelope = Self::expect_success(response, None)
            .await?
            .json()
            .await?;
        Ok(envelope.user)
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
