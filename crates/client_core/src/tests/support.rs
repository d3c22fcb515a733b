use std::{
    collections::HashMap,
    sync::{Arc, Mutex as StdMutex},
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use shared::{
    domain::{StoryId, Username},
    error::ErrorCode,
    protocol::{AuthResponse, NewStory, StoryRecord, UserRecord},
};
use tokio::sync::{Mutex, Notify};

use crate::{
    error::{Result, StoryError},
    transport::StoryService,
};

pub(crate) fn fixed_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0)
        .single()
        .expect("valid timestamp")
}

pub(crate) fn story_record(id: &str, title: &str, url: &str, username: &str) -> StoryRecord {
    StoryRecord {
        story_id: StoryId::new(id),
        title: title.to_string(),
        author: format!("{title} author"),
        url: url.to_string(),
        username: Username::new(username),
        created_at: fixed_time(),
        updated_at: Some(fixed_time()),
    }
}

/// Blocks one remote call until released, so a test can observe the
/// coordinator while that call is in flight.
#[derive(Clone, Default)]
pub(crate) struct Gate {
    pub entered: Arc<Notify>,
    pub release: Arc<Notify>,
}

struct FakeUser {
    password: String,
    token: String,
    name: String,
    favorites: Vec<StoryId>,
}

#[derive(Default)]
struct FakeState {
    stories: Vec<StoryRecord>,
    users: HashMap<String, FakeUser>,
    next_id: u32,
}

/// In-memory stand-in for the remote story service.
#[derive(Default)]
pub(crate) struct FakeStoryService {
    state: Mutex<FakeState>,
    calls: StdMutex<Vec<String>>,
    gates: StdMutex<HashMap<String, Gate>>,
    fail_with: StdMutex<Option<ErrorCode>>,
}

impl FakeStoryService {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub async fn with_story(&self, record: StoryRecord) {
        self.state.lock().await.stories.push(record);
    }

    pub async fn with_user(&self, username: &str, password: &str) {
        self.state.lock().await.users.insert(
            username.to_string(),
            FakeUser {
                password: password.to_string(),
                token: format!("token-{username}"),
                name: username.to_uppercase(),
                favorites: Vec::new(),
            },
        );
    }

    pub async fn with_favorite(&self, username: &str, story_id: &str) {
        if let Some(user) = self.state.lock().await.users.get_mut(username) {
            user.favorites.push(StoryId::new(story_id));
        }
    }

    /// Holds the next call named `call` (e.g. `add_favorite:s1`). Deletes and
    /// added favorites can also be held after the server applied them, as
    /// `delete_story_reply:s1` or `add_favorite_reply:s1`.
    pub fn hold(&self, call: &str) -> Gate {
        let gate = Gate::default();
        self.gates
            .lock()
            .expect("gate lock")
            .insert(call.to_string(), gate.clone());
        gate
    }

    pub fn release(&self, call: &str) {
        let gate = self.gates.lock().expect("gate lock").remove(call);
        if let Some(gate) = gate {
            gate.release.notify_one();
        }
    }

    pub fn fail_next(&self, code: ErrorCode) {
        *self.fail_with.lock().expect("fail lock") = Some(code);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count_calls(&self, prefix: &str) -> usize {
        self.calls()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    pub async fn server_favorites(&self, username: &str) -> Vec<StoryId> {
        self.state
            .lock()
            .await
            .users
            .get(username)
            .map(|user| user.favorites.clone())
            .unwrap_or_default()
    }

    pub async fn server_story_ids(&self) -> Vec<StoryId> {
        self.state
            .lock()
            .await
            .stories
            .iter()
            .map(|story| story.story_id.clone())
            .collect()
    }

    /// Removes a story behind the client's back, as another user or tab would.
    pub async fn remove_server_story(&self, story_id: &str) {
        self.state
            .lock()
            .await
            .stories
            .retain(|story| story.story_id.as_str() != story_id);
    }

    async fn enter(&self, call: String) -> Result<()> {
        let gate = self.gates.lock().expect("gate lock").get(&call).cloned();
        self.calls.lock().expect("calls lock").push(call);
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
        let failure = self.fail_with.lock().expect("fail lock").take();
        match failure {
            Some(code) => Err(error_for(code)),
            None => Ok(()),
        }
    }

    /// Waits on a held gate without recording a call or consuming a failure.
    async fn pause(&self, call: String) {
        let gate = self.gates.lock().expect("gate lock").get(&call).cloned();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }
    }

    fn username_for_token(state: &FakeState, token: &str) -> Result<String> {
        state
            .users
            .iter()
            .find(|(_, user)| user.token == token)
            .map(|(name, _)| name.clone())
            .ok_or(StoryError::Unauthenticated)
    }

    fn user_record(state: &FakeState, username: &str) -> Result<UserRecord> {
        let user = state.users.get(username).ok_or(StoryError::Unauthenticated)?;
        let favorites = user
            .favorites
            .iter()
            .filter_map(|id| state.stories.iter().find(|story| &story.story_id == id))
            .cloned()
            .collect();
        let stories = state
            .stories
            .iter()
            .filter(|story| story.username.as_str() == username)
            .cloned()
            .collect();
        Ok(UserRecord {
            username: Username::new(username),
            name: user.name.clone(),
            created_at: Some(fixed_time()),
            favorites,
            stories,
        })
    }
}

fn error_for(code: ErrorCode) -> StoryError {
    match code {
        ErrorCode::Unauthenticated => StoryError::Unauthenticated,
        ErrorCode::Forbidden => StoryError::Forbidden("not allowed".to_string()),
        ErrorCode::NotFound => StoryError::NotFound(StoryId::new("missing")),
        ErrorCode::ServiceUnavailable => {
            StoryError::ServiceUnavailable("connection refused".to_string())
        }
        ErrorCode::ValidationFailed => StoryError::ValidationFailed("bad payload".to_string()),
    }
}

#[async_trait]
impl StoryService for FakeStoryService {
    async fn list_stories(&self) -> Result<Vec<StoryRecord>> {
        let failure = self.fail_with.lock().expect("fail lock").take();
        self.calls
            .lock()
            .expect("calls lock")
            .push("list_stories".to_string());
        if let Some(code) = failure {
            return Err(error_for(code));
        }
        Ok(self.state.lock().await.stories.clone())
    }

    async fn create_story(&self, token: &str, story: &NewStory) -> Result<StoryRecord> {
        self.enter(format!("create_story:{}", story.title)).await?;
        let mut state = self.state.lock().await;
        let username = Self::username_for_token(&state, token)?;
        state.next_id += 1;
        let record = StoryRecord {
            story_id: StoryId::new(format!("new-{}", state.next_id)),
            title: story.title.clone(),
            author: story.author.clone(),
            url: story.url.clone(),
            username: Username::new(username),
            created_at: fixed_time(),
            updated_at: Some(fixed_time()),
        };
        state.stories.insert(0, record.clone());
        Ok(record)
    }

    async fn delete_story(&self, token: &str, story_id: &StoryId) -> Result<()> {
        self.enter(format!("delete_story:{story_id}")).await?;
        let mut state = self.state.lock().await;
        let username = Self::username_for_token(&state, token)?;
        let index = state
            .stories
            .iter()
            .position(|story| &story.story_id == story_id)
            .ok_or_else(|| StoryError::NotFound(story_id.clone()))?;
        if state.stories[index].username.as_str() != username {
            return Err(StoryError::Forbidden(
                "only the creator of a story can delete it".to_string(),
            ));
        }
        state.stories.remove(index);
        drop(state);
        // The server has committed the delete; only the reply is held.
        self.pause(format!("delete_story_reply:{story_id}")).await;
        Ok(())
    }

    async fn add_favorite(
        &self,
        token: &str,
        username: &Username,
        story_id: &StoryId,
    ) -> Result<()> {
        self.enter(format!("add_favorite:{story_id}")).await?;
        let mut state = self.state.lock().await;
        if Self::username_for_token(&state, token)? != username.as_str() {
            return Err(StoryError::Forbidden("token does not match user".to_string()));
        }
        if !state.stories.iter().any(|story| &story.story_id == story_id) {
            return Err(StoryError::NotFound(story_id.clone()));
        }
        let user = state
            .users
            .get_mut(username.as_str())
            .ok_or(StoryError::Unauthenticated)?;
        if !user.favorites.contains(story_id) {
            user.favorites.push(story_id.clone());
        }
        drop(state);
        self.pause(format!("add_favorite_reply:{story_id}")).await;
        Ok(())
    }

    async fn remove_favorite(
        &self,
        token: &str,
        username: &Username,
        story_id: &StoryId,
    ) -> Result<()> {
        self.enter(format!("remove_favorite:{story_id}")).await?;
        let mut state = self.state.lock().await;
        if Self::username_for_token(&state, token)? != username.as_str() {
            return Err(StoryError::Forbidden("token does not match user".to_string()));
        }
        let user = state
            .users
            .get_mut(username.as_str())
            .ok_or(StoryError::Unauthenticated)?;
        user.favorites.retain(|id| id != story_id);
        Ok(())
    }

    async fn login(&self, username: &str, password: &str) -> Result<AuthResponse> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("login:{username}"));
        let state = self.state.lock().await;
        let user = state
            .users
            .get(username)
            .filter(|user| user.password == password)
            .ok_or(StoryError::Unauthenticated)?;
        Ok(AuthResponse {
            token: user.token.clone(),
            user: Self::user_record(&state, username)?,
        })
    }

    async fn signup(&self, username: &str, password: &str, name: &str) -> Result<AuthResponse> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("signup:{username}"));
        let mut state = self.state.lock().await;
        if state.users.contains_key(username) {
            return Err(StoryError::ValidationFailed("username taken".to_string()));
        }
        let token = format!("token-{username}");
        state.users.insert(
            username.to_string(),
            FakeUser {
                password: password.to_string(),
                token: token.clone(),
                name: name.to_string(),
                favorites: Vec::new(),
            },
        );
        Ok(AuthResponse {
            token,
            user: Self::user_record(&state, username)?,
        })
    }

    async fn get_user(&self, token: &str, username: &Username) -> Result<UserRecord> {
        self.calls
            .lock()
            .expect("calls lock")
            .push(format!("get_user:{username}"));
        let state = self.state.lock().await;
        if Self::username_for_token(&state, token)? != username.as_str() {
            return Err(StoryError::Unauthenticated);
        }
        Self::user_record(&state, username.as_str())
    }
}
