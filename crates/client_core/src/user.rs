use std::{collections::HashSet, sync::Arc};

use shared::{
    domain::{StoryId, Username},
    protocol::{AuthResponse, UserRecord},
};
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    error::Result,
    story::{dedup_by_id, Story},
    transport::StoryService,
};

#[derive(Default)]
struct FavoritesInner {
    ids: HashSet<StoryId>,
    favorites: Vec<Story>,
    own_stories: Vec<Story>,
}

/// Favorites and own stories of the logged-in user, mirrored locally so the
/// views can update without another round-trip.
pub struct UserFavoritesState {
    service: Arc<dyn StoryService>,
    inner: RwLock<FavoritesInner>,
}

impl UserFavoritesState {
    pub fn new(
        service: Arc<dyn StoryService>,
        favorites: Vec<Story>,
        own_stories: Vec<Story>,
    ) -> Self {
        let favorites = dedup_by_id(favorites);
        let ids = favorites.iter().map(|story| story.id().clone()).collect();
        Self {
            service,
            inner: RwLock::new(FavoritesInner {
                ids,
                favorites,
                own_stories: dedup_by_id(own_stories),
            }),
        }
    }

    pub async fn is_favorite(&self, story_id: &StoryId) -> bool {
        self.inner.read().await.ids.contains(story_id)
    }

    pub async fn add_favorite(&self, session: &SessionCredentials, story: &Story) -> Result<()> {
        if self.is_favorite(story.id()).await {
            return Ok(());
        }

        self.service
            .add_favorite(&session.token, &session.username, story.id())
            .await?;

        let mut inner = self.inner.write().await;
        if inner.ids.insert(story.id().clone()) {
            inner.favorites.push(story.clone());
        }
        info!(story_id = %story.id(), username = %session.username, "favorites: added");
        Ok(())
    }

    pub async fn remove_favorite(
        &self,
        session: &SessionCredentials,
        story: &Story,
    ) -> Result<()> {
        if !self.is_favorite(story.id()).await {
            return Ok(());
        }

        self.service
            .remove_favorite(&session.token, &session.username, story.id())
            .await?;

        let mut inner = self.inner.write().await;
        inner.ids.remove(story.id());
        inner.favorites.retain(|favorite| favorite.id() != story.id());
        info!(story_id = %story.id(), username = %session.username, "favorites: removed");
        Ok(())
    }

    /// Drops a story from the local favorites without telling the server,
    /// used once the story itself has been deleted.
    pub async fn forget_favorite(&self, story_id: &StoryId) {
        let mut inner = self.inner.write().await;
        if inner.ids.remove(story_id) {
            inner.favorites.retain(|favorite| favorite.id() != story_id);
        }
    }

    pub async fn favorite_ids(&self) -> HashSet<StoryId> {
        self.inner.read().await.ids.clone()
    }

    pub async fn favorites(&self) -> Vec<Story> {
        self.inner.read().await.favorites.clone()
    }

    pub async fn own_stories(&self) -> Vec<Story> {
        self.inner.read().await.own_stories.clone()
    }

    pub async fn push_own_story(&self, story: Story) {
        let mut inner = self.inner.write().await;
        inner.own_stories.retain(|existing| existing.id() != story.id());
        inner.own_stories.insert(0, story);
    }

    pub async fn remove_own_story(&self, story_id: &StoryId) -> bool {
        let mut inner = self.inner.write().await;
        let before = inner.own_stories.len();
        inner.own_stories.retain(|story| story.id() != story_id);
        inner.own_stories.len() != before
    }
}

#[derive(Debug, Clone)]
pub struct SessionCredentials {
    pub username: Username,
    pub token: String,
}

/// An authenticated user for the lifetime of one login.
pub struct UserSession {
    credentials: SessionCredentials,
    name: String,
    favorites: UserFavoritesState,
}

impl UserSession {
    pub fn from_record(
        service: Arc<dyn StoryService>,
        token: String,
        record: UserRecord,
    ) -> Self {
        let favorites = record.favorites.into_iter().map(Story::from).collect();
        let own_stories = record.stories.into_iter().map(Story::from).collect();
        Self {
            credentials: SessionCredentials {
                username: record.username,
                token,
            },
            name: record.name,
            favorites: UserFavoritesState::new(service, favorites, own_stories),
        }
    }

    pub async fn login(
        service: Arc<dyn StoryService>,
        username: &str,
        password: &str,
    ) -> Result<Self> {
        let AuthResponse { token, user } = service.login(username, password).await?;
        info!(username = %user.username, "session: logged in");
        Ok(Self::from_record(service, token, user))
    }

    pub async fn signup(
        service: Arc<dyn StoryService>,
        username: &str,
        password: &str,
        name: &str,
    ) -> Result<Self> {
        let AuthResponse { token, user } = service.signup(username, password, name).await?;
        info!(username = %user.username, "session: signed up");
        Ok(Self::from_record(service, token, user))
    }

    /// Rebuilds a session from stored credentials.
    pub async fn restore(
        service: Arc<dyn StoryService>,
        username: Username,
        token: String,
    ) -> Result<Self> {
        let user = service.get_user(&token, &username).await?;
        info!(username = %user.username, "session: restored");
        Ok(Self::from_record(service, token, user))
    }

    pub fn credentials(&self) -> &SessionCredentials {
        &self.credentials
    }

    pub fn username(&self) -> &Username {
        &self.credentials.username
    }

    pub fn token(&self) -> &str {
        &self.credentials.token
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn favorites(&self) -> &UserFavoritesState {
        &self.favorites
    }
}

#[cfg(test)]
#[path = "tests/user_tests.rs"]
mod tests;
