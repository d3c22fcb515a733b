use std::sync::Arc;

use shared::domain::Username;
use tokio::sync::RwLock;
use tracing::info;

use crate::{
    error::{Result, StoryError},
    story::StoryCollection,
    transport::StoryService,
    user::UserSession,
};

/// Session-scoped state: the global story collection for this page session
/// and the logged-in user, if any.
pub struct SessionContext {
    service: Arc<dyn StoryService>,
    stories: RwLock<Arc<StoryCollection>>,
    user: RwLock<Option<Arc<UserSession>>>,
}

impl SessionContext {
    pub fn new(service: Arc<dyn StoryService>) -> Self {
        let stories = Arc::new(StoryCollection::new(Arc::clone(&service), Vec::new()));
        Self {
            service,
            stories: RwLock::new(stories),
            user: RwLock::new(None),
        }
    }

    pub fn service(&self) -> Arc<dyn StoryService> {
        Arc::clone(&self.service)
    }

    /// Page-load initialisation: replaces the collection with a fresh fetch.
    pub async fn init(&self) -> Result<Arc<StoryCollection>> {
        let collection = Arc::new(StoryCollection::fetch_all(self.service()).await?);
        *self.stories.write().await = Arc::clone(&collection);
        Ok(collection)
    }

    pub async fn stories(&self) -> Arc<StoryCollection> {
        Arc::clone(&*self.stories.read().await)
    }

    pub async fn user(&self) -> Option<Arc<UserSession>> {
        self.user.read().await.clone()
    }

    pub async fn require_user(&self) -> Result<Arc<UserSession>> {
        self.user().await.ok_or(StoryError::Unauthenticated)
    }

    pub async fn username(&self) -> Option<Username> {
        self.user
            .read()
            .await
            .as_ref()
            .map(|user| user.username().clone())
    }

    pub async fn attach_user(&self, user: UserSession) -> Arc<UserSession> {
        let user = Arc::new(user);
        let previous = self.user.write().await.replace(Arc::clone(&user));
        if let Some(previous) = previous {
            info!(username = %previous.username(), "session: replaced previous user");
        }
        user
    }

    pub async fn detach_user(&self) -> Option<Arc<UserSession>> {
        let previous = self.user.write().await.take();
        if let Some(user) = &previous {
            info!(username = %user.username(), "session: logged out");
        }
        previous
    }

    /// Whether `user` is still the attached session. Results of calls that
    /// started under an older session must not touch the views.
    pub async fn is_current_user(&self, user: &Arc<UserSession>) -> bool {
        self.user
            .read()
            .await
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, user))
    }
}

#[cfg(test)]
#[path = "tests/session_tests.rs"]
mod tests;
