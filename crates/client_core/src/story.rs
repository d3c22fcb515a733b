use std::sync::Arc;

use chrono::{DateTime, Utc};
use shared::{
    domain::{StoryId, Username},
    protocol::{NewStory, StoryRecord},
};
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::{
    error::{Result, StoryError},
    render::host_name,
    transport::StoryService,
    user::UserSession,
};

/// One story as known to the client. Never mutated after construction; a
/// newer version from the server replaces it wholesale.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Story {
    id: StoryId,
    title: String,
    author: String,
    url: String,
    username: Username,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
}

impl Story {
    pub fn id(&self) -> &StoryId {
        &self.id
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn username(&self) -> &Username {
        &self.username
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> Option<DateTime<Utc>> {
        self.updated_at
    }

    pub fn host_name(&self) -> String {
        host_name(&self.url)
    }
}

impl From<StoryRecord> for Story {
    fn from(record: StoryRecord) -> Self {
        Self {
            id: record.story_id,
            title: record.title,
            author: record.author,
            url: record.url,
            username: record.username,
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

/// Drops later duplicates so every identifier appears once, keeping server order.
pub(crate) fn dedup_by_id(stories: impl IntoIterator<Item = Story>) -> Vec<Story> {
    let mut out: Vec<Story> = Vec::new();
    for story in stories {
        if !out.iter().any(|existing| existing.id == story.id) {
            out.push(story);
        }
    }
    out
}

/// The global, ordered list of stories for this session.
pub struct StoryCollection {
    service: Arc<dyn StoryService>,
    stories: RwLock<Vec<Story>>,
}

impl StoryCollection {
    pub fn new(service: Arc<dyn StoryService>, stories: Vec<Story>) -> Self {
        Self {
            service,
            stories: RwLock::new(dedup_by_id(stories)),
        }
    }

    pub async fn fetch_all(service: Arc<dyn StoryService>) -> Result<Self> {
        let records = service.list_stories().await?;
        let stories = records.into_iter().map(Story::from).collect::<Vec<_>>();
        info!(count = stories.len(), "stories: loaded collection");
        Ok(Self::new(service, stories))
    }

    /// Re-reads the global list from the server, replacing the local sequence.
    /// On failure the current sequence is kept.
    pub async fn refresh(&self) -> Result<()> {
        let records = self.service.list_stories().await?;
        let stories = dedup_by_id(records.into_iter().map(Story::from));
        *self.stories.write().await = stories;
        Ok(())
    }

    pub async fn add(&self, user: &UserSession, new_story: NewStory) -> Result<Story> {
        new_story.validate()?;
        let record = self
            .service
            .create_story(user.token(), &new_story)
            .await?;
        let story = Story::from(record);

        let mut stories = self.stories.write().await;
        stories.retain(|existing| existing.id != story.id);
        stories.insert(0, story.clone());
        info!(story_id = %story.id, username = %user.username(), "stories: added story");
        Ok(story)
    }

    /// Deletes one of the user's stories. Fails with `NotFound` when the id is
    /// not in the collection. A delete that a concurrent refresh overtook,
    /// dropping the entry while the call was pending, still succeeds.
    pub async fn remove(&self, user: &UserSession, story_id: &StoryId) -> Result<()> {
        if !self.contains(story_id).await {
            return Err(StoryError::NotFound(story_id.clone()));
        }

        match self.service.delete_story(user.token(), story_id).await {
            Ok(()) => {}
            Err(StoryError::NotFound(_)) if !self.contains(story_id).await => {
                debug!(story_id = %story_id, "stories: story already deleted on the server");
                return Ok(());
            }
            Err(err) => return Err(err),
        }

        let mut stories = self.stories.write().await;
        let Some(index) = stories.iter().position(|story| &story.id == story_id) else {
            // The server accepted the delete; a refresh already dropped it locally.
            debug!(story_id = %story_id, "stories: removed story already gone locally");
            return Ok(());
        };
        stories.remove(index);
        info!(story_id = %story_id, username = %user.username(), "stories: removed story");
        Ok(())
    }

    pub async fn find(&self, story_id: &StoryId) -> Option<Story> {
        self.stories
            .read()
            .await
            .iter()
            .find(|story| &story.id == story_id)
            .cloned()
    }

    pub async fn contains(&self, story_id: &StoryId) -> bool {
        self.stories
            .read()
            .await
            .iter()
            .any(|story| &story.id == story_id)
    }

    pub async fn snapshot(&self) -> Vec<Story> {
        self.stories.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.stories.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.stories.read().await.is_empty()
    }
}

#[cfg(test)]
#[path = "tests/story_tests.rs"]
mod tests;
