//! Mediates user actions against the story service and keeps the three views
//! in step with the local collections.
//!
//! Local state only changes after the remote call resolves. At most one
//! action per story identifier is in flight, and at most one submit.

use std::{collections::HashSet, fmt, future::Future, sync::Arc};

use shared::{
    domain::{ListKind, StarState, StoryId, Username},
    error::ErrorCode,
    protocol::NewStory,
};
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, warn};

use crate::{
    error::{Result, StoryError},
    render::{story_markup, ListContainer, ViewerContext},
    session::SessionContext,
    story::Story,
    transport::StoryService,
    user::UserSession,
};

const EVENT_CAPACITY: usize = 256;

/// Which control inside a rendered story item was activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryControl {
    DeleteButton,
    FavoriteStar,
}

/// A click on a story control, already resolved to the story it belongs to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlClick {
    pub container: ListKind,
    pub control: StoryControl,
    pub story_id: StoryId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryAction {
    Submit(NewStory),
    Delete(StoryId),
    ToggleFavorite(StoryId),
}

impl StoryAction {
    /// Delete buttons are only honoured inside the own-stories view; stars in
    /// every view.
    pub fn from_click(click: ControlClick) -> Option<Self> {
        match click.control {
            StoryControl::DeleteButton if click.container.shows_delete_control() => {
                Some(Self::Delete(click.story_id))
            }
            StoryControl::DeleteButton => None,
            StoryControl::FavoriteStar => Some(Self::ToggleFavorite(click.story_id)),
        }
    }

    pub fn kind(&self) -> ActionKind {
        match self {
            Self::Submit(_) => ActionKind::Submit,
            Self::Delete(_) => ActionKind::Delete,
            Self::ToggleFavorite(_) => ActionKind::ToggleFavorite,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActionKind {
    LoadStories,
    Login,
    Submit,
    Delete,
    ToggleFavorite,
    ShowView,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::LoadStories => "load_stories",
            Self::Login => "login",
            Self::Submit => "submit_story",
            Self::Delete => "delete_story",
            Self::ToggleFavorite => "toggle_favorite",
            Self::ShowView => "show_view",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionOutcome {
    Submitted(Story),
    Deleted(StoryId),
    FavoriteToggled { story_id: StoryId, star: StarState },
    Ignored,
}

#[derive(Debug, Clone)]
pub enum CoordinatorEvent {
    StoriesLoaded {
        count: usize,
    },
    SessionChanged {
        username: Option<Username>,
    },
    StorySubmitted {
        story_id: StoryId,
    },
    StoryDeleted {
        story_id: StoryId,
    },
    FavoriteToggled {
        story_id: StoryId,
        star: StarState,
    },
    ActionFailed {
        action: ActionKind,
        story_id: Option<StoryId>,
        code: ErrorCode,
        message: String,
    },
}

/// The three list containers on the page.
#[derive(Debug, Clone)]
pub struct StoryViews {
    all: ListContainer,
    own: ListContainer,
    favorites: ListContainer,
}

impl Default for StoryViews {
    fn default() -> Self {
        Self {
            all: ListContainer::new(ListKind::AllStories),
            own: ListContainer::new(ListKind::OwnStories),
            favorites: ListContainer::new(ListKind::Favorites),
        }
    }
}

impl StoryViews {
    pub fn get(&self, kind: ListKind) -> &ListContainer {
        match kind {
            ListKind::AllStories => &self.all,
            ListKind::OwnStories => &self.own,
            ListKind::Favorites => &self.favorites,
        }
    }

    pub fn get_mut(&mut self, kind: ListKind) -> &mut ListContainer {
        match kind {
            ListKind::AllStories => &mut self.all,
            ListKind::OwnStories => &mut self.own,
            ListKind::Favorites => &mut self.favorites,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum InflightKey {
    Submit,
    Story(StoryId),
}

impl InflightKey {
    fn story_id(&self) -> Option<&StoryId> {
        match self {
            Self::Submit => None,
            Self::Story(id) => Some(id),
        }
    }
}

impl fmt::Display for InflightKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Submit => f.write_str("story submission"),
            Self::Story(id) => write!(f, "an action on story {id}"),
        }
    }
}

pub struct MutationCoordinator {
    session: SessionContext,
    views: Mutex<StoryViews>,
    inflight: Mutex<HashSet<InflightKey>>,
    events: broadcast::Sender<CoordinatorEvent>,
}

impl MutationCoordinator {
    pub fn new(service: Arc<dyn StoryService>) -> Arc<Self> {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Arc::new(Self {
            session: SessionContext::new(service),
            views: Mutex::new(StoryViews::default()),
            inflight: Mutex::new(HashSet::new()),
            events,
        })
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<CoordinatorEvent> {
        self.events.subscribe()
    }

    /// Page load: fetch the global list and draw the all-stories view.
    pub async fn start(&self) -> Result<()> {
        let collection = match self.session.init().await {
            Ok(collection) => collection,
            Err(err) => {
                self.report_failure(ActionKind::LoadStories, None, &err);
                return Err(err);
            }
        };
        let count = collection.len().await;
        self.show_all_stories().await;
        let _ = self.events.send(CoordinatorEvent::StoriesLoaded { count });
        Ok(())
    }

    /// Re-fetches the global list, then redraws the all-stories view.
    pub async fn refresh_stories(&self) -> Result<()> {
        let collection = self.session.stories().await;
        if let Err(err) = collection.refresh().await {
            self.report_failure(ActionKind::LoadStories, None, &err);
            return Err(err);
        }
        let count = collection.len().await;
        self.show_all_stories().await;
        let _ = self.events.send(CoordinatorEvent::StoriesLoaded { count });
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<()> {
        let result = UserSession::login(self.session.service(), username, password).await;
        self.finish_login(result).await
    }

    pub async fn signup(&self, username: &str, password: &str, name: &str) -> Result<()> {
        let result = UserSession::signup(self.session.service(), username, password, name).await;
        self.finish_login(result).await
    }

    pub async fn restore(&self, username: Username, token: String) -> Result<()> {
        let result = UserSession::restore(self.session.service(), username, token).await;
        self.finish_login(result).await
    }

    async fn finish_login(&self, result: Result<UserSession>) -> Result<()> {
        let user = match result {
            Ok(user) => user,
            Err(err) => {
                self.report_failure(ActionKind::Login, None, &err);
                return Err(err);
            }
        };
        let user = self.session.attach_user(user).await;
        self.show_all_stories().await;
        let _ = self.events.send(CoordinatorEvent::SessionChanged {
            username: Some(user.username().clone()),
        });
        Ok(())
    }

    /// Drops the user session and every view that depended on it.
    pub async fn logout(&self) {
        if self.session.detach_user().await.is_none() {
            return;
        }
        {
            let mut views = self.views.lock().await;
            for kind in [ListKind::OwnStories, ListKind::Favorites] {
                let container = views.get_mut(kind);
                container.clear();
                container.hide();
            }
        }
        self.show_all_stories().await;
        let _ = self
            .events
            .send(CoordinatorEvent::SessionChanged { username: None });
    }

    pub async fn dispatch(&self, action: StoryAction) -> Result<ActionOutcome> {
        debug!(action = %action.kind(), "coordinator: dispatch");
        match action {
            StoryAction::Submit(new_story) => {
                self.submit_story(new_story).await.map(ActionOutcome::Submitted)
            }
            StoryAction::Delete(story_id) => {
                self.delete_story(&story_id).await?;
                Ok(ActionOutcome::Deleted(story_id))
            }
            StoryAction::ToggleFavorite(story_id) => {
                let star = self.toggle_favorite(&story_id).await?;
                Ok(ActionOutcome::FavoriteToggled { story_id, star })
            }
        }
    }

    pub async fn handle_click(&self, click: ControlClick) -> Result<ActionOutcome> {
        match StoryAction::from_click(click) {
            Some(action) => self.dispatch(action).await,
            None => Ok(ActionOutcome::Ignored),
        }
    }

    pub async fn submit_story(&self, new_story: NewStory) -> Result<Story> {
        let user = self.require_user(ActionKind::Submit, None).await?;
        let stories = self.session.stories().await;

        let story = self
            .run_exclusive(InflightKey::Submit, ActionKind::Submit, async {
                stories.add(&user, new_story).await
            })
            .await?;
        user.favorites().push_own_story(story.clone()).await;

        if self.session.is_current_user(&user).await {
            let viewer = ViewerContext::for_user(Some(&*user)).await;
            let own_stories = user.favorites().own_stories().await;
            let mut views = self.views.lock().await;
            views.all.prepend(story_markup(&story, &viewer, false));
            if views.own.is_visible() {
                views.own.render_list(&own_stories, &viewer, true);
            }
        }

        let _ = self.events.send(CoordinatorEvent::StorySubmitted {
            story_id: story.id().clone(),
        });
        Ok(story)
    }

    pub async fn delete_story(&self, story_id: &StoryId) -> Result<()> {
        let user = self
            .require_user(ActionKind::Delete, Some(story_id))
            .await?;
        let stories = self.session.stories().await;

        self.run_exclusive(
            InflightKey::Story(story_id.clone()),
            ActionKind::Delete,
            async { stories.remove(&user, story_id).await },
        )
        .await?;

        user.favorites().remove_own_story(story_id).await;
        user.favorites().forget_favorite(story_id).await;

        if self.session.is_current_user(&user).await {
            // All-stories keeps showing the item until its next full render.
            let viewer = ViewerContext::for_user(Some(&*user)).await;
            let own_stories = user.favorites().own_stories().await;
            self.views
                .lock()
                .await
                .own
                .render_list(&own_stories, &viewer, true);
        }

        let _ = self.events.send(CoordinatorEvent::StoryDeleted {
            story_id: story_id.clone(),
        });
        Ok(())
    }

    /// Flips the favorite state of a story. The current state comes from the
    /// user's favorites, never from the rendered icon.
    pub async fn toggle_favorite(&self, story_id: &StoryId) -> Result<StarState> {
        let user = self
            .require_user(ActionKind::ToggleFavorite, Some(story_id))
            .await?;
        let stories = self.session.stories().await;

        let star = self
            .run_exclusive(
                InflightKey::Story(story_id.clone()),
                ActionKind::ToggleFavorite,
                async {
                    let story = stories
                        .find(story_id)
                        .await
                        .ok_or_else(|| StoryError::NotFound(story_id.clone()))?;
                    let favorites = user.favorites();
                    let current = StarState::from_favorite(favorites.is_favorite(story_id).await);
                    if current.is_favorited() {
                        favorites.remove_favorite(user.credentials(), &story).await?;
                    } else {
                        favorites.add_favorite(user.credentials(), &story).await?;
                    }
                    Ok(current.toggled())
                },
            )
            .await?;

        if self.session.is_current_user(&user).await {
            let mut views = self.views.lock().await;
            for kind in ListKind::ALL {
                if !views.get_mut(kind).patch_star(story_id, star) {
                    debug!(story_id = %story_id, view = %kind, "render: star patch skipped");
                }
            }
        }

        let _ = self.events.send(CoordinatorEvent::FavoriteToggled {
            story_id: story_id.clone(),
            star,
        });
        Ok(star)
    }

    pub async fn show_all_stories(&self) {
        let user = self.session.user().await;
        let viewer = ViewerContext::for_user(user.as_deref()).await;
        let stories = self.session.stories().await.snapshot().await;
        self.views
            .lock()
            .await
            .all
            .render_list(&stories, &viewer, false);
    }

    pub async fn show_own_stories(&self) -> Result<()> {
        let user = self.require_user(ActionKind::ShowView, None).await?;
        let viewer = ViewerContext::for_user(Some(&*user)).await;
        let own_stories = user.favorites().own_stories().await;
        self.views
            .lock()
            .await
            .own
            .render_list(&own_stories, &viewer, true);
        Ok(())
    }

    pub async fn show_favorites(&self) -> Result<()> {
        let user = self.require_user(ActionKind::ShowView, None).await?;
        let viewer = ViewerContext::for_user(Some(&*user)).await;
        let favorites = user.favorites().favorites().await;
        self.views
            .lock()
            .await
            .favorites
            .render_list(&favorites, &viewer, false);
        Ok(())
    }

    pub async fn view(&self, kind: ListKind) -> ListContainer {
        self.views.lock().await.get(kind).clone()
    }

    pub async fn render(&self, kind: ListKind) -> String {
        self.views.lock().await.get(kind).html()
    }

    async fn require_user(
        &self,
        action: ActionKind,
        story_id: Option<&StoryId>,
    ) -> Result<Arc<UserSession>> {
        match self.session.require_user().await {
            Ok(user) => Ok(user),
            Err(err) => {
                self.report_failure(action, story_id, &err);
                Err(err)
            }
        }
    }

    /// Runs `work` while holding `key`. A second request for the same key is
    /// rejected until the first one resolves.
    async fn run_exclusive<T, F>(
        &self,
        key: InflightKey,
        action: ActionKind,
        work: F,
    ) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        {
            let mut inflight = self.inflight.lock().await;
            if !inflight.insert(key.clone()) {
                info!(action = %action, key = %key, "coordinator: duplicate request rejected");
                return Err(StoryError::InFlight(key.to_string()));
            }
        }

        let result = work.await;

        self.inflight.lock().await.remove(&key);

        if let Err(err) = &result {
            self.report_failure(action, key.story_id(), err);
        }
        result
    }

    fn report_failure(&self, action: ActionKind, story_id: Option<&StoryId>, err: &StoryError) {
        warn!(
            action = %action,
            story_id = story_id.map(StoryId::as_str),
            code = ?err.code(),
            "coordinator: action failed: {err}"
        );
        let _ = self.events.send(CoordinatorEvent::ActionFailed {
            action,
            story_id: story_id.cloned(),
            code: err.code(),
            message: err.to_string(),
        });
    }
}

#[cfg(test)]
#[path = "tests/coordinator_tests.rs"]
mod tests;
