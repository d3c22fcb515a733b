//! Client-side story engine: the global story list, the viewer's favorites
//! and own stories, their rendered views, and the coordinator that keeps all
//! three consistent as remote mutations complete.

pub mod coordinator;
pub mod error;
pub mod render;
pub mod session;
pub mod story;
pub mod transport;
pub mod user;

pub use coordinator::{
    ActionKind, ActionOutcome, ControlClick, CoordinatorEvent, MutationCoordinator, StoryAction,
    StoryControl, StoryViews,
};
pub use error::{Result, StoryError};
pub use render::{host_name, story_markup, ListContainer, ListNode, StoryMarkup, ViewerContext};
pub use session::SessionContext;
pub use story::{Story, StoryCollection};
pub use transport::{HttpStoryService, MissingStoryService, StoryService, DEFAULT_SERVER_URL};
pub use user::{SessionCredentials, UserFavoritesState, UserSession};

#[cfg(test)]
#[path = "tests/support.rs"]
pub(crate) mod test_support;
