//! Story markup and the list containers the three views are drawn into.
//!
//! Nothing here talks to the network. Containers are write-only targets for
//! the coordinator; business decisions never read them back.

use std::{collections::HashSet, fmt::Write as _};

use shared::domain::{ListKind, StarState, StoryId};
use tracing::debug;
use url::Url;

use crate::{story::Story, user::UserSession};

/// Who is looking at a view, and which stories they have favorited.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ViewerContext {
    #[default]
    Anonymous,
    Authenticated { favorites: HashSet<StoryId> },
}

impl ViewerContext {
    pub fn authenticated(favorites: HashSet<StoryId>) -> Self {
        Self::Authenticated { favorites }
    }

    pub async fn for_user(user: Option<&UserSession>) -> Self {
        match user {
            Some(user) => Self::authenticated(user.favorites().favorite_ids().await),
            None => Self::Anonymous,
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Star to draw next to a story, or `None` when no star is shown at all.
    pub fn star_for(&self, story_id: &StoryId) -> Option<StarState> {
        match self {
            Self::Anonymous => None,
            Self::Authenticated { favorites } => {
                Some(StarState::from_favorite(favorites.contains(story_id)))
            }
        }
    }
}

/// Network authority of `url` for display. Malformed input degrades to a
/// best-effort slice instead of failing.
pub fn host_name(url: &str) -> String {
    if let Ok(parsed) = Url::parse(url.trim()) {
        if let Some(host) = parsed.host_str() {
            return match parsed.port() {
                Some(port) => format!("{host}:{port}"),
                None => host.to_string(),
            };
        }
    }

    let rest = url.trim();
    let rest = rest.split_once("://").map_or(rest, |(_, after)| after);
    let authority = rest.split(['/', '?', '#']).next().unwrap_or_default();
    authority
        .rsplit_once('@')
        .map_or(authority, |(_, host)| host)
        .to_string()
}

pub fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Rendered form of one story list item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryMarkup {
    story_id: StoryId,
    title: String,
    url: String,
    author: String,
    username: String,
    host_name: String,
    star: Option<StarState>,
    delete_control: bool,
}

impl StoryMarkup {
    pub fn story_id(&self) -> &StoryId {
        &self.story_id
    }

    pub fn star(&self) -> Option<StarState> {
        self.star
    }

    pub fn has_delete_control(&self) -> bool {
        self.delete_control
    }

    pub fn host_name(&self) -> &str {
        &self.host_name
    }

    pub fn html(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "<li id=\"{}\">", escape_html(self.story_id.as_str()));
        if self.delete_control {
            out.push_str("  <span class=\"trash-can\"><i class=\"fas fa-trash-alt\"></i></span>\n");
        }
        if let Some(star) = self.star {
            let _ = writeln!(
                out,
                "  <span class=\"star\"><i class=\"{} fa-star\"></i></span>",
                star.css_class()
            );
        }
        let _ = writeln!(
            out,
            "  <a href=\"{}\" target=\"a_blank\" class=\"story-link\">{}</a>",
            escape_html(&self.url),
            escape_html(&self.title)
        );
        let _ = writeln!(
            out,
            "  <small class=\"story-hostname\">({})</small>",
            escape_html(&self.host_name)
        );
        let _ = writeln!(
            out,
            "  <small class=\"story-author\">by {}</small>",
            escape_html(&self.author)
        );
        let _ = writeln!(
            out,
            "  <small class=\"story-user\">posted by {}</small>",
            escape_html(&self.username)
        );
        out.push_str("</li>\n");
        out
    }
}

pub fn story_markup(
    story: &Story,
    viewer: &ViewerContext,
    show_delete_control: bool,
) -> StoryMarkup {
    StoryMarkup {
        story_id: story.id().clone(),
        title: story.title().to_string(),
        url: story.url().to_string(),
        author: story.author().to_string(),
        username: story.username().to_string(),
        host_name: story.host_name(),
        star: viewer.star_for(story.id()),
        delete_control: show_delete_control,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ListNode {
    Story(StoryMarkup),
    Placeholder(String),
}

/// One of the three story list containers on the page.
#[derive(Debug, Clone)]
pub struct ListContainer {
    kind: ListKind,
    nodes: Vec<ListNode>,
    visible: bool,
}

impl ListContainer {
    pub fn new(kind: ListKind) -> Self {
        Self {
            kind,
            nodes: Vec::new(),
            visible: false,
        }
    }

    pub fn kind(&self) -> ListKind {
        self.kind
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn hide(&mut self) {
        self.visible = false;
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
    }

    pub fn nodes(&self) -> &[ListNode] {
        &self.nodes
    }

    pub fn items(&self) -> impl Iterator<Item = &StoryMarkup> {
        self.nodes.iter().filter_map(|node| match node {
            ListNode::Story(markup) => Some(markup),
            ListNode::Placeholder(_) => None,
        })
    }

    pub fn item(&self, story_id: &StoryId) -> Option<&StoryMarkup> {
        self.items().find(|markup| markup.story_id() == story_id)
    }

    pub fn contains(&self, story_id: &StoryId) -> bool {
        self.item(story_id).is_some()
    }

    pub fn placeholder(&self) -> Option<&str> {
        self.nodes.iter().find_map(|node| match node {
            ListNode::Placeholder(text) => Some(text.as_str()),
            ListNode::Story(_) => None,
        })
    }

    /// Replaces the container's content with `stories` in order and reveals it.
    pub fn render_list(
        &mut self,
        stories: &[Story],
        viewer: &ViewerContext,
        show_delete_control: bool,
    ) {
        debug!(view = %self.kind, count = stories.len(), "render: list");
        self.nodes.clear();

        if stories.is_empty() {
            if let Some(text) = self.kind.empty_placeholder() {
                self.nodes.push(ListNode::Placeholder(text.to_string()));
            }
        } else {
            self.nodes.extend(
                stories
                    .iter()
                    .map(|story| ListNode::Story(story_markup(story, viewer, show_delete_control))),
            );
        }

        self.visible = true;
    }

    /// Puts a freshly created story at the top without touching the rest.
    pub fn prepend(&mut self, markup: StoryMarkup) {
        self.nodes.retain(|node| match node {
            ListNode::Story(existing) => existing.story_id != markup.story_id,
            ListNode::Placeholder(_) => false,
        });
        self.nodes.insert(0, ListNode::Story(markup));
    }

    /// Flips the star of one rendered item in place. Returns `false` when the
    /// item is no longer in this container or carries no star.
    pub fn patch_star(&mut self, story_id: &StoryId, star: StarState) -> bool {
        for node in &mut self.nodes {
            if let ListNode::Story(markup) = node {
                if &markup.story_id == story_id {
                    if markup.star.is_none() {
                        return false;
                    }
                    markup.star = Some(star);
                    return true;
                }
            }
        }
        false
    }

    pub fn html(&self) -> String {
        let mut out = format!("<ol id=\"{}\"", self.kind.dom_id());
        if !self.visible {
            out.push_str(" hidden");
        }
        out.push_str(">\n");
        for node in &self.nodes {
            match node {
                ListNode::Story(markup) => out.push_str(&markup.html()),
                ListNode::Placeholder(text) => {
                    let _ = writeln!(out, "<h5>{}</h5>", escape_html(text));
                }
            }
        }
        out.push_str("</ol>\n");
        out
    }
}

#[cfg(test)]
#[path = "tests/render_tests.rs"]
mod tests;
