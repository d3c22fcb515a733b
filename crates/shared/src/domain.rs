use std::fmt;

use serde::{Deserialize, Serialize};

macro_rules! string_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_newtype!(StoryId);
string_newtype!(Username);

/// Visual state of a story's favorite toggle. Exactly one of the two icon
/// classes is present on a rendered star.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StarState {
    Favorited,
    NotFavorited,
}

impl StarState {
    pub fn from_favorite(is_favorite: bool) -> Self {
        if is_favorite {
            Self::Favorited
        } else {
            Self::NotFavorited
        }
    }

    pub fn css_class(self) -> &'static str {
        match self {
            Self::Favorited => "fas",
            Self::NotFavorited => "far",
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            Self::Favorited => Self::NotFavorited,
            Self::NotFavorited => Self::Favorited,
        }
    }

    pub fn is_favorited(self) -> bool {
        self == Self::Favorited
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    AllStories,
    OwnStories,
    Favorites,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [Self::AllStories, Self::OwnStories, Self::Favorites];

    pub fn dom_id(self) -> &'static str {
        match self {
            Self::AllStories => "all-stories-list",
            Self::OwnStories => "my-stories",
            Self::Favorites => "favorited-stories",
        }
    }

    /// Message shown when the view has nothing to list. The global list has
    /// none since the server is expected to be non-empty.
    pub fn empty_placeholder(self) -> Option<&'static str> {
        match self {
            Self::AllStories => None,
            Self::OwnStories => Some("No stories added by user yet!"),
            Self::Favorites => Some("No favorites added!"),
        }
    }

    /// Only the own-stories view carries delete controls.
    pub fn shows_delete_control(self) -> bool {
        self == Self::OwnStories
    }
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dom_id())
    }
}
