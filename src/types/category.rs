use std::fmt;

use serde::{Deserialize, Serialize};

/// Audio category. Also used as the tag of system-curated auto playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub enum Category {
    Arts,
    Business,
    Education,
    Entertainment,
    #[serde(rename = "Kids & Family")]
    KidsAndFamily,
    Music,
    Science,
    Tech,
    #[default]
    Others,
}

impl Category {
    pub const ALL: [Category; 9] = [
        Category::Arts,
        Category::Business,
        Category::Education,
        Category::Entertainment,
        Category::KidsAndFamily,
        Category::Music,
        Category::Science,
        Category::Tech,
        Category::Others,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Category::Arts => "Arts",
            Category::Business => "Business",
            Category::Education => "Education",
            Category::Entertainment => "Entertainment",
            Category::KidsAndFamily => "Kids & Family",
            Category::Music => "Music",
            Category::Science => "Science",
            Category::Tech => "Tech",
            Category::Others => "Others",
        }
    }

    pub fn parse(s: &str) -> Option<Category> {
        Self::ALL.into_iter().find(|c| c.as_str() == s.trim())
    }

    /// Parses a comma-separated category list, e.g. `"Music,Tech"`.
    /// Unknown names are kept out of the result; an empty input yields `None`.
    pub fn parse_list(s: &str) -> Option<Vec<Category>> {
        let names: Vec<&str> = s.split(',').map(str::trim).filter(|n| !n.is_empty()).collect();
        if names.is_empty() {
            return None;
        }
        Some(names.into_iter().filter_map(Self::parse).collect())
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Playlist visibility. `Auto` marks system-managed playlists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    #[default]
    Public,
    Private,
    Auto,
}

impl Visibility {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Visibility::Public => "public",
            Visibility::Private => "private",
            Visibility::Auto => "auto",
        }
    }

    pub fn parse(s: &str) -> Option<Visibility> {
        match s {
            "public" => Some(Visibility::Public),
            "private" => Some(Visibility::Private),
            "auto" => Some(Visibility::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for Visibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
