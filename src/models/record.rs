use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::{MovieEntry, MovieId};

/// The three personal lists of a Record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListKind {
    Watchlist,
    Favorites,
    Watched,
}

impl ListKind {
    pub const ALL: [ListKind; 3] = [ListKind::Watchlist, ListKind::Favorites, ListKind::Watched];

    /// Field name of this list inside the persisted record
    pub fn field_name(&self) -> &'static str {
        match self {
            ListKind::Watchlist => "watchlist",
            ListKind::Favorites => "favorites",
            ListKind::Watched => "watched",
        }
    }

    pub fn from_field_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.field_name() == name)
    }
}

impl Display for ListKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.field_name())
    }
}

/// Persisted lists of a single identity
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Record {
    #[serde(default)]
    pub watchlist: Vec<MovieEntry>,
    #[serde(default)]
    pub favorites: Vec<MovieEntry>,
    #[serde(default)]
    pub watched: Vec<MovieEntry>,
}

impl Record {
    pub fn list(&self, kind: ListKind) -> &[MovieEntry] {
        match kind {
            ListKind::Watchlist => &self.watchlist,
            ListKind::Favorites => &self.favorites,
            ListKind::Watched => &self.watched,
        }
    }

    fn list_mut(&mut self, kind: ListKind) -> &mut Vec<MovieEntry> {
        match kind {
            ListKind::Watchlist => &mut self.watchlist,
            ListKind::Favorites => &mut self.favorites,
            ListKind::Watched => &mut self.watched,
        }
    }

    pub fn contains(&self, kind: ListKind, movie_id: MovieId) -> bool {
        self.list(kind).iter().any(|entry| entry.id == movie_id)
    }

    /// New value of `kind` with `entry` appended at the end
    pub fn with_appended(&self, kind: ListKind, entry: MovieEntry) -> Vec<MovieEntry> {
        let mut entries = self.list(kind).to_vec();
        entries.push(entry);
        entries
    }

    /// New value of `kind` with every entry for `movie_id` dropped
    pub fn without(&self, kind: ListKind, movie_id: MovieId) -> Vec<MovieEntry> {
        self.list(kind)
            .iter()
            .filter(|entry| entry.id != movie_id)
            .cloned()
            .collect()
    }

    /// Replaces one field wholesale
    pub fn apply(&mut self, update: FieldUpdate) {
        *self.list_mut(update.field) = update.entries;
    }

    pub fn stats(&self) -> ListStats {
        ListStats {
            watchlist_count: self.watchlist.len(),
            favorites_count: self.favorites.len(),
            watched_count: self.watched.len(),
            total_movies: self.watchlist.len() + self.favorites.len() + self.watched.len(),
        }
    }
}

/// Whole-field replacement of one list
#[derive(Debug, Clone, PartialEq)]
pub struct FieldUpdate {
    pub field: ListKind,
    pub entries: Vec<MovieEntry>,
}

impl FieldUpdate {
    pub fn new(field: ListKind, entries: Vec<MovieEntry>) -> Self {
        Self { field, entries }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ListStats {
    pub watchlist_count: usize,
    pub favorites_count: usize,
    pub watched_count: usize,
    pub total_movies: usize,
}
