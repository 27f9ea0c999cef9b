use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{ListKind, MovieId};

/// A movie as returned by the catalog
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieSummary {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster_ref: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
}

/// Snapshot of a movie stored in one of the personal lists
///
/// Entries are never edited once written. `added_at` is set for watchlist and
/// favorites entries, `watched_at` for watched entries.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieEntry {
    pub id: MovieId,
    pub title: String,
    #[serde(default)]
    pub poster_ref: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub added_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub watched_at: Option<DateTime<Utc>>,
}

impl MovieEntry {
    /// Copies the catalog fields of `movie` and stamps the list-specific timestamp
    pub fn snapshot(movie: &MovieSummary, list: ListKind, at: DateTime<Utc>) -> Self {
        let (added_at, watched_at) = match list {
            ListKind::Watched => (None, Some(at)),
            ListKind::Watchlist | ListKind::Favorites => (Some(at), None),
        };

        Self {
            id: movie.id,
            title: movie.title.clone(),
            poster_ref: movie.poster_ref.clone(),
            overview: movie.overview.clone(),
            release_date: movie.release_date.clone(),
            rating: movie.rating,
            added_at,
            watched_at,
        }
    }

    /// The catalog fields captured at add time
    pub fn summary(&self) -> MovieSummary {
        MovieSummary {
            id: self.id,
            title: self.title.clone(),
            poster_ref: self.poster_ref.clone(),
            overview: self.overview.clone(),
            release_date: self.release_date.clone(),
            rating: self.rating,
        }
    }
}

/// One page of catalog results
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MoviePage {
    pub page: u32,
    pub results: Vec<MovieSummary>,
    pub total_pages: u32,
    pub total_results: u32,
}

impl MoviePage {
    /// Page with no results, used when the catalog cannot be reached
    pub fn empty(page: u32) -> Self {
        Self {
            page,
            results: Vec::new(),
            total_pages: 0,
            total_results: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Genre {
    pub id: u32,
    pub name: String,
}

/// Full catalog details for a single movie
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MovieDetails {
    #[serde(flatten)]
    pub summary: MovieSummary,
    pub poster_url: String,
    pub backdrop_url: String,
    pub tagline: Option<String>,
    pub runtime: Option<u32>,
    pub genres: Vec<Genre>,
    pub cast: Vec<String>,
    pub trailer_keys: Vec<String>,
    pub similar: Vec<MovieSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inception() -> MovieSummary {
        MovieSummary {
            id: 27205,
            title: "Inception".to_string(),
            poster_ref: Some("/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg".to_string()),
            overview: Some("Cobb, a skilled thief".to_string()),
            release_date: Some("2010-07-15".to_string()),
            rating: Some(8.4),
        }
    }

    #[test]
    fn test_snapshot_watchlist_stamps_added_at() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = MovieEntry::snapshot(&inception(), ListKind::Watchlist, at);

        assert_eq!(entry.added_at, Some(at));
        assert_eq!(entry.watched_at, None);
        assert_eq!(entry.summary(), inception());
    }

    #[test]
    fn test_snapshot_watched_stamps_watched_at() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = MovieEntry::snapshot(&inception(), ListKind::Watched, at);

        assert_eq!(entry.added_at, None);
        assert_eq!(entry.watched_at, Some(at));
    }

    #[test]
    fn test_entry_serializes_camel_case() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let entry = MovieEntry::snapshot(&inception(), ListKind::Favorites, at);
        let json = serde_json::to_value(&entry).unwrap();

        assert_eq!(json["posterRef"], "/oYuLEt3zVCKq57qu2F8dT7NIa6f.jpg");
        assert_eq!(json["releaseDate"], "2010-07-15");
        assert_eq!(json["addedAt"], "2024-03-01T12:00:00Z");
        assert!(json.get("watchedAt").is_none());
    }

    #[test]
    fn test_entry_tolerates_missing_optional_fields() {
        let json = r#"{"id": 7, "title": "Se7en", "watchedAt": "2024-01-02T03:04:05Z"}"#;
        let entry: MovieEntry = serde_json::from_str(json).unwrap();

        assert_eq!(entry.id, 7);
        assert_eq!(entry.poster_ref, None);
        assert!(entry.watched_at.is_some());
    }
}
