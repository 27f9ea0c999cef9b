use serde::{Deserialize, Serialize};
use std::fmt::Display;

pub mod identity;
pub mod movie;
pub mod record;

pub use identity::{Identity, IdentityId};
pub use movie::{Genre, MovieDetails, MovieEntry, MoviePage, MovieSummary};
pub use record::{FieldUpdate, ListKind, ListStats, Record};

/// Catalog id of a movie
pub type MovieId = u64;

/// Curated catalog listings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    Popular,
    TopRated,
    Upcoming,
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = match self {
            Category::Popular => "popular",
            Category::TopRated => "top_rated",
            Category::Upcoming => "upcoming",
        };
        write!(f, "{}", path)
    }
}

// ============================================================================
// TMDB API Types
// ============================================================================

/// Movie as returned by TMDB list, search and discover endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovie {
    pub id: MovieId,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub poster_path: Option<String>,
    #[serde(default)]
    pub backdrop_path: Option<String>,
    #[serde(default)]
    pub overview: Option<String>,
    #[serde(default)]
    pub release_date: Option<String>,
    #[serde(default)]
    pub vote_average: Option<f64>,
}

/// TMDB returns "" rather than null for unknown text fields
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

impl From<TmdbMovie> for MovieSummary {
    fn from(movie: TmdbMovie) -> Self {
        MovieSummary {
            id: movie.id,
            title: movie.title,
            poster_ref: non_empty(movie.poster_path),
            overview: non_empty(movie.overview),
            release_date: non_empty(movie.release_date),
            rating: movie.vote_average,
        }
    }
}

/// Paginated TMDB response
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbPage {
    #[serde(default = "first_page")]
    pub page: u32,
    #[serde(default)]
    pub results: Vec<TmdbMovie>,
    #[serde(default)]
    pub total_pages: u32,
    #[serde(default)]
    pub total_results: u32,
}

fn first_page() -> u32 {
    1
}

impl From<TmdbPage> for MoviePage {
    fn from(page: TmdbPage) -> Self {
        MoviePage {
            page: page.page,
            results: page.results.into_iter().map(MovieSummary::from).collect(),
            total_pages: page.total_pages,
            total_results: page.total_results,
        }
    }
}

/// TMDB GET /genre/movie/list
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbGenreList {
    pub genres: Vec<Genre>,
}

/// TMDB GET /movie/{id} with videos, credits and similar appended
#[derive(Debug, Clone, Deserialize)]
pub struct TmdbMovieDetails {
    #[serde(flatten)]
    pub movie: TmdbMovie,
    #[serde(default)]
    pub tagline: Option<String>,
    #[serde(default)]
    pub runtime: Option<u32>,
    #[serde(default)]
    pub genres: Vec<Genre>,
    #[serde(default)]
    pub videos: Option<TmdbVideos>,
    #[serde(default)]
    pub credits: Option<TmdbCredits>,
    #[serde(default)]
    pub similar: Option<TmdbPage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideos {
    #[serde(default)]
    pub results: Vec<TmdbVideo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbVideo {
    pub key: String,
    #[serde(default)]
    pub site: String,
    #[serde(rename = "type", default)]
    pub video_type: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCredits {
    #[serde(default)]
    pub cast: Vec<TmdbCastMember>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TmdbCastMember {
    pub name: String,
}
