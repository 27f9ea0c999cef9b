//! TMDB catalog provider
//!
//! API Flow:
//! 1. Listings: /movie/{popular|top_rated|upcoming}?page=
//! 2. Search: /search/movie?query=&page=&include_adult=false
//! 3. Discover: /discover/movie sorted by popularity, optionally by genre
//! 4. Details: /movie/{id}?append_to_response=videos,credits,similar
//! 5. Genres: /genre/movie/list
use reqwest::{Client as HttpClient, StatusCode};
use serde::de::DeserializeOwned;

use crate::{
    cached,
    db::{Cache, CacheKey},
    error::{AppError, AppResult},
    models::{
        Category, Genre, MovieDetails, MovieId, MoviePage, MovieSummary, TmdbGenreList,
        TmdbMovieDetails, TmdbPage,
    },
    services::catalog::CatalogClient,
};

const GENRE_CACHE_TTL: u64 = 86400; // 1 day
const IMAGE_BASE_URL: &str = "https://image.tmdb.org/t/p";
const PLACEHOLDER_POSTER: &str = "/placeholder-movie.jpg";
const PLACEHOLDER_BACKDROP: &str = "/placeholder-backdrop.jpg";
const MAX_CAST: usize = 10;

/// Full poster URL for a TMDB image path, placeholder when there is none
pub fn poster_url(path: Option<&str>, size: &str) -> String {
    image_url(path, size, PLACEHOLDER_POSTER)
}

/// Full backdrop URL for a TMDB image path, placeholder when there is none
pub fn backdrop_url(path: Option<&str>, size: &str) -> String {
    image_url(path, size, PLACEHOLDER_BACKDROP)
}

fn image_url(path: Option<&str>, size: &str, placeholder: &str) -> String {
    match path.filter(|p| !p.is_empty()) {
        Some(path) => format!("{}/{}{}", IMAGE_BASE_URL, size, path),
        None => placeholder.to_string(),
    }
}

#[derive(Clone)]
pub struct TmdbCatalog {
    http_client: HttpClient,
    api_key: String,
    api_url: String,
    cache: Cache,
    cache_ttl: u64,
}

impl TmdbCatalog {
    pub fn new(cache: Cache, api_key: String, api_url: String, cache_ttl: u64) -> Self {
        Self {
            http_client: HttpClient::new(),
            api_key,
            api_url: api_url.trim_end_matches('/').to_string(),
            cache,
            cache_ttl,
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.api_url, path)
    }

    /// GET an endpoint with the API key attached and decode the JSON body
    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> AppResult<T> {
        let response = self
            .http_client
            .get(self.endpoint(path))
            .query(&[("api_key", self.api_key.as_str())])
            .query(params)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, path, &body));
        }

        let response_text = response.text().await?;
        serde_json::from_str(&response_text).map_err(|e| {
            tracing::error!(
                error = %e,
                path = %path,
                "Failed to deserialize TMDB response"
            );
            AppError::CatalogUnavailable(format!("Failed to parse TMDB response: {}", e))
        })
    }

    async fn get_page(&self, path: &str, params: &[(&str, String)]) -> AppResult<MoviePage> {
        let page: TmdbPage = self.get_json(path, params).await?;
        Ok(MoviePage::from(page))
    }
}

/// Maps a non-success TMDB status to the error callers see
///
/// A 404 means the requested resource does not exist; anything else is
/// treated as the catalog being unavailable.
fn status_error(status: StatusCode, path: &str, body: &str) -> AppError {
    if status == StatusCode::NOT_FOUND {
        return AppError::NotFound(format!("TMDB has no resource at {}", path));
    }

    AppError::CatalogUnavailable(format!("TMDB API returned status {}: {}", status, body))
}

fn into_details(details: TmdbMovieDetails) -> MovieDetails {
    let poster = poster_url(details.movie.poster_path.as_deref(), "w500");
    let backdrop = backdrop_url(details.movie.backdrop_path.as_deref(), "w1280");

    let trailer_keys = details
        .videos
        .map(|videos| {
            videos
                .results
                .into_iter()
                .filter(|v| v.site == "YouTube" && v.video_type == "Trailer")
                .map(|v| v.key)
                .collect()
        })
        .unwrap_or_default();

    let cast = details
        .credits
        .map(|credits| {
            credits
                .cast
                .into_iter()
                .take(MAX_CAST)
                .map(|member| member.name)
                .collect()
        })
        .unwrap_or_default();

    let similar = details
        .similar
        .map(|page| MoviePage::from(page).results)
        .unwrap_or_default();

    MovieDetails {
        summary: MovieSummary::from(details.movie),
        poster_url: poster,
        backdrop_url: backdrop,
        tagline: details.tagline.filter(|t| !t.is_empty()),
        runtime: details.runtime,
        genres: details.genres,
        cast,
        trailer_keys,
        similar,
    }
}

#[async_trait::async_trait]
impl CatalogClient for TmdbCatalog {
    async fn fetch_by_category(&self, category: Category, page: u32) -> AppResult<MoviePage> {
        cached!(
            self.cache,
            CacheKey::CategoryPage(category, page),
            self.cache_ttl,
            async move {
                let movies = self
                    .get_page(
                        &format!("/movie/{}", category),
                        &[("page", page.to_string())],
                    )
                    .await?;

                tracing::info!(
                    category = %category,
                    page = page,
                    results = movies.results.len(),
                    provider = "tmdb",
                    "Category page fetched"
                );

                Ok::<_, AppError>(movies)
            }
        )
    }

    async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage> {
        let query = query.trim();
        if query.is_empty() {
            return Ok(MoviePage::empty(page));
        }

        cached!(
            self.cache,
            CacheKey::Search(query.to_string(), page),
            self.cache_ttl,
            async move {
                let movies = self
                    .get_page(
                        "/search/movie",
                        &[
                            ("query", query.to_string()),
                            ("page", page.to_string()),
                            ("include_adult", "false".to_string()),
                        ],
                    )
                    .await?;

                tracing::info!(
                    query = %query,
                    page = page,
                    results = movies.results.len(),
                    provider = "tmdb",
                    "Movie search completed"
                );

                Ok::<_, AppError>(movies)
            }
        )
    }

    async fn discover(&self, genre: Option<u32>, page: u32) -> AppResult<MoviePage> {
        cached!(
            self.cache,
            CacheKey::Discover(genre, page),
            self.cache_ttl,
            async move {
                let mut params = vec![
                    ("sort_by", "popularity.desc".to_string()),
                    ("include_adult", "false".to_string()),
                    ("include_video", "false".to_string()),
                    ("page", page.to_string()),
                ];
                if let Some(genre) = genre {
                    params.push(("with_genres", genre.to_string()));
                }

                self.get_page("/discover/movie", &params).await
            }
        )
    }

    async fn movie_details(&self, movie_id: MovieId) -> AppResult<MovieDetails> {
        cached!(
            self.cache,
            CacheKey::Details(movie_id),
            self.cache_ttl,
            async move {
                let details: TmdbMovieDetails = self
                    .get_json(
                        &format!("/movie/{}", movie_id),
                        &[(
                            "append_to_response",
                            "videos,credits,similar".to_string(),
                        )],
                    )
                    .await?;

                Ok::<_, AppError>(into_details(details))
            }
        )
    }

    async fn genres(&self) -> AppResult<Vec<Genre>> {
        cached!(self.cache, CacheKey::Genres, GENRE_CACHE_TTL, async move {
            let list: TmdbGenreList = self.get_json("/genre/movie/list", &[]).await?;
            Ok::<_, AppError>(list.genres)
        })
    }

    fn name(&self) -> &'static str {
        "tmdb"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{TmdbCastMember, TmdbCredits, TmdbMovie, TmdbVideo, TmdbVideos};

    fn create_test_catalog() -> TmdbCatalog {
        let (cache, _handle) = Cache::new(redis::Client::open("redis://localhost:6379").unwrap());
        TmdbCatalog::new(
            cache,
            "test_key".to_string(),
            "http://test.local/3/".to_string(),
            60,
        )
    }

    #[tokio::test]
    async fn test_endpoint_trims_trailing_slash() {
        let catalog = create_test_catalog();
        assert_eq!(
            catalog.endpoint("/movie/popular"),
            "http://test.local/3/movie/popular"
        );
    }

    #[tokio::test]
    async fn test_blank_search_skips_request() {
        let catalog = create_test_catalog();
        let page = catalog.search("   ", 3).await.unwrap();
        assert_eq!(page, MoviePage::empty(3));
    }

    #[test]
    fn test_poster_url() {
        assert_eq!(
            poster_url(Some("/abc.jpg"), "w500"),
            "https://image.tmdb.org/t/p/w500/abc.jpg"
        );
        assert_eq!(poster_url(None, "w500"), "/placeholder-movie.jpg");
        assert_eq!(poster_url(Some(""), "w500"), "/placeholder-movie.jpg");
    }

    #[test]
    fn test_backdrop_url() {
        assert_eq!(
            backdrop_url(Some("/bg.jpg"), "w1280"),
            "https://image.tmdb.org/t/p/w1280/bg.jpg"
        );
        assert_eq!(backdrop_url(None, "w1280"), "/placeholder-backdrop.jpg");
    }

    #[test]
    fn test_status_error_not_found() {
        let err = status_error(StatusCode::NOT_FOUND, "/movie/999999999", "");
        assert!(matches!(err, AppError::NotFound(ref msg) if msg.contains("/movie/999999999")));
    }

    #[test]
    fn test_status_error_other_statuses_are_unavailable() {
        for status in [
            StatusCode::UNAUTHORIZED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::SERVICE_UNAVAILABLE,
        ] {
            let err = status_error(status, "/movie/popular", "slow down");
            assert!(matches!(err, AppError::CatalogUnavailable(ref msg) if msg.contains("slow down")));
        }
    }

    #[test]
    fn test_into_details_keeps_youtube_trailers_only() {
        let details = TmdbMovieDetails {
            movie: TmdbMovie {
                id: 27205,
                title: "Inception".to_string(),
                poster_path: Some("/p.jpg".to_string()),
                backdrop_path: None,
                overview: Some("Dreams".to_string()),
                release_date: Some("2010-07-15".to_string()),
                vote_average: Some(8.4),
            },
            tagline: Some(String::new()),
            runtime: Some(148),
            genres: vec![Genre {
                id: 28,
                name: "Action".to_string(),
            }],
            videos: Some(TmdbVideos {
                results: vec![
                    TmdbVideo {
                        key: "trailer".to_string(),
                        site: "YouTube".to_string(),
                        video_type: "Trailer".to_string(),
                    },
                    TmdbVideo {
                        key: "featurette".to_string(),
                        site: "YouTube".to_string(),
                        video_type: "Featurette".to_string(),
                    },
                    TmdbVideo {
                        key: "vimeo".to_string(),
                        site: "Vimeo".to_string(),
                        video_type: "Trailer".to_string(),
                    },
                ],
            }),
            credits: Some(TmdbCredits {
                cast: (0..15)
                    .map(|i| TmdbCastMember {
                        name: format!("Actor {}", i),
                    })
                    .collect(),
            }),
            similar: None,
        };

        let details = into_details(details);
        assert_eq!(details.summary.id, 27205);
        assert_eq!(details.poster_url, "https://image.tmdb.org/t/p/w500/p.jpg");
        assert_eq!(details.backdrop_url, "/placeholder-backdrop.jpg");
        assert_eq!(details.tagline, None);
        assert_eq!(details.trailer_keys, vec!["trailer".to_string()]);
        assert_eq!(details.cast.len(), MAX_CAST);
        assert!(details.similar.is_empty());
    }
}
