//! Movie catalog abstraction
//!
//! The catalog is a read-only lookup owned by a third party. Ranking,
//! pagination and freshness are the provider's business; callers only
//! choose what to do when it cannot be reached.
use serde::Serialize;
use tracing::instrument;

use crate::{
    error::{AppError, AppResult},
    models::{Category, Genre, MovieDetails, MovieId, MoviePage},
};

pub mod tmdb;

pub use tmdb::TmdbCatalog;

#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait CatalogClient: Send + Sync {
    /// One page of a curated listing
    async fn fetch_by_category(&self, category: Category, page: u32) -> AppResult<MoviePage>;

    /// One page of free-text search results
    async fn search(&self, query: &str, page: u32) -> AppResult<MoviePage>;

    /// Popular movies, optionally restricted to one genre
    async fn discover(&self, genre: Option<u32>, page: u32) -> AppResult<MoviePage>;

    async fn movie_details(&self, movie_id: MovieId) -> AppResult<MovieDetails>;

    async fn genres(&self) -> AppResult<Vec<Genre>>;

    /// Provider name for logging and debugging
    fn name(&self) -> &'static str;
}

/// Page of results plus the catalog error that emptied it, if any
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CatalogListing {
    #[serde(flatten)]
    pub page: MoviePage,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CatalogListing {
    fn settle(result: AppResult<MoviePage>, page: u32, provider: &str) -> AppResult<Self> {
        match result {
            Ok(page) => Ok(Self { page, error: None }),
            Err(AppError::CatalogUnavailable(reason)) => {
                tracing::warn!(
                    provider = %provider,
                    page = page,
                    error = %reason,
                    "Catalog unavailable, returning empty page"
                );
                Ok(Self {
                    page: MoviePage::empty(page),
                    error: Some(format!("Catalog unavailable: {}", reason)),
                })
            }
            Err(e) => Err(e),
        }
    }
}

/// Browses a category, falling back to an empty page when the catalog is down
#[instrument(skip(catalog), fields(provider = catalog.name()))]
pub async fn browse_or_empty(
    catalog: &dyn CatalogClient,
    category: Category,
    page: u32,
) -> AppResult<CatalogListing> {
    CatalogListing::settle(
        catalog.fetch_by_category(category, page).await,
        page,
        catalog.name(),
    )
}

/// Searches, falling back to an empty page when the catalog is down
#[instrument(skip(catalog), fields(provider = catalog.name()))]
pub async fn search_or_empty(
    catalog: &dyn CatalogClient,
    query: &str,
    page: u32,
) -> AppResult<CatalogListing> {
    CatalogListing::settle(catalog.search(query, page).await, page, catalog.name())
}

/// Discovers, falling back to an empty page when the catalog is down
#[instrument(skip(catalog), fields(provider = catalog.name()))]
pub async fn discover_or_empty(
    catalog: &dyn CatalogClient,
    genre: Option<u32>,
    page: u32,
) -> AppResult<CatalogListing> {
    CatalogListing::settle(catalog.discover(genre, page).await, page, catalog.name())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MovieSummary;
    use tokio_test::{assert_err, assert_ok};

    fn page_of(ids: &[u64]) -> MoviePage {
        MoviePage {
            page: 1,
            results: ids
                .iter()
                .map(|id| MovieSummary {
                    id: *id,
                    title: format!("Movie {}", id),
                    poster_ref: None,
                    overview: None,
                    release_date: None,
                    rating: None,
                })
                .collect(),
            total_pages: 1,
            total_results: ids.len() as u32,
        }
    }

    #[tokio::test]
    async fn test_browse_passes_results_through() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_name().return_const("mock");
        catalog
            .expect_fetch_by_category()
            .withf(|category, page| *category == Category::Popular && *page == 1)
            .returning(|_, _| Ok(page_of(&[1, 2, 3])));

        let listing = assert_ok!(browse_or_empty(&catalog, Category::Popular, 1).await);
        assert_eq!(listing.page.results.len(), 3);
        assert_eq!(listing.error, None);
    }

    #[tokio::test]
    async fn test_browse_falls_back_to_empty_page() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_name().return_const("mock");
        catalog
            .expect_fetch_by_category()
            .returning(|_, _| Err(AppError::CatalogUnavailable("timeout".to_string())));

        let listing = assert_ok!(browse_or_empty(&catalog, Category::Upcoming, 4).await);
        assert_eq!(listing.page, MoviePage::empty(4));
        assert_eq!(
            listing.error,
            Some("Catalog unavailable: timeout".to_string())
        );
    }

    #[tokio::test]
    async fn test_search_other_errors_are_not_swallowed() {
        let mut catalog = MockCatalogClient::new();
        catalog.expect_name().return_const("mock");
        catalog
            .expect_search()
            .returning(|_, _| Err(AppError::InvalidInput("page out of range".to_string())));

        let result = search_or_empty(&catalog, "alien", 999).await;
        let err = assert_err!(result);
        assert!(matches!(err, AppError::InvalidInput(_)));
    }

    #[test]
    fn test_listing_serializes_flat() {
        let listing = CatalogListing {
            page: MoviePage::empty(2),
            error: Some("Catalog unavailable: down".to_string()),
        };
        let json = serde_json::to_value(&listing).unwrap();

        assert_eq!(json["page"], 2);
        assert_eq!(json["results"].as_array().unwrap().len(), 0);
        assert_eq!(json["error"], "Catalog unavailable: down");
    }
}
