use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    middleware::RequestId,
    models::{
        Category, Genre, Identity, IdentityId, ListKind, ListStats, MovieDetails, MovieEntry,
        MovieId, MovieSummary,
    },
    services::{catalog, CatalogListing, IdentityProvider},
};

use super::AppState;

/// Highest page number TMDB will serve
const MAX_PAGE: u32 = 500;

// Request/Response types

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub id: String,
    pub email: Option<String>,
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub identity: Option<Identity>,
}

#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: String,
    pub page: Option<u32>,
}

#[derive(Debug, Deserialize)]
pub struct DiscoverQuery {
    pub genre: Option<u32>,
    pub page: Option<u32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListsResponse {
    pub identity: Option<IdentityId>,
    pub busy: bool,
    pub synced: bool,
    pub watchlist: Vec<MovieEntry>,
    pub favorites: Vec<MovieEntry>,
    pub watched: Vec<MovieEntry>,
    pub stats: ListStats,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MembershipResponse {
    pub list: ListKind,
    pub movie_id: MovieId,
    pub present: bool,
}

fn page_number(page: Option<u32>) -> AppResult<u32> {
    match page.unwrap_or(1) {
        0 => Err(AppError::InvalidInput("page starts at 1".to_string())),
        p if p > MAX_PAGE => Err(AppError::InvalidInput(format!(
            "page must be at most {}",
            MAX_PAGE
        ))),
        p => Ok(p),
    }
}

// Handlers

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}

/// Current identity, if any
pub async fn get_session(State(state): State<AppState>) -> Json<SessionResponse> {
    Json(SessionResponse {
        identity: state.auth.current_identity(),
    })
}

/// Activates an identity asserted by the upstream identity provider
pub async fn sign_in(
    State(state): State<AppState>,
    Json(request): Json<SignInRequest>,
) -> AppResult<Json<Identity>> {
    let id = request.id.trim();
    if id.is_empty() {
        return Err(AppError::InvalidInput("identity id cannot be empty".to_string()));
    }

    let identity = Identity::new(IdentityId::from(id), request.email, request.display_name);
    state.auth.sign_in(identity.clone());
    state.session.sync_with(state.auth.as_ref()).await?;

    Ok(Json(identity))
}

pub async fn sign_out(State(state): State<AppState>) -> AppResult<StatusCode> {
    state.auth.sign_out();
    state.session.sync_with(state.auth.as_ref()).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Browse a curated category
pub async fn browse(
    State(state): State<AppState>,
    Path(category): Path<Category>,
    Query(params): Query<PageQuery>,
) -> AppResult<Json<CatalogListing>> {
    let page = page_number(params.page)?;
    let listing = catalog::browse_or_empty(state.catalog.as_ref(), category, page).await?;
    Ok(Json(listing))
}

/// Free-text movie search
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchQuery>,
) -> AppResult<Json<CatalogListing>> {
    let page = page_number(params.page)?;
    let listing = catalog::search_or_empty(state.catalog.as_ref(), &params.q, page).await?;
    Ok(Json(listing))
}

/// Popular movies, optionally by genre
pub async fn discover(
    State(state): State<AppState>,
    Query(params): Query<DiscoverQuery>,
) -> AppResult<Json<CatalogListing>> {
    let page = page_number(params.page)?;
    let listing = catalog::discover_or_empty(state.catalog.as_ref(), params.genre, page).await?;
    Ok(Json(listing))
}

pub async fn movie_details(
    State(state): State<AppState>,
    Path(movie_id): Path<MovieId>,
) -> AppResult<Json<MovieDetails>> {
    let details = state.catalog.movie_details(movie_id).await?;
    Ok(Json(details))
}

pub async fn genres(State(state): State<AppState>) -> AppResult<Json<Vec<Genre>>> {
    let genres = state.catalog.genres().await?;
    Ok(Json(genres))
}

/// Settled lists of the active identity
pub async fn get_lists(State(state): State<AppState>) -> Json<ListsResponse> {
    let store = state.session.store().await;
    let record = store.snapshot();

    Json(ListsResponse {
        identity: store.identity().cloned(),
        busy: store.is_busy(),
        synced: store.is_synced(),
        stats: record.stats(),
        watchlist: record.watchlist,
        favorites: record.favorites,
        watched: record.watched,
    })
}

pub async fn get_stats(State(state): State<AppState>) -> Json<ListStats> {
    Json(state.session.store().await.stats())
}

pub async fn membership(
    State(state): State<AppState>,
    Path((list, movie_id)): Path<(ListKind, MovieId)>,
) -> Json<MembershipResponse> {
    let present = state.session.store().await.contains(list, movie_id);
    Json(MembershipResponse {
        list,
        movie_id,
        present,
    })
}

/// Adds a movie to a list
///
/// Answers 202 once the record store has echoed the change back, so the next
/// request already sees it.
pub async fn add_to_list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path(list): Path<ListKind>,
    Json(movie): Json<MovieSummary>,
) -> AppResult<StatusCode> {
    tracing::info!(
        request_id = %request_id,
        list = %list,
        movie_id = movie.id,
        "Adding movie to list"
    );

    let store = state.session.store().await;
    match list {
        ListKind::Watchlist => store.add_to_watchlist(&movie).await?,
        ListKind::Favorites => store.add_to_favorites(&movie).await?,
        ListKind::Watched => store.add_to_watched(&movie).await?,
    }

    Ok(StatusCode::ACCEPTED)
}

/// Removes a movie from a list; removing an absent movie is accepted too
pub async fn remove_from_list(
    State(state): State<AppState>,
    Extension(request_id): Extension<RequestId>,
    Path((list, movie_id)): Path<(ListKind, MovieId)>,
) -> AppResult<StatusCode> {
    tracing::info!(
        request_id = %request_id,
        list = %list,
        movie_id = movie_id,
        "Removing movie from list"
    );

    let store = state.session.store().await;
    match list {
        ListKind::Watchlist => store.remove_from_watchlist(movie_id).await?,
        ListKind::Favorites => store.remove_from_favorites(movie_id).await?,
        ListKind::Watched => store.remove_from_watched(movie_id).await?,
    }

    Ok(StatusCode::ACCEPTED)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_number_defaults_to_first() {
        assert_eq!(page_number(None).unwrap(), 1);
        assert_eq!(page_number(Some(7)).unwrap(), 7);
    }

    #[test]
    fn test_page_number_bounds() {
        assert!(matches!(page_number(Some(0)), Err(AppError::InvalidInput(_))));
        assert!(page_number(Some(MAX_PAGE)).is_ok());
        assert!(matches!(
            page_number(Some(MAX_PAGE + 1)),
            Err(AppError::InvalidInput(_))
        ));
    }
}
