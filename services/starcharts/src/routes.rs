//! Repository and star history endpoints

use axum::Json;
use axum::extract::{Path, State};
use github::Repository;
use tracing::info;

use crate::AppState;
use crate::error::ApiError;
use crate::series::StarSeries;

/// `GET /{owner}/{repo}`
pub async fn repository(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<Repository>, ApiError> {
    let cancel = state.shutdown.child_token();
    let repository = state
        .github
        .resolve(&format!("{owner}/{repo}"), &cancel)
        .await?;
    Ok(Json(repository))
}

/// `GET /{owner}/{repo}/stars`
pub async fn stars(
    State(state): State<AppState>,
    Path((owner, repo)): Path<(String, String)>,
) -> Result<Json<StarSeries>, ApiError> {
    let cancel = state.shutdown.child_token();
    let repository = state
        .github
        .resolve(&format!("{owner}/{repo}"), &cancel)
        .await?;
    let stars = state.github.collect(&repository, &cancel).await?;

    let series = StarSeries::new(repository, stars);
    info!(
        repo = %series.repository.full_name,
        points = series.points.len(),
        sampled = series.sampled,
        "collected star history"
    );
    Ok(Json(series))
}
