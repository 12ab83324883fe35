//! Solution handlers: submit, edit, delete, browse, and points.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};

use crate::api::dto::{
    CreateSolutionResponse, PaginationParams, SearchParams, SolutionListResponse,
    UpdateSolutionResponse,
};
use crate::api::extract::AuthSession;
use crate::app_state::AppState;
use crate::domain::solution::POINTS_PER_SOLUTION;
use crate::domain::{Listing, RankEntry, Solution, SolutionDraft, UserPoints};
use crate::error::{AppError, ErrorResponse};

/// `POST /solutions` — Submit a solution.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid, the draft is incomplete,
/// or the member exceeded the `create_solution` limit.
#[utoipa::path(
    post,
    path = "/api/v1/solutions",
    tag = "Solutions",
    summary = "Submit a solution",
    description = "Stores the solution, credits the author 10 points and notifies live subscribers with `new_solution`.",
    request_body = SolutionDraft,
    responses(
        (status = 201, description = "Solution stored", body = CreateSolutionResponse),
        (status = 400, description = "Incomplete draft", body = ErrorResponse),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
        (status = 429, description = "Too many submissions", body = ErrorResponse),
    )
)]
pub async fn create_solution(
    State(state): State<AppState>,
    session: AuthSession,
    Json(draft): Json<SolutionDraft>,
) -> Result<impl IntoResponse, AppError> {
    let solution_id = state
        .solutions
        .create_solution(session.account(), &draft)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(CreateSolutionResponse {
            solution_id,
            points_awarded: POINTS_PER_SOLUTION,
        }),
    ))
}

/// `PUT /solutions/{id}` — Edit a solution.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid, the solution does not
/// exist or belongs to someone else, or the member exceeded the
/// `update_solution` limit.
#[utoipa::path(
    put,
    path = "/api/v1/solutions/{id}",
    tag = "Solutions",
    summary = "Edit a solution",
    params(("id" = i32, Path, description = "Solution identifier")),
    request_body = SolutionDraft,
    responses(
        (status = 200, description = "Solution updated", body = UpdateSolutionResponse),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such solution", body = ErrorResponse),
        (status = 429, description = "Too many edits", body = ErrorResponse),
    )
)]
pub async fn update_solution(
    State(state): State<AppState>,
    session: AuthSession,
    Path(solution_id): Path<i32>,
    Json(draft): Json<SolutionDraft>,
) -> Result<impl IntoResponse, AppError> {
    state
        .solutions
        .update_solution(session.account(), solution_id, &draft)
        .await?;

    Ok(Json(UpdateSolutionResponse {
        solution_id,
        status: "updated".to_string(),
    }))
}

/// `DELETE /solutions/{id}` — Delete a solution.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid, the solution does not
/// exist or belongs to someone else, or the member exceeded the
/// `delete_solution` limit.
#[utoipa::path(
    delete,
    path = "/api/v1/solutions/{id}",
    tag = "Solutions",
    summary = "Delete a solution",
    params(("id" = i32, Path, description = "Solution identifier")),
    responses(
        (status = 204, description = "Solution deleted"),
        (status = 403, description = "Not the owner", body = ErrorResponse),
        (status = 404, description = "No such solution", body = ErrorResponse),
        (status = 429, description = "Too many deletions", body = ErrorResponse),
    )
)]
pub async fn delete_solution(
    State(state): State<AppState>,
    session: AuthSession,
    Path(solution_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    state
        .solutions
        .delete_solution(session.account(), solution_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /points` — The caller's point balance.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid or the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/points",
    tag = "Solutions",
    summary = "Get point balance",
    responses(
        (status = 200, description = "Point balance", body = UserPoints),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn get_points(
    State(state): State<AppState>,
    session: AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let points = state.solutions.points(session.account()).await?;
    Ok(Json(points))
}

/// `GET /solutions/mine` — The caller's solutions, private ones included.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid or the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/solutions/mine",
    tag = "Solutions",
    summary = "List own solutions",
    params(PaginationParams, SearchParams),
    responses(
        (status = 200, description = "Paginated solutions", body = SolutionListResponse),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn my_solutions(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    let account = session.account();
    list(&state, account, Listing::AuthoredBy(account), &params, &filter).await
}

/// `GET /solutions/public` — Public solutions of every member.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid or the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/solutions/public",
    tag = "Solutions",
    summary = "List public solutions",
    params(PaginationParams, SearchParams),
    responses(
        (status = 200, description = "Paginated solutions", body = SolutionListResponse),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn public_solutions(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    list(&state, session.account(), Listing::Public, &params, &filter).await
}

/// `GET /solutions` — Every solution. Admins only.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid, the caller is not an
/// admin, or the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/solutions",
    tag = "Solutions",
    summary = "List all solutions",
    params(PaginationParams, SearchParams),
    responses(
        (status = 200, description = "Paginated solutions", body = SolutionListResponse),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
        (status = 403, description = "Caller is not an admin", body = ErrorResponse),
    )
)]
pub async fn all_solutions(
    State(state): State<AppState>,
    session: AuthSession,
    Query(params): Query<PaginationParams>,
    Query(filter): Query<SearchParams>,
) -> Result<impl IntoResponse, AppError> {
    list(&state, session.account(), Listing::All, &params, &filter).await
}

async fn list(
    state: &AppState,
    actor: &str,
    listing: Listing<'_>,
    params: &PaginationParams,
    filter: &SearchParams,
) -> Result<Json<SolutionListResponse>, AppError> {
    let params = params.clamped();
    let page = state
        .solutions
        .list_solutions(
            actor,
            listing,
            filter.search.as_deref(),
            params.page,
            params.per_page,
        )
        .await?;

    Ok(Json(SolutionListResponse {
        data: page.solutions,
        pagination: params.meta(page.total),
    }))
}

/// `GET /solutions/{id}` — A single solution.
///
/// # Errors
///
/// Returns [`AppError::SolutionNotFound`] if the solution does not exist or
/// is private to another member.
#[utoipa::path(
    get,
    path = "/api/v1/solutions/{id}",
    tag = "Solutions",
    summary = "View a solution",
    params(("id" = i32, Path, description = "Solution identifier")),
    responses(
        (status = 200, description = "The solution", body = Solution),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
        (status = 404, description = "No such solution", body = ErrorResponse),
    )
)]
pub async fn view_solution(
    State(state): State<AppState>,
    session: AuthSession,
    Path(solution_id): Path<i32>,
) -> Result<impl IntoResponse, AppError> {
    let solution = state
        .solutions
        .view_solution(session.account(), solution_id)
        .await?;
    Ok(Json(solution))
}

/// `GET /ranking` — Every member's lifetime points, highest first.
///
/// # Errors
///
/// Returns [`AppError`] if the session is invalid or the store fails.
#[utoipa::path(
    get,
    path = "/api/v1/ranking",
    tag = "Solutions",
    summary = "Points leaderboard",
    responses(
        (status = 200, description = "Members by lifetime points", body = Vec<RankEntry>),
        (status = 401, description = "Session missing or revoked", body = ErrorResponse),
    )
)]
pub async fn ranking(
    State(state): State<AppState>,
    _session: AuthSession,
) -> Result<impl IntoResponse, AppError> {
    let ranking = state.solutions.ranking().await?;
    Ok(Json(ranking))
}

/// Solution routes, nested under `/api/v1`.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/solutions", post(create_solution).get(all_solutions))
        .route("/solutions/mine", get(my_solutions))
        .route("/solutions/public", get(public_solutions))
        .route(
            "/solutions/{id}",
            get(view_solution).put(update_solution).delete(delete_solution),
        )
        .route("/points", get(get_points))
        .route("/ranking", get(ranking))
}
