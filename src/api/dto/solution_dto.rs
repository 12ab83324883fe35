//! Response DTOs for solution endpoints.
//!
//! Requests deserialize straight into [`SolutionDraft`](crate::domain::SolutionDraft).

use serde::Serialize;
use utoipa::ToSchema;

use super::common_dto::PaginationMeta;
use crate::domain::Solution;

/// Response for `POST /solutions`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CreateSolutionResponse {
    /// Identifier of the new solution.
    pub solution_id: i32,
    /// Points credited to the author.
    pub points_awarded: i32,
}

/// Response for `PUT /solutions/{id}`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UpdateSolutionResponse {
    /// Identifier of the edited solution.
    pub solution_id: i32,
    /// Always `"updated"`.
    pub status: String,
}

/// Response for the solution listings.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SolutionListResponse {
    /// Solutions on this page, newest first.
    pub data: Vec<Solution>,
    /// Pagination metadata.
    pub pagination: PaginationMeta,
}
