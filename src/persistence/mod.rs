//! Persistence layer: accounts, credentials, solutions and points.
//!
//! Provides the [`SolutionStore`] port used by the solution service and the
//! PostgreSQL implementations of it and of the session authority's
//! [`CredentialStore`](crate::domain::CredentialStore). Every operation
//! borrows a connection from the [`StorePool`](crate::store::StorePool) for
//! its duration and releases it before returning.

pub mod postgres;

use std::future::Future;

pub use postgres::{PgAccountStore, PgSolutionStore};

use crate::domain::{Listing, RankEntry, Role, Solution, SolutionDraft, SolutionPage, UserPoints};
use crate::error::AppError;

/// Durable storage of solutions, roles and points.
pub trait SolutionStore: Send + Sync + 'static {
    /// Inserts a solution authored by `author` and credits the author's
    /// points in the same transaction. Returns `None` if the author does not
    /// exist.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn insert_solution(
        &self,
        author: &str,
        draft: &SolutionDraft,
        points: i32,
    ) -> impl Future<Output = Result<Option<i32>, AppError>> + Send;

    /// Returns the username that owns the solution, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn solution_owner(
        &self,
        solution_id: i32,
    ) -> impl Future<Output = Result<Option<String>, AppError>> + Send;

    /// Overwrites a solution. Returns `false` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn update_solution(
        &self,
        solution_id: i32,
        draft: &SolutionDraft,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Deletes a solution. Returns `false` if it no longer exists.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn delete_solution(
        &self,
        solution_id: i32,
    ) -> impl Future<Output = Result<bool, AppError>> + Send;

    /// Returns the solution with its author, if it exists.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn find_solution(
        &self,
        solution_id: i32,
    ) -> impl Future<Output = Result<Option<Solution>, AppError>> + Send;

    /// Returns up to `limit` solutions of `listing`, newest first, skipping
    /// the first `offset`, plus the number of matches overall. `search`
    /// matches a substring of the URL or the title.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn list_solutions(
        &self,
        listing: Listing<'_>,
        search: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> impl Future<Output = Result<SolutionPage, AppError>> + Send;

    /// Returns every member's lifetime points, highest first. Members
    /// without a balance rank with zero.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn ranking(&self) -> impl Future<Output = Result<Vec<RankEntry>, AppError>> + Send;

    /// Returns the member's role; unknown members are regular members.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn role(&self, account: &str) -> impl Future<Output = Result<Role, AppError>> + Send;

    /// Returns the member's point balance, zero if none is recorded.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    fn points(&self, account: &str) -> impl Future<Output = Result<UserPoints, AppError>> + Send;
}
