//! PostgreSQL implementation of the persistence layer.
//!
//! Each method acquires a pooled connection, runs its statements, and
//! releases the connection whether or not the statements succeeded.

use std::sync::Arc;

use chrono::NaiveDateTime;
use sqlx::{Connection, PgConnection};
use subtle::ConstantTimeEq;

use super::SolutionStore;
use crate::domain::session::password_digest;
use crate::domain::{
    AuthError, CredentialStore, Listing, RankEntry, Role, Solution, SolutionDraft, SolutionPage,
    StoredCredential, UserPoints,
};
use crate::error::AppError;
use crate::store::{StoreError, StorePool};

/// Accounts and their session credentials.
#[derive(Debug, Clone)]
pub struct PgAccountStore {
    pool: Arc<StorePool>,
}

impl PgAccountStore {
    /// Creates a store borrowing connections from `pool`.
    #[must_use]
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }

    /// Creates an account with the default role and an empty point balance.
    /// Returns `false` if the username or email is taken.
    ///
    /// # Errors
    ///
    /// Returns an [`AppError`] if the store is unavailable.
    pub async fn register(&self, username: &str, email: &str, password: &str) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        let result = insert_account(&mut conn, username, email, &password_digest(password)).await;
        self.pool.release(conn).await;

        match result {
            Ok(()) => Ok(true),
            Err(sqlx::Error::Database(err)) if err.is_unique_violation() => Ok(false),
            Err(err) => Err(StoreError::from(err).into()),
        }
    }
}

async fn insert_account(
    conn: &mut PgConnection,
    username: &str,
    email: &str,
    password: &str,
) -> Result<(), sqlx::Error> {
    let mut tx = conn.begin().await?;
    sqlx::query("INSERT INTO users (username, email, password) VALUES ($1, $2, $3)")
        .bind(username)
        .bind(email)
        .bind(password)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO roles (username, role) VALUES ($1, 'default')")
        .bind(username)
        .execute(&mut *tx)
        .await?;
    sqlx::query("INSERT INTO points (username, point, total_point) VALUES ($1, 0, 0)")
        .bind(username)
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}

fn auth_store_error(err: impl std::fmt::Display) -> AuthError {
    AuthError::Store(err.to_string())
}

impl CredentialStore for PgAccountStore {
    async fn load_credential(&self, account: &str) -> Result<StoredCredential, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(auth_store_error)?;
        let row = sqlx::query_scalar::<_, Option<String>>(
            "SELECT session_token FROM users WHERE username = $1",
        )
        .bind(account)
        .fetch_optional(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(match row.map_err(auth_store_error)? {
            None => StoredCredential::AccountMissing,
            Some(None) => StoredCredential::Empty,
            Some(Some(digest)) => StoredCredential::Digest(digest),
        })
    }

    async fn store_credential(&self, account: &str, digest: &str) -> Result<bool, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(auth_store_error)?;
        let result = sqlx::query("UPDATE users SET session_token = $1 WHERE username = $2")
            .bind(digest)
            .bind(account)
            .execute(&mut *conn)
            .await;
        self.pool.release(conn).await;

        Ok(result.map_err(auth_store_error)?.rows_affected() > 0)
    }

    async fn verify_password(&self, account: &str, password: &str) -> Result<bool, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(auth_store_error)?;
        let row = sqlx::query_scalar::<_, String>("SELECT password FROM users WHERE username = $1")
            .bind(account)
            .fetch_optional(&mut *conn)
            .await;
        self.pool.release(conn).await;

        let Some(stored) = row.map_err(auth_store_error)? else {
            return Ok(false);
        };
        Ok(bool::from(
            password_digest(password).as_bytes().ct_eq(stored.as_bytes()),
        ))
    }

    async fn update_password(&self, account: &str, password: &str) -> Result<bool, AuthError> {
        let mut conn = self.pool.acquire().await.map_err(auth_store_error)?;
        let result = sqlx::query("UPDATE users SET password = $1 WHERE username = $2")
            .bind(password_digest(password))
            .bind(account)
            .execute(&mut *conn)
            .await;
        self.pool.release(conn).await;

        Ok(result.map_err(auth_store_error)?.rows_affected() > 0)
    }
}

/// Solutions, roles and points.
#[derive(Debug, Clone)]
pub struct PgSolutionStore {
    pool: Arc<StorePool>,
}

impl PgSolutionStore {
    /// Creates a store borrowing connections from `pool`.
    #[must_use]
    pub fn new(pool: Arc<StorePool>) -> Self {
        Self { pool }
    }
}

async fn insert_with_points(
    conn: &mut PgConnection,
    author: &str,
    draft: &SolutionDraft,
    points: i32,
) -> Result<Option<i32>, sqlx::Error> {
    let mut tx = conn.begin().await?;
    let solution_id = sqlx::query_scalar::<_, i32>(
        "INSERT INTO solutions (url, title, isac, ispublic, summary, code, user_id) \
         SELECT $1, $2, $3, $4, $5, $6, id FROM users WHERE username = $7 \
         RETURNING id",
    )
    .bind(&draft.url)
    .bind(&draft.title)
    .bind(draft.isac)
    .bind(draft.ispublic)
    .bind(draft.summary.as_deref())
    .bind(&draft.code)
    .bind(author)
    .fetch_optional(&mut *tx)
    .await?;

    let Some(solution_id) = solution_id else {
        tx.rollback().await?;
        return Ok(None);
    };

    sqlx::query(
        "INSERT INTO points (username, point, total_point) VALUES ($1, $2, $2) \
         ON CONFLICT (username) DO UPDATE SET \
         point = points.point + EXCLUDED.point, \
         total_point = points.total_point + EXCLUDED.total_point",
    )
    .bind(author)
    .bind(points)
    .execute(&mut *tx)
    .await?;

    tx.commit().await?;
    Ok(Some(solution_id))
}

type SolutionRow = (
    i32,
    String,
    Option<String>,
    bool,
    bool,
    Option<String>,
    Option<String>,
    String,
    Option<NaiveDateTime>,
);

fn solution_from_row(row: SolutionRow) -> Solution {
    let (id, url, title, isac, ispublic, summary, code, author, created_at) = row;
    Solution {
        id,
        url,
        title,
        isac,
        ispublic,
        summary,
        code,
        author,
        created_at,
    }
}

/// Escapes `LIKE` wildcards so the search term matches literally.
fn like_pattern(search: &str) -> String {
    let mut escaped = String::with_capacity(search.len() + 2);
    escaped.push('%');
    for ch in search.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped.push('%');
    escaped
}

async fn select_page(
    conn: &mut PgConnection,
    listing: Listing<'_>,
    search: Option<&str>,
    offset: u64,
    limit: u64,
) -> Result<SolutionPage, sqlx::Error> {
    let (author, include_private) = match listing {
        Listing::AuthoredBy(author) => (Some(author), true),
        Listing::Public => (None, false),
        Listing::All => (None, true),
    };
    let pattern = search.map(like_pattern);

    let total = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM solutions s JOIN users u ON s.user_id = u.id \
         WHERE ($1::TEXT IS NULL OR u.username = $1) AND ($2 OR s.ispublic) \
         AND ($3::TEXT IS NULL OR s.url LIKE $3 OR s.title LIKE $3)",
    )
    .bind(author)
    .bind(include_private)
    .bind(pattern.as_deref())
    .fetch_one(&mut *conn)
    .await?;

    let rows = sqlx::query_as::<_, SolutionRow>(
        "SELECT s.id, s.url, s.title, s.isac, s.ispublic, s.summary, s.code, u.username, s.created_at \
         FROM solutions s JOIN users u ON s.user_id = u.id \
         WHERE ($1::TEXT IS NULL OR u.username = $1) AND ($2 OR s.ispublic) \
         AND ($3::TEXT IS NULL OR s.url LIKE $3 OR s.title LIKE $3) \
         ORDER BY s.created_at DESC, s.id DESC LIMIT $4 OFFSET $5",
    )
    .bind(author)
    .bind(include_private)
    .bind(pattern.as_deref())
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .bind(i64::try_from(offset).unwrap_or(i64::MAX))
    .fetch_all(&mut *conn)
    .await?;

    Ok(SolutionPage {
        solutions: rows.into_iter().map(solution_from_row).collect(),
        total: u64::try_from(total).unwrap_or(0),
    })
}

impl SolutionStore for PgSolutionStore {
    async fn insert_solution(
        &self,
        author: &str,
        draft: &SolutionDraft,
        points: i32,
    ) -> Result<Option<i32>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let result = insert_with_points(&mut conn, author, draft, points).await;
        self.pool.release(conn).await;

        Ok(result.map_err(StoreError::from)?)
    }

    async fn solution_owner(&self, solution_id: i32) -> Result<Option<String>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_scalar::<_, String>(
            "SELECT u.username FROM solutions s JOIN users u ON s.user_id = u.id WHERE s.id = $1",
        )
        .bind(solution_id)
        .fetch_optional(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(row.map_err(StoreError::from)?)
    }

    async fn update_solution(&self, solution_id: i32, draft: &SolutionDraft) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query(
            "UPDATE solutions \
             SET url = $1, title = $2, isac = $3, ispublic = $4, summary = $5, code = $6 \
             WHERE id = $7",
        )
        .bind(&draft.url)
        .bind(&draft.title)
        .bind(draft.isac)
        .bind(draft.ispublic)
        .bind(draft.summary.as_deref())
        .bind(&draft.code)
        .bind(solution_id)
        .execute(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(result.map_err(StoreError::from)?.rows_affected() > 0)
    }

    async fn delete_solution(&self, solution_id: i32) -> Result<bool, AppError> {
        let mut conn = self.pool.acquire().await?;
        let result = sqlx::query("DELETE FROM solutions WHERE id = $1")
            .bind(solution_id)
            .execute(&mut *conn)
            .await;
        self.pool.release(conn).await;

        Ok(result.map_err(StoreError::from)?.rows_affected() > 0)
    }

    async fn find_solution(&self, solution_id: i32) -> Result<Option<Solution>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, SolutionRow>(
            "SELECT s.id, s.url, s.title, s.isac, s.ispublic, s.summary, s.code, u.username, s.created_at \
             FROM solutions s JOIN users u ON s.user_id = u.id WHERE s.id = $1",
        )
        .bind(solution_id)
        .fetch_optional(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(row.map_err(StoreError::from)?.map(solution_from_row))
    }

    async fn list_solutions(
        &self,
        listing: Listing<'_>,
        search: Option<&str>,
        offset: u64,
        limit: u64,
    ) -> Result<SolutionPage, AppError> {
        let mut conn = self.pool.acquire().await?;
        let result = select_page(&mut conn, listing, search, offset, limit).await;
        self.pool.release(conn).await;

        Ok(result.map_err(StoreError::from)?)
    }

    async fn ranking(&self) -> Result<Vec<RankEntry>, AppError> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, (String, i32)>(
            "SELECT u.username, COALESCE(p.total_point, 0) FROM users u \
             LEFT JOIN points p ON u.username = p.username \
             ORDER BY COALESCE(p.total_point, 0) DESC, u.username",
        )
        .fetch_all(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(rows
            .map_err(StoreError::from)?
            .into_iter()
            .map(|(username, total_point)| RankEntry {
                username,
                total_point,
            })
            .collect())
    }

    async fn role(&self, account: &str) -> Result<Role, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_scalar::<_, String>("SELECT role FROM roles WHERE username = $1")
            .bind(account)
            .fetch_optional(&mut *conn)
            .await;
        self.pool.release(conn).await;

        Ok(row
            .map_err(StoreError::from)?
            .map_or(Role::Default, |role| Role::from_db(&role)))
    }

    async fn points(&self, account: &str) -> Result<UserPoints, AppError> {
        let mut conn = self.pool.acquire().await?;
        let row = sqlx::query_as::<_, (i32, i32)>(
            "SELECT point, total_point FROM points WHERE username = $1",
        )
        .bind(account)
        .fetch_optional(&mut *conn)
        .await;
        self.pool.release(conn).await;

        Ok(row
            .map_err(StoreError::from)?
            .map(|(current_point, total_point)| UserPoints {
                current_point,
                total_point,
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn search_wildcards_match_literally() {
        assert_eq!(like_pattern("dp"), "%dp%");
        assert_eq!(like_pattern("100%_a\\b"), "%100\\%\\_a\\\\b%");
    }
}
