//! Solution submissions, listings and member roles.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::error::AppError;

/// Points awarded for each submitted solution.
pub const POINTS_PER_SOLUTION: i32 = 10;

/// A solution as submitted or edited by a member.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SolutionDraft {
    /// Link to the problem statement.
    pub url: String,
    /// Short title.
    pub title: String,
    /// Whether the solution was accepted by the judge.
    #[serde(default)]
    pub isac: bool,
    /// Whether other members may see it.
    #[serde(default)]
    pub ispublic: bool,
    /// Optional write-up.
    #[serde(default)]
    pub summary: Option<String>,
    /// Solution source code.
    pub code: String,
}

impl SolutionDraft {
    /// Rejects drafts without a URL, a title, or any code.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::InvalidRequest`] naming the missing field.
    pub fn validate(&self) -> Result<(), AppError> {
        if self.url.trim().is_empty() || self.title.trim().is_empty() {
            return Err(AppError::InvalidRequest(
                "url and title are required".to_string(),
            ));
        }
        if self.code.trim().is_empty() {
            return Err(AppError::InvalidRequest("code is required".to_string()));
        }
        Ok(())
    }
}

/// Member role.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Regular member: may only modify their own solutions.
    #[default]
    Default,
    /// Administrator: may modify any solution.
    Admin,
}

impl Role {
    /// Parses the stored role name; anything unrecognized is a regular
    /// member.
    #[must_use]
    pub fn from_db(value: &str) -> Self {
        match value {
            "admin" => Self::Admin,
            _ => Self::Default,
        }
    }

    /// Returns `true` if this role may modify a solution owned by `owner`
    /// when acting as `actor`.
    #[must_use]
    pub fn may_modify(self, actor: &str, owner: &str) -> bool {
        self == Self::Admin || actor == owner
    }
}

/// Point balance of a member.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct UserPoints {
    /// Spendable points.
    pub current_point: i32,
    /// Points earned over the account's lifetime.
    pub total_point: i32,
}

/// A stored solution together with its author.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct Solution {
    /// Solution identifier.
    pub id: i32,
    /// Link to the problem statement.
    pub url: String,
    /// Short title.
    pub title: Option<String>,
    /// Whether the solution was accepted by the judge.
    pub isac: bool,
    /// Whether other members may see it.
    pub ispublic: bool,
    /// Optional write-up.
    pub summary: Option<String>,
    /// Solution source code.
    pub code: Option<String>,
    /// Username of the author.
    pub author: String,
    /// Submission time.
    pub created_at: Option<NaiveDateTime>,
}

impl Solution {
    /// Returns `true` if `actor`, holding `role`, may read this solution.
    /// Private solutions are limited to their author and admins.
    #[must_use]
    pub fn visible_to(&self, actor: &str, role: Role) -> bool {
        self.ispublic || role.may_modify(actor, &self.author)
    }
}

/// Which solutions a listing covers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing<'a> {
    /// Everything authored by one member, private or not.
    AuthoredBy(&'a str),
    /// Public solutions of every member.
    Public,
    /// Every solution. Admins only.
    All,
}

/// One page of a solution listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SolutionPage {
    /// Solutions on this page, newest first.
    pub solutions: Vec<Solution>,
    /// Matching solutions across all pages.
    pub total: u64,
}

/// A member's lifetime points, as shown on the leaderboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RankEntry {
    /// Member username.
    pub username: String,
    /// Points earned over the account's lifetime.
    pub total_point: i32,
}
