//! Solution service: orchestrates solution mutations and reads, and emits
//! events.

use std::sync::Arc;

use super::auth_limits::enforce;
use crate::domain::solution::POINTS_PER_SOLUTION;
use crate::domain::{
    AuthError, EventBus, Listing, LiveEvent, RankEntry, RateLimiter, Role, Solution, SolutionDraft,
    SolutionPage, UserPoints,
};
use crate::error::AppError;
use crate::persistence::SolutionStore;

/// Rate-limited action: submitting a solution.
pub const CREATE_SOLUTION: &str = "create_solution";
/// Rate-limited action: editing a solution.
pub const UPDATE_SOLUTION: &str = "update_solution";
/// Rate-limited action: deleting a solution.
pub const DELETE_SOLUTION: &str = "delete_solution";

/// Orchestration layer for solution mutations.
///
/// Every mutation follows the same pattern: check the abuse limiter for
/// (member, action), run the store operation on a borrowed connection,
/// then publish the resulting event to live subscribers.
#[derive(Debug, Clone)]
pub struct SolutionService<R> {
    store: R,
    limiter: Arc<RateLimiter>,
    event_bus: EventBus,
}

impl<R: SolutionStore> SolutionService<R> {
    /// Creates a new `SolutionService`.
    #[must_use]
    pub fn new(store: R, limiter: Arc<RateLimiter>, event_bus: EventBus) -> Self {
        Self {
            store,
            limiter,
            event_bus,
        }
    }

    /// Returns a reference to the inner [`EventBus`].
    #[must_use]
    pub fn event_bus(&self) -> &EventBus {
        &self.event_bus
    }

    /// Returns a reference to the shared [`RateLimiter`].
    #[must_use]
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Records one `action` by `account`, or rejects it if the member's
    /// window is full.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::RateLimited`] carrying the time until a slot
    /// frees up.
    pub fn guard(&self, account: &str, action: &str) -> Result<(), AppError> {
        enforce(&self.limiter, account, action)
    }

    /// Submits a solution authored by `author` and credits their points.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError`] if the member is rate limited, the draft is
    /// invalid, the author no longer exists, or the store fails.
    pub async fn create_solution(&self, author: &str, draft: &SolutionDraft) -> Result<i32, AppError> {
        self.guard(author, CREATE_SOLUTION)?;
        draft.validate()?;

        let solution_id = self
            .store
            .insert_solution(author, draft, POINTS_PER_SOLUTION)
            .await?
            .ok_or(AppError::Auth(AuthError::AccountMissing))?;

        let delivered = self.event_bus.publish(&LiveEvent::NewSolution { solution_id });
        tracing::info!(author, solution_id, delivered, "solution created");
        Ok(solution_id)
    }

    /// Overwrites a solution. Only its owner or an admin may do so.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError`] if the member is rate limited, the draft is
    /// invalid, the solution does not exist, the member may not modify it,
    /// or the store fails.
    pub async fn update_solution(
        &self,
        actor: &str,
        solution_id: i32,
        draft: &SolutionDraft,
    ) -> Result<(), AppError> {
        self.guard(actor, UPDATE_SOLUTION)?;
        draft.validate()?;
        self.authorize(actor, solution_id).await?;

        if !self.store.update_solution(solution_id, draft).await? {
            return Err(AppError::SolutionNotFound(solution_id));
        }

        let delivered = self.event_bus.publish(&LiveEvent::UpdateSolution { solution_id });
        tracing::info!(actor, solution_id, delivered, "solution updated");
        Ok(())
    }

    /// Deletes a solution. Only its owner or an admin may do so.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError`] if the member is rate limited, the solution
    /// does not exist, the member may not modify it, or the store fails.
    pub async fn delete_solution(&self, actor: &str, solution_id: i32) -> Result<(), AppError> {
        self.guard(actor, DELETE_SOLUTION)?;
        self.authorize(actor, solution_id).await?;

        if !self.store.delete_solution(solution_id).await? {
            return Err(AppError::SolutionNotFound(solution_id));
        }

        let delivered = self.event_bus.publish(&LiveEvent::DeleteSolution { solution_id });
        tracing::info!(actor, solution_id, delivered, "solution deleted");
        Ok(())
    }

    /// Returns one page of `listing`, filtered by a URL or title substring.
    /// Pages are 1-indexed; a blank `search` matches everything.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Forbidden`] if a non-admin asks for
    /// [`Listing::All`], or an [`AppError`] if the store fails.
    pub async fn list_solutions(
        &self,
        actor: &str,
        listing: Listing<'_>,
        search: Option<&str>,
        page: u32,
        per_page: u32,
    ) -> Result<SolutionPage, AppError> {
        if listing == Listing::All && self.store.role(actor).await? != Role::Admin {
            return Err(AppError::Forbidden(
                "only admins may list every solution".to_string(),
            ));
        }
        let search = search.map(str::trim).filter(|term| !term.is_empty());
        let offset = u64::from(page.saturating_sub(1)) * u64::from(per_page);
        self.store
            .list_solutions(listing, search, offset, u64::from(per_page))
            .await
    }

    /// Returns a single solution. Private solutions are reported missing to
    /// anyone but their author and admins.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::SolutionNotFound`] if the solution does not exist
    /// or is hidden from `actor`, or an [`AppError`] if the store fails.
    pub async fn view_solution(&self, actor: &str, solution_id: i32) -> Result<Solution, AppError> {
        let solution = self
            .store
            .find_solution(solution_id)
            .await?
            .ok_or(AppError::SolutionNotFound(solution_id))?;
        if solution.ispublic {
            return Ok(solution);
        }
        let role = self.store.role(actor).await?;
        if solution.visible_to(actor, role) {
            Ok(solution)
        } else {
            tracing::debug!(actor, solution_id, "private solution hidden");
            Err(AppError::SolutionNotFound(solution_id))
        }
    }

    /// Returns every member's lifetime points, highest first.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError`] if the store fails.
    pub async fn ranking(&self) -> Result<Vec<RankEntry>, AppError> {
        self.store.ranking().await
    }

    /// Returns the member's point balance.
    ///
    /// # Errors
    ///
    /// Returns a [`AppError`] if the store fails.
    pub async fn points(&self, account: &str) -> Result<UserPoints, AppError> {
        self.store.points(account).await
    }

    async fn authorize(&self, actor: &str, solution_id: i32) -> Result<(), AppError> {
        let owner = self
            .store
            .solution_owner(solution_id)
            .await?
            .ok_or(AppError::SolutionNotFound(solution_id))?;
        let role = self.store.role(actor).await?;
        if role.may_modify(actor, &owner) {
            Ok(())
        } else {
            Err(AppError::Forbidden(format!(
                "solution {solution_id} belongs to another member"
            )))
        }
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use parking_lot::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Tables {
        next_id: i32,
        solutions: HashMap<i32, (String, SolutionDraft)>,
        roles: HashMap<String, Role>,
        points: HashMap<String, UserPoints>,
    }

    #[derive(Debug, Default, Clone)]
    struct MemoryStore {
        tables: Arc<Mutex<Tables>>,
    }

    impl MemoryStore {
        fn with_members(members: &[(&str, Role)]) -> Self {
            let store = Self::default();
            {
                let mut tables = store.tables.lock();
                for (name, role) in members {
                    tables.roles.insert((*name).to_string(), *role);
                    tables.points.insert((*name).to_string(), UserPoints::default());
                }
            }
            store
        }
    }

    impl SolutionStore for MemoryStore {
        async fn insert_solution(
            &self,
            author: &str,
            draft: &SolutionDraft,
            points: i32,
        ) -> Result<Option<i32>, AppError> {
            let mut tables = self.tables.lock();
            if !tables.roles.contains_key(author) {
                return Ok(None);
            }
            tables.next_id += 1;
            let id = tables.next_id;
            tables.solutions.insert(id, (author.to_string(), draft.clone()));
            let balance = tables.points.entry(author.to_string()).or_default();
            balance.current_point += points;
            balance.total_point += points;
            Ok(Some(id))
        }

        async fn solution_owner(&self, solution_id: i32) -> Result<Option<String>, AppError> {
            Ok(self
                .tables
                .lock()
                .solutions
                .get(&solution_id)
                .map(|(owner, _)| owner.clone()))
        }

        async fn update_solution(&self, solution_id: i32, draft: &SolutionDraft) -> Result<bool, AppError> {
            Ok(self
                .tables
                .lock()
                .solutions
                .get_mut(&solution_id)
                .map(|(_, stored)| *stored = draft.clone())
                .is_some())
        }

        async fn delete_solution(&self, solution_id: i32) -> Result<bool, AppError> {
            Ok(self.tables.lock().solutions.remove(&solution_id).is_some())
        }

        async fn find_solution(&self, solution_id: i32) -> Result<Option<Solution>, AppError> {
            Ok(self
                .tables
                .lock()
                .solutions
                .get(&solution_id)
                .map(|(author, draft)| stored(solution_id, author, draft)))
        }

        async fn list_solutions(
            &self,
            listing: Listing<'_>,
            search: Option<&str>,
            offset: u64,
            limit: u64,
        ) -> Result<SolutionPage, AppError> {
            let tables = self.tables.lock();
            let mut matching: Vec<Solution> = tables
                .solutions
                .iter()
                .map(|(id, (author, draft))| stored(*id, author, draft))
                .filter(|s| match listing {
                    Listing::AuthoredBy(author) => s.author == author,
                    Listing::Public => s.ispublic,
                    Listing::All => true,
                })
                .filter(|s| {
                    search.is_none_or(|term| {
                        s.url.contains(term) || s.title.as_deref().is_some_and(|t| t.contains(term))
                    })
                })
                .collect();
            matching.sort_by(|a, b| b.id.cmp(&a.id));
            let total = matching.len() as u64;
            let solutions = matching
                .into_iter()
                .skip(usize::try_from(offset).unwrap_or(usize::MAX))
                .take(usize::try_from(limit).unwrap_or(usize::MAX))
                .collect();
            Ok(SolutionPage { solutions, total })
        }

        async fn ranking(&self) -> Result<Vec<RankEntry>, AppError> {
            let tables = self.tables.lock();
            let mut entries: Vec<RankEntry> = tables
                .roles
                .keys()
                .map(|username| RankEntry {
                    username: username.clone(),
                    total_point: tables.points.get(username).map_or(0, |p| p.total_point),
                })
                .collect();
            entries.sort_by(|a, b| b.total_point.cmp(&a.total_point).then(a.username.cmp(&b.username)));
            Ok(entries)
        }

        async fn role(&self, account: &str) -> Result<Role, AppError> {
            Ok(self.tables.lock().roles.get(account).copied().unwrap_or_default())
        }

        async fn points(&self, account: &str) -> Result<UserPoints, AppError> {
            Ok(self.tables.lock().points.get(account).copied().unwrap_or_default())
        }
    }

    fn stored(id: i32, author: &str, draft: &SolutionDraft) -> Solution {
        Solution {
            id,
            url: draft.url.clone(),
            title: Some(draft.title.clone()),
            isac: draft.isac,
            ispublic: draft.ispublic,
            summary: draft.summary.clone(),
            code: Some(draft.code.clone()),
            author: author.to_string(),
            created_at: None,
        }
    }

    fn private_draft(title: &str) -> SolutionDraft {
        SolutionDraft {
            ispublic: false,
            ..draft(title)
        }
    }

    fn draft(title: &str) -> SolutionDraft {
        SolutionDraft {
            url: "https://oj.example/problem/1000".to_string(),
            title: title.to_string(),
            isac: true,
            ispublic: true,
            summary: Some("prefix sums".to_string()),
            code: "int main() { return 0; }".to_string(),
        }
    }

    fn make_service(store: MemoryStore) -> SolutionService<MemoryStore> {
        SolutionService::new(store, Arc::new(RateLimiter::default()), EventBus::new(64))
    }

    fn members() -> MemoryStore {
        MemoryStore::with_members(&[("alice", Role::Default), ("bob", Role::Default), ("root", Role::Admin)])
    }

    #[tokio::test]
    async fn create_solution_awards_points_and_emits_event() {
        let service = make_service(members());
        let mut subscriber = service.event_bus().subscribe();
        let _ = subscriber.recv().await;

        let Ok(solution_id) = service.create_solution("alice", &draft("A + B")).await else {
            panic!("create should succeed");
        };

        let Some(frame) = subscriber.recv().await else {
            panic!("expected event");
        };
        assert!(frame.contains("new_solution"));
        assert!(frame.contains(&format!("\"solution_id\":{solution_id}")));

        let Ok(points) = service.points("alice").await else {
            panic!("points should load");
        };
        assert_eq!(points.current_point, POINTS_PER_SOLUTION);
        assert_eq!(points.total_point, POINTS_PER_SOLUTION);
    }

    #[tokio::test]
    async fn invalid_draft_is_rejected_without_event() {
        let service = make_service(members());
        let mut subscriber = service.event_bus().subscribe();
        let _ = subscriber.recv().await;

        let result = service.create_solution("alice", &draft("")).await;
        assert!(matches!(result, Err(AppError::InvalidRequest(_))));
        assert!(subscriber.try_recv().is_none());
    }

    #[tokio::test]
    async fn vanished_author_cannot_create() {
        let service = make_service(members());
        let result = service.create_solution("ghost", &draft("A + B")).await;
        assert!(matches!(result, Err(AppError::Auth(AuthError::AccountMissing))));
    }

    #[tokio::test]
    async fn only_owner_or_admin_may_modify() {
        let service = make_service(members());
        let Ok(solution_id) = service.create_solution("alice", &draft("A + B")).await else {
            panic!("create should succeed");
        };

        let by_bob = service.update_solution("bob", solution_id, &draft("mine now")).await;
        assert!(matches!(by_bob, Err(AppError::Forbidden(_))));

        let by_owner = service.update_solution("alice", solution_id, &draft("A + B, faster")).await;
        assert!(by_owner.is_ok());

        let by_admin = service.delete_solution("root", solution_id).await;
        assert!(by_admin.is_ok());
    }

    #[tokio::test]
    async fn missing_solution_is_not_found() {
        let service = make_service(members());
        let result = service.delete_solution("alice", 404).await;
        assert!(matches!(result, Err(AppError::SolutionNotFound(404))));
    }

    #[tokio::test(start_paused = true)]
    async fn eleventh_create_is_rate_limited_until_window_slides() {
        let service = make_service(members());

        for n in 0..10 {
            let result = service.create_solution("alice", &draft(&format!("problem {n}"))).await;
            assert!(result.is_ok(), "create {n} should pass");
        }

        let limited = service.create_solution("alice", &draft("one too many")).await;
        let Err(AppError::RateLimited { action, retry_after_ms }) = limited else {
            panic!("expected rate limit");
        };
        assert_eq!(action, CREATE_SOLUTION);
        assert!(retry_after_ms > 0);

        // Another member and another action are unaffected.
        assert!(service.create_solution("bob", &draft("A + B")).await.is_ok());
        assert!(service.delete_solution("alice", 1).await.is_ok());

        tokio::time::advance(Duration::from_secs(61)).await;
        assert!(service.create_solution("alice", &draft("after the window")).await.is_ok());
    }

    async fn seed(service: &SolutionService<MemoryStore>) {
        for (author, draft) in [
            ("alice", draft("two pointers")),
            ("alice", private_draft("segment tree")),
            ("bob", draft("dijkstra")),
            ("bob", private_draft("two sat")),
        ] {
            assert!(service.create_solution(author, &draft).await.is_ok());
        }
    }

    fn titles(page: &SolutionPage) -> Vec<&str> {
        page.solutions
            .iter()
            .filter_map(|s| s.title.as_deref())
            .collect()
    }

    #[tokio::test]
    async fn listings_respect_scope_and_search() {
        let service = make_service(members());
        seed(&service).await;

        let Ok(mine) = service.list_solutions("alice", Listing::AuthoredBy("alice"), None, 1, 10).await else {
            panic!("own listing should load");
        };
        assert_eq!(mine.total, 2);
        assert_eq!(titles(&mine), ["segment tree", "two pointers"]);

        let Ok(public) = service.list_solutions("alice", Listing::Public, None, 1, 10).await else {
            panic!("public listing should load");
        };
        assert_eq!(titles(&public), ["dijkstra", "two pointers"]);

        let Ok(found) = service.list_solutions("alice", Listing::Public, Some(" two "), 1, 10).await else {
            panic!("search should load");
        };
        assert_eq!(titles(&found), ["two pointers"]);

        let Ok(blank) = service.list_solutions("alice", Listing::Public, Some("  "), 1, 10).await else {
            panic!("blank search should load");
        };
        assert_eq!(blank.total, 2);
    }

    #[tokio::test]
    async fn listings_paginate_newest_first() {
        let service = make_service(members());
        seed(&service).await;

        let Ok(first) = service.list_solutions("root", Listing::All, None, 1, 3).await else {
            panic!("admin listing should load");
        };
        assert_eq!(first.total, 4);
        assert_eq!(titles(&first), ["two sat", "dijkstra", "segment tree"]);

        let Ok(second) = service.list_solutions("root", Listing::All, None, 2, 3).await else {
            panic!("second page should load");
        };
        assert_eq!(titles(&second), ["two pointers"]);

        let Ok(past_end) = service.list_solutions("root", Listing::All, None, 9, 3).await else {
            panic!("page past the end should load");
        };
        assert!(past_end.solutions.is_empty());
        assert_eq!(past_end.total, 4);
    }

    #[tokio::test]
    async fn only_admin_may_list_everything() {
        let service = make_service(members());
        let result = service.list_solutions("bob", Listing::All, None, 1, 10).await;
        assert!(matches!(result, Err(AppError::Forbidden(_))));
    }

    #[tokio::test]
    async fn private_solution_is_hidden_from_other_members() {
        let service = make_service(members());
        let Ok(solution_id) = service.create_solution("alice", &private_draft("segment tree")).await else {
            panic!("create should succeed");
        };

        let Ok(by_owner) = service.view_solution("alice", solution_id).await else {
            panic!("owner should see their solution");
        };
        assert_eq!(by_owner.author, "alice");
        assert!(service.view_solution("root", solution_id).await.is_ok());

        let by_bob = service.view_solution("bob", solution_id).await;
        assert!(matches!(by_bob, Err(AppError::SolutionNotFound(id)) if id == solution_id));

        let missing = service.view_solution("alice", 404).await;
        assert!(matches!(missing, Err(AppError::SolutionNotFound(404))));
    }

    #[tokio::test]
    async fn ranking_orders_by_lifetime_points() {
        let service = make_service(members());
        assert!(service.create_solution("bob", &draft("dijkstra")).await.is_ok());
        assert!(service.create_solution("bob", &draft("floyd")).await.is_ok());
        assert!(service.create_solution("alice", &draft("two pointers")).await.is_ok());

        let Ok(ranking) = service.ranking().await else {
            panic!("ranking should load");
        };
        let order: Vec<(&str, i32)> = ranking
            .iter()
            .map(|entry| (entry.username.as_str(), entry.total_point))
            .collect();
        assert_eq!(order, [("bob", 20), ("alice", 10), ("root", 0)]);
    }
}
