//! OpenAPI document for the REST API.

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::openapi::{Components, OpenApi as OpenApiDoc};
use utoipa::{Modify, OpenApi};

use super::handlers::{auth, solution, system};
use crate::error::{ErrorBody, ErrorResponse};

/// Generated OpenAPI description of every REST endpoint.
#[derive(Debug, OpenApi)]
#[openapi(
    info(
        title = "acbank",
        description = "Community solution bank: submit solutions, earn points, follow live updates on /ws."
    ),
    paths(
        system::health_handler,
        auth::register,
        auth::login,
        auth::logout,
        auth::logout_all,
        auth::change_password,
        solution::create_solution,
        solution::update_solution,
        solution::delete_solution,
        solution::my_solutions,
        solution::public_solutions,
        solution::all_solutions,
        solution::view_solution,
        solution::get_points,
        solution::ranking,
    ),
    components(schemas(ErrorResponse, ErrorBody)),
    modifiers(&BearerCredential),
    tags(
        (name = "System", description = "Service health"),
        (name = "Auth", description = "Accounts and single-session credentials"),
        (name = "Solutions", description = "Solution submissions, listings and points"),
    )
)]
pub struct ApiDoc;

/// Registers the `Authorization: Bearer <account>:<token>` scheme.
#[derive(Debug)]
struct BearerCredential;

impl Modify for BearerCredential {
    fn modify(&self, openapi: &mut OpenApiDoc) {
        let components = openapi.components.get_or_insert_with(Components::default);
        components.add_security_scheme(
            "session",
            SecurityScheme::Http(HttpBuilder::new().scheme(HttpAuthScheme::Bearer).build()),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn document_lists_every_route() {
        let doc = ApiDoc::openapi();
        for path in [
            "/health",
            "/api/v1/auth/login",
            "/api/v1/auth/logout-all",
            "/api/v1/solutions",
            "/api/v1/solutions/{id}",
            "/api/v1/solutions/mine",
            "/api/v1/solutions/public",
            "/api/v1/points",
            "/api/v1/ranking",
        ] {
            assert!(doc.paths.paths.contains_key(path), "missing {path}");
        }
    }
}
