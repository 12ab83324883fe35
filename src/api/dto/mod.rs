//! Data Transfer Objects for REST request/response serialization.

pub mod auth_dto;
pub mod common_dto;
pub mod solution_dto;

pub use auth_dto::*;
pub use common_dto::*;
pub use solution_dto::*;
