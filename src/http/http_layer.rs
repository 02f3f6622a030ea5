// HTTP layer - the inbound trigger surface and its contracts.

#[path = "contracts.rs"]
pub mod contracts;

#[path = "routes.rs"]
pub mod routes;
