pub mod auth;
pub mod error;
pub mod middleware;
pub mod resolvers;
pub mod routes;
pub mod schema;
