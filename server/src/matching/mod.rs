pub mod engine;
pub mod routes;
pub mod score;
