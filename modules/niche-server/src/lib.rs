pub mod routes;
pub mod runner;
