//! Keyword-driven recommendations over a user's favorited items.
//!
//! The favorites store supplies each user's favorites and their keywords, the
//! recommendation engine ranks those keywords, and a search provider turns the
//! top terms into fresh items near the caller.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
