pub mod binding;
pub mod config;
pub mod crypto;
pub mod db;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod ledger;
pub mod middleware;
pub mod models;
pub mod util;
