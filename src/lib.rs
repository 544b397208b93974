pub mod catalog;
pub mod cli;
pub mod config;
mod db;
pub mod filter;
pub mod index;
mod metrics;
pub mod models;
pub mod searcher;
mod server;
pub mod types;
pub mod utils;

pub use config::Opts;
pub use searcher::{SearchRequest, Searcher};
