pub mod cache;
pub mod config;
pub mod errors;
pub mod extractor;
pub mod feed;
pub mod models;
pub mod proxy;
pub mod resolver;
pub mod utils;
pub mod web;
