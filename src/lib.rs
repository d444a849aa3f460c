pub mod common;
pub mod config;
pub mod downloader;
pub mod mail;
pub mod pipeline;
pub mod scheduler;
pub mod search;
pub mod summary;
