//! Forge Git server: configuration, SQLite repository metadata, bearer
//! tokens and LFS storage wired around the `git-http` router.

pub mod api;
pub mod app;
pub mod auth;
pub mod config;
pub mod db;
pub mod metrics_exporter;
pub mod repository;
pub mod storage;
pub mod supervisor;
pub mod validation;

pub mod test_helpers;
