//! Infrastructure layer module
//!
//! This module contains the adapters behind the domain ports:
//! - SQLite persistence (sqlx pools, migrations, repositories)
//! - Scripted source layer adapters and fixture loading
//! - Configuration loading and validation
//!
//! Infrastructure implementations satisfy the port traits defined in the domain layer.

pub mod config;
pub mod database;
pub mod sources;
