//! # Mirage Common Library
//!
//! Shared code for the Mirage installation services:
//! - Session and statistics models
//! - Inline image encoding (data URLs)
//! - Configuration loading
//! - Database initialization and schema

pub mod config;
pub mod db;
pub mod error;
pub mod image;
pub mod models;

pub use error::{Error, Result};
pub use image::ImageData;
pub use models::{Session, Statistics, VARIATION_COUNT};
