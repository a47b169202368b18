// Campaign wiki backend: records, shortcode entity linking and the HTTP API.

pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod metrics;
pub mod shortcode;
