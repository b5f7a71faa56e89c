//! Course-calendar portal backend: staging store, sync engine and HTTP API.

pub mod api;
pub mod calendar;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod util;
