#![warn(clippy::pedantic, clippy::all, clippy::nursery)]
#![allow(clippy::single_match_else, clippy::missing_errors_doc)]

#[macro_use]
extern crate tracing;

pub mod auth;
pub mod config;
pub mod data;
pub mod error;
pub mod events;
pub mod jobs;
pub mod maud_conveniences;
pub mod query;
pub mod routes;
pub mod service;
pub mod state;
pub mod transfer;
