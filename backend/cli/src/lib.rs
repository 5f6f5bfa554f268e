//! `ocrdeck-cli`: the controller, the latest-result viewer and terminal output
//! behind the `ocrdeck` binary.

pub mod api;
pub mod app;
pub mod config;
pub mod jobs;
pub mod output;
