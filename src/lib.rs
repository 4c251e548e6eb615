//! Terminal dashboard for crime aggregations by neighborhood (bairro).
//!
//! The [`service::CrimeApi`] façade talks to the aggregation backend,
//! [`derive`] turns a snapshot into everything the view shows, and
//! [`state`] plus [`controller`] keep the actions and their results in
//! order. The view is a ratatui app with a Braille marker map.

pub mod app;
pub mod basemap;
pub mod braille;
pub mod cli;
pub mod client;
pub mod config;
pub mod controller;
pub mod derive;
pub mod format;
pub mod map;
pub mod models;
pub mod service;
pub mod state;
pub mod ui;
