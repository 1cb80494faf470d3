//! Offline cache manager for the Agenda Bravo time-tracking app.
//!
//! Intercepts the app's requests and serves them cache-first (static assets) or
//! network-first (API, auth and entry pages) from a versioned, multi-bucket
//! response cache, so the app keeps working without connectivity.

pub mod cache;
pub mod classify;
pub mod config;
pub mod event;
pub mod host;
pub mod http;
pub mod network;
pub mod registration;
pub mod worker;

#[cfg(test)]
mod test_support;
