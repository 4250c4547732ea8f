//! taskcast server library.
//!
//! Exposes the broadcast core and the HTTP/WebSocket server for use in
//! tests and embedding. The server keeps an in-memory task store, fans every
//! newly created task out to all live subscriber sessions, and serves the
//! same store over plain JSON endpoints.

pub mod broadcast;
pub mod config;
pub mod server;
pub mod sessions;
pub mod store;
