//! shoutwall: a real-time broadcast hub.
//!
//! Clients connect over WebSocket, submit short text messages, and every
//! live connection receives the fan-out: styled messages, presence counts,
//! and periodically rotating topics. The interesting parts are admission
//! control and the connection registry ([`registry`]), the grey-list rate
//! limiter ([`ratelimit`]), and topic scheduling ([`topics`]).

pub mod config;
pub mod connection;
pub mod fanout;
pub mod ratelimit;
pub mod registry;
pub mod server;
pub mod style;
pub mod topics;
pub mod web;
