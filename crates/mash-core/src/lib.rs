// Library root: the optimistic action and reconciliation engine behind the
// battle-voting client, plus the configuration, persistence and event loop
// that host it.

pub mod app;
pub mod auth;
pub mod backend;
pub mod battle;
pub mod config;
pub mod coordinator;
pub mod counters;
pub mod db;
pub mod error;
pub mod format;
pub mod poller;
pub mod protocol;
pub mod session;
pub mod wallet;

#[cfg(test)]
pub(crate) mod testing;
