pub mod aggregate;
pub mod api;
pub mod cli;
pub mod config;
pub mod cutoff;
pub mod db;
pub mod display;
pub mod error;
pub mod events;
pub mod filters;
pub mod notify;
pub mod sources;
pub mod store;
pub mod watcher;

pub use error::{JobwatchError, Result};
pub use watcher::{FilterWatcher, WatcherOptions, WatcherSnapshot, WatcherSources};
