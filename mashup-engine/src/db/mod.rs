//! SQLite storage adapter

pub mod mashups;

pub use mashups::SqliteMashupStore;
