//! Sprint health signals: a pure risk/confidence engine over a sprint setup and
//! a bounded local history of computed snapshots.

pub mod advice;
pub mod clock;
pub mod config;
pub mod forecast;
pub mod health;
pub mod history;
pub mod models;
pub mod notes;
pub mod report;
pub mod setup;
pub mod signals;
pub mod storage;
pub mod xp;
