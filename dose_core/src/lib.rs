#![forbid(unsafe_code)]

//! Core domain model and scheduling engine for Dosekeeper.
//!
//! This crate provides:
//! - Domain types (medicines, dose slots, schedule views)
//! - Medicine stores (in-memory, JSON file)
//! - The due-dose scanner, its worker pool and the notification queue
//! - The daily reset task and the adherence calculator
//! - Boundary operations (toggle, add/update/delete, today's schedule)

pub mod types;
pub mod error;
pub mod config;
pub mod logging;
pub mod time;
pub mod clock;
pub mod store;
pub mod queue;
pub mod checker;
pub mod pool;
pub mod scanner;
pub mod reset;
pub mod adherence;
pub mod intake;
pub mod notifier;
pub mod engine;

// Re-export commonly used types
pub use error::{Error, Result};
pub use types::*;
pub use config::Config;
pub use clock::{Clock, ManualClock, SystemClock};
pub use store::{JsonFileStore, MedicineStore, MemoryStore};
pub use queue::NotificationQueue;
pub use pool::WorkerPool;
pub use scanner::DueDoseScanner;
pub use reset::{reset_daily, DailyResetTask, ResetReport};
pub use adherence::AdherenceCalculator;
pub use notifier::{dispatch_pending, LogNotifier, Notifier};
pub use engine::DoseEngine;
