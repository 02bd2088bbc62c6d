//! # Studio Core Library
//!
//! Recurring bookings and tasks for a studio schedule: series templates are
//! expanded into concrete occurrences on demand, and edits made through one
//! occurrence are planned against the whole series.
//!
//! ## Features
//!
//! - **Lazy Expansion**: Daily, weekly and monthly series are walked only as
//!   far as the requested window, with exception dates suppressed
//! - **Scoped Edits**: Change or delete one occurrence, split a series at an
//!   occurrence, or rewrite the entire series
//! - **Atomic Plans**: Every write caused by one action lands together or
//!   not at all, and retries are harmless
//! - **Ordered Writes**: Plans for the same series apply in submission order
//! - **Double-Booking Checks**: Overlapping bookings of one resource are
//!   rejected before anything is written
//!
//! ## Core Modules
//!
//! - [`models`]: Bookings, tasks, series settings and mutation plans
//! - [`recurrence`]: Windows, occurrence walking and expansion
//! - [`series`]: Edit-scope planning and the scope prompt state
//! - [`coordinator`]: Ordered application of plans against a store
//! - [`conflict`]: Resource overlap detection
//! - [`repository`]: Storage trait with in-memory and SQLite backends
//! - [`db`]: Database connection and migration management
//! - [`error`]: Error types shared by every module
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use studio_core::{
//!     coordinator::SeriesCoordinator,
//!     db,
//!     error::CoreError,
//!     models::{Booking, Frequency, Recurrence},
//!     recurrence::Window,
//!     repository::{ItemStore, SqliteStore},
//! };
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), CoreError> {
//!     let pool = db::establish_connection("studio.db").await?;
//!     let coordinator = SeriesCoordinator::new(SqliteStore::<Booking>::new(pool));
//!
//!     let monday = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let class = Booking {
//!         title: "Morning yoga".to_string(),
//!         resource: Some("studio-a".to_string()),
//!         start_time: monday.and_hms_opt(9, 0, 0).unwrap(),
//!         end_time: monday.and_hms_opt(10, 0, 0).unwrap(),
//!         recurrence: Some(Recurrence::new(
//!             Frequency::Weekly,
//!             NaiveDate::from_ymd_opt(2024, 3, 25).unwrap(),
//!         )),
//!         ..Default::default()
//!     };
//!     coordinator.store().create_template(class).await?;
//!
//!     for instance in coordinator.expand_window(&Window::month_of(monday)?).await? {
//!         println!("{} at {}", instance.id, instance.item.start_time);
//!     }
//!     Ok(())
//! }
//! ```

pub mod conflict;
pub mod coordinator;
pub mod db;
pub mod error;
pub mod models;
pub mod recurrence;
pub mod repository;
pub mod series;

/// Fresh, time-ordered id for a new template or standalone record.
pub fn new_id() -> String {
    uuid::Uuid::now_v7().to_string()
}
