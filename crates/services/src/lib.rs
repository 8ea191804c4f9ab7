#![forbid(unsafe_code)]

pub mod error;
pub mod migration;
pub mod progress_service;

pub use microleet_core::Clock;

pub use error::{MigrationError, ProgressServiceError};
pub use migration::{MigrationGate, MigrationOutcome, MigrationState, migrate_legacy};
pub use progress_service::{DEFAULT_POINTS_AWARD, PreferencesUpdate, ProgressService};
