//! # tempora-core
//!
//! Core types shared by every tempora crate.
//!
//! This crate knows nothing about the storage engine. It provides:
//! - Column values and ordered row images passed through the capture path
//! - Entity shape descriptions produced by schema introspection
//! - History naming rules (`<live>_history`, validity range columns, index names)
//! - Registry entries, history rows, and change events
//! - A `Clock` abstraction so transaction timestamps are injectable
//! - Cross-cutting error types

pub mod clock;
pub mod errors;
pub mod history;
pub mod naming;
pub mod row;
pub mod schema;
pub mod value;

pub use clock::{Clock, ManualClock, SystemClock};
pub use errors::CoreError;
pub use history::{ChangeEvent, HistoryRow, MutationKind, RegistryEntry};
pub use naming::HistoryNaming;
pub use row::RowImage;
pub use schema::{ColumnInfo, EntityShape, ParentLink};
pub use value::Value;
