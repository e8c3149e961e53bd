// src/schema/mod.rs

pub mod types;

pub use types::{arrow_type_for, column_kind, unmapped_columns, ColumnKind, RATING_COLUMNS};
