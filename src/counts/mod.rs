//! The long-form RDD count table, its construction and label-only updates.

pub mod aggregate;
pub mod groups;
pub mod table;

pub use aggregate::{aggregate_counts, explode_matches, Aggregation, Match};
pub use groups::{rejoin_groups, switch_group_column, update_groups, GroupMapping};
pub use table::{CountRow, CountTable, COUNT_COLUMNS, FILE_COUNT_TYPE};
