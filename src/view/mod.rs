// Derived views over cached API data.

pub mod bottom;

pub use bottom::{FieldValue, RepoPair, SortField, TieBreak, bottom_n, bottom_n_with, sort_repos};
