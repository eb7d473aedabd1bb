//! Relationship snapshot capture and the queries the explorer runs over it.

mod capture;
mod query;

pub use capture::capture;
pub use query::{
    children_for_relation, find_direct_relation, find_link_tables_between, JunctionCandidate,
};
