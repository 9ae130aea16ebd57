//! Domain types and invariants: tenant classification, projects, slugs.

pub mod error;
pub mod projects;
pub mod slug;
pub mod tenant;
