//! Amora: multi-tenant host for published romantic landing pages.

pub mod application;
pub mod cache;
pub mod config;
pub mod domain;
pub mod infra;
pub mod presentation;
pub mod tenancy;
