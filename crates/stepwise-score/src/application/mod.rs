//! Read-side helpers for hosts.

pub mod query_handlers;
