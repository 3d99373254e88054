//! Domain services used by the session engine and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own persistence and remote I/O so the session reducer can
//! stay pure and route handlers can stay focused on protocol translation.

pub mod store_memory;
pub mod store_pg;
pub mod story;
pub mod token;
