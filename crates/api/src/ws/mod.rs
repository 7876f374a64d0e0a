//! WebSocket change feed.
//!
//! Clients subscribe to one table (and optionally one row) and receive each
//! committed change as a JSON text frame.

pub mod changes;
