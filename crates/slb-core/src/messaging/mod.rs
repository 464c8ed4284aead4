//! Outbound messaging: the port adapters implement, the per-command outbox
//! and the dispatcher that drains it.

pub mod dispatch;
pub mod port;
pub mod types;
