// Async services: alert intake over WebSocket and outbound notifications.

pub mod intake;
pub mod listener;
pub mod notify;
