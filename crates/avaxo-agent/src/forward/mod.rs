//! TCP forwarding engine
//!
//! A forward command names a target and a manager endpoint. The engine dials
//! both and splices them into a relay: two independent copy tasks, one per
//! direction, each closing the write side of its destination once its source
//! reaches end-of-stream. Relays are never registered anywhere and cannot be
//! cancelled; they end when both peers have closed.

mod engine;
mod relay;

pub use engine::{ForwardEngine, ForwardError, Role};
pub use relay::{Direction, RelayHandle, RelayStats, Transfer};
