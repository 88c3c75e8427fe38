//! I/O infrastructure: stage hand-off, delegate fan-out, trajectory
//! persistence.

mod fanout;
mod synced_queue;
pub mod trajectory;

pub use fanout::Fanout;
pub use synced_queue::SyncedQueue;
