//! PAI Events - the at-least-once publish/subscribe Bus (spec.md §2 row B).
//!
//! The Bus carries task dispatch, responses, heartbeats, control signals, and
//! streamed actions between the Agent Runtime and everything that watches it.
//! Delivery is at-least-once: subscribers must be idempotent on duplicate
//! task ids (spec.md §5 "Consistency and idempotence").
//!
//! # Architecture
//!
//! Topics are plain strings (`agent:<type>:tasks`, `agent:responses`, ...).
//! Publishing never blocks on subscriber processing; each subscription gets
//! its own lagging-tolerant receiver, so a slow consumer drops the oldest
//! buffered messages rather than stalling a publisher (spec.md §5
//! "Backpressure").

mod bus;
mod memory;

pub use self::bus::{no_subscribers, Bus, Subscription};
pub use self::memory::InMemoryBus;
