//! Timeout-bounded waiters on a bus topic
//!
//! A [`Collector`] waits for one event and is gone afterwards. A
//! [`BatchCollector`] keeps its subscription open across several waits and is
//! torn down explicitly.

mod batch;
mod single;

pub use batch::BatchCollector;
pub use single::Collector;
