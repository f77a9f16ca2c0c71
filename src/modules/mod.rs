//! Cross-cutting services module
//!
//! Observability around the solver: structured events and the metrics they
//! feed.

pub mod events;
pub mod metrics;

pub use events::{
    AbortedEvent, AnomalyEvent, ChunkSolvedEvent, CounterEvent, EventDispatcher, EventHandler,
    GuessEvent, LoggingHandler, MetricsHandler, SampleEvent, SolvedEvent, SolverEvent,
    SubmitFailedEvent,
};
pub use metrics::{ChunkStats, MetricsCollector, MetricsSnapshot};
