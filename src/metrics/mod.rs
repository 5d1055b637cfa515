//! Metrics emission for sleet.
//!
//! Events are defined in [`events`] and recorded through the `metrics`
//! facade. Without an installed recorder they only produce trace logs.

pub mod events;

/// Emit an internal event.
///
/// ```ignore
/// use sleet::metrics::events::ChunkIngested;
///
/// emit!(ChunkIngested { rows: 100, duration, target: "trips".into() });
/// ```
#[macro_export]
macro_rules! emit {
    ($event:expr) => {
        $crate::metrics::events::InternalEvent::emit($event)
    };
}
