// Playback scheduling: frame bounds, the per-session state machine, the
// process-wide session manager, and the snapshot it exports.

pub mod bounds;
pub mod scheduler;
pub mod session;
pub mod snapshot;
