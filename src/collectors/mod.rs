//! Sample sources.
//!
//! - **Synthetic**: randomised IPC contention for demos and soak runs
//! - **Sockets**: established TCP connections from `/proc/net/tcp{,6}`
//! - **Procs**: process-name lookup used to label pipes with live PIDs

pub mod procs;
pub mod sockets;
pub mod synthetic;

pub use procs::{find_pid_by_markers, DEFAULT_MARKERS, FALLBACK_PID};
pub use sockets::{established_connections, Connection};
pub use synthetic::SyntheticSampler;
