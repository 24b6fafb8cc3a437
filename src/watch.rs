//! Watch runtime: events, editor bridge, and daemon.

mod editor_bridge;
mod events;
mod runtime;

pub use editor_bridge::{EditorSurface, NullEditor, TreeView};
pub use events::{SyncEvent, WatchConfig};
pub use runtime::{DaemonHandle, SyncDaemon};
