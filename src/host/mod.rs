//! Host side of the IPC bridge.
//!
//! - [`affinity`]: the single designated thread host-state operations run on
//! - [`endpoint`]: the loopback HTTP endpoint and operation dispatch
//! - [`workspace`]: the in-memory reference workspace and its operations

pub mod affinity;
pub mod endpoint;
pub mod workspace;

pub use affinity::AffinityExecutor;
pub use endpoint::{Affinity, HostEndpoint, HostOperation, OperationTable};
pub use workspace::{SharedWorkspace, Workspace};
