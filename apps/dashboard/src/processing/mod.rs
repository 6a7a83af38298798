// Resume processing: the status state machine and the tokio driver that
// polls the backend on its behalf.

pub mod coordinator;
pub mod machine;

pub use coordinator::ProcessingCoordinator;
pub use machine::{PollConfig, ProcessingSnapshot};
