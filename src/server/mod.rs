pub mod gateway;
pub mod rejection;
pub mod routes;
pub mod state;
pub mod supervisor;

pub use gateway::Gateway;
pub use rejection::handle_rejection;
pub use state::{GatewayState, GatewayStatus, ListenerPhase, PortConflictRecord, Transition};
pub use supervisor::{HealthSupervisor, SupervisedListener, SupervisorHandle};
