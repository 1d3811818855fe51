pub mod realtime;
pub mod workflow;

pub use realtime::auth::{RealtimeAuthProvider, StaticAuthProvider};
pub use realtime::transport::{
    DisconnectReason, RealtimeTransport, SubscriptionEvent, TransportError, TransportStatus,
};
pub use workflow::backend::{BackendError, SetupBackend};
pub use workflow::machine::{
    FailureStage, SetupAction, SetupInput, SetupMachine, SetupMachineConfig, SetupState,
    WorkflowError,
};
pub use workflow::runner::{SetupOutcome, SetupRunner};
