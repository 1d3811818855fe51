pub mod publisher;
pub mod queue;
pub mod signer;
pub mod telemetry;

pub use publisher::HttpEventPublisher;
pub use queue::InMemoryWorkQueue;
pub use signer::{HmacChannelSigner, InMemoryDispatchRegistry};
pub use telemetry::init_tracing;
