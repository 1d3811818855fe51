pub mod consumer;
pub mod dispatcher;
pub mod worker;

pub use consumer::{ConsumerConfig, ConsumerReport, QueueConsumer};
pub use dispatcher::{DispatchError, Dispatcher, DispatcherConfig};
pub use worker::{BatchOutcome, WorkKind, Worker, WorkerConfig};
