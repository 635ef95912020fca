pub mod dispatch_scheduler;
pub mod message_dispatcher;

pub use dispatch_scheduler::{DispatchScheduler, SchedulerError};
pub use message_dispatcher::{BatchDispatcher, DispatchError, DispatcherConfig, MessageDispatcher};
