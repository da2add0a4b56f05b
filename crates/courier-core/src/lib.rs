pub mod broker;
pub mod config;
pub mod error;
pub mod mail;
pub mod store;
pub mod task;

pub use broker::{Broker, BrokerError, QueueStats};
pub use config::CourierConfig;
pub use error::{CourierError, Result};
pub use mail::{Email, MailError, Mailer};
pub use store::{CreateVerifyEmailParams, Store, StoreError, User, VerifyEmail};
pub use task::{
    EnqueueInfo, Task, TaskContext, TaskError, TaskHandler, TaskOptions, TaskPayload, TaskState,
};
