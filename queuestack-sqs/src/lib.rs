//! In-memory SQS-compatible message broker
//!
//! Each queue is served by its own actor task that owns the queue's messages
//! exclusively. A [`QueueRegistry`] maps queue URLs to those actors, and the
//! [`handlers`] module exposes everything over the SQS query protocol:
//! - CreateQueue, DeleteQueue, GetQueueUrl, ListQueues
//! - GetQueueAttributes, SetQueueAttributes, PurgeQueue
//! - SendMessage, ReceiveMessage, DeleteMessage, ChangeMessageVisibility
//! - SendMessageBatch, DeleteMessageBatch

pub mod actor;
pub mod batch;
pub mod clock;
pub mod error;
pub mod handlers;
pub mod message;
pub mod params;
pub mod queue;
pub mod registry;
pub mod validation;


pub use actor::QueueHandle;
pub use clock::{Clock, ManualClock, SystemClock};
pub use error::SqsError;
pub use handlers::{handle_request, router, SqsState};
pub use message::Message;
pub use params::Params;
pub use queue::{QueueAttributes, QueueConfig};
pub use registry::{QueueRegistry, RegistryConfig};
