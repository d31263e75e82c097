//! Queue actor: the single serialized owner of a [`QueueStore`].
//!
//! Each queue runs one tokio task draining an unbounded mailbox. Callers hold
//! a cloneable [`QueueHandle`], submit a command carrying a oneshot reply
//! channel and await the reply. Because the task applies one command at a time,
//! the scan-and-claim step of a receive is atomic with respect to every other
//! operation on the same queue.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::SqsError;
use crate::message::Message;
use crate::queue::{QueueAttributes, QueueStore};

/// Commands accepted by a queue actor
#[derive(Debug)]
pub(crate) enum QueueCommand {
    Enqueue {
        body: String,
        delay_seconds: Option<i64>,
        reply: oneshot::Sender<Result<Message, SqsError>>,
    },
    Receive {
        max_number_of_messages: i64,
        visibility_timeout: Option<i64>,
        reply: oneshot::Sender<Result<Vec<Message>, SqsError>>,
    },
    Delete {
        receipt_handle: String,
        reply: oneshot::Sender<Result<(), SqsError>>,
    },
    ChangeVisibility {
        receipt_handle: String,
        visibility_timeout: i64,
        reply: oneshot::Sender<Result<(), SqsError>>,
    },
    Describe {
        reply: oneshot::Sender<QueueAttributes>,
    },
    SetAttributes {
        attributes: HashMap<String, String>,
        reply: oneshot::Sender<Result<(), SqsError>>,
    },
    Purge {
        reply: oneshot::Sender<usize>,
    },
    Shutdown,
}

/// Cloneable reference to a running queue actor
#[derive(Debug, Clone)]
pub struct QueueHandle {
    name: Arc<str>,
    url: Arc<str>,
    sender: mpsc::UnboundedSender<QueueCommand>,
}

impl QueueHandle {
    /// Start an actor owning `store` and return its handle.
    ///
    /// Must be called from within a tokio runtime.
    pub fn spawn(store: QueueStore, url: impl Into<String>, clock: Arc<dyn Clock>) -> Self {
        let url: String = url.into();
        let (sender, receiver) = mpsc::unbounded_channel();
        let handle = Self {
            name: Arc::from(store.name()),
            url: Arc::from(url),
            sender,
        };
        tokio::spawn(run(store, clock, receiver));
        handle
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub async fn enqueue(
        &self,
        body: String,
        delay_seconds: Option<i64>,
    ) -> Result<Message, SqsError> {
        self.request(|reply| QueueCommand::Enqueue {
            body,
            delay_seconds,
            reply,
        })
        .await?
    }

    pub async fn receive(
        &self,
        max_number_of_messages: i64,
        visibility_timeout: Option<i64>,
    ) -> Result<Vec<Message>, SqsError> {
        self.request(|reply| QueueCommand::Receive {
            max_number_of_messages,
            visibility_timeout,
            reply,
        })
        .await?
    }

    pub async fn delete(&self, receipt_handle: impl Into<String>) -> Result<(), SqsError> {
        self.request(|reply| QueueCommand::Delete {
            receipt_handle: receipt_handle.into(),
            reply,
        })
        .await?
    }

    pub async fn change_visibility(
        &self,
        receipt_handle: impl Into<String>,
        visibility_timeout: i64,
    ) -> Result<(), SqsError> {
        self.request(|reply| QueueCommand::ChangeVisibility {
            receipt_handle: receipt_handle.into(),
            visibility_timeout,
            reply,
        })
        .await?
    }

    pub async fn describe(&self) -> Result<QueueAttributes, SqsError> {
        self.request(|reply| QueueCommand::Describe { reply }).await
    }

    pub async fn set_attributes(
        &self,
        attributes: HashMap<String, String>,
    ) -> Result<(), SqsError> {
        self.request(|reply| QueueCommand::SetAttributes { attributes, reply })
            .await?
    }

    pub async fn purge(&self) -> Result<usize, SqsError> {
        self.request(|reply| QueueCommand::Purge { reply }).await
    }

    /// Ask the actor to stop once the commands already queued are processed.
    pub(crate) fn shutdown(&self) {
        let _ = self.sender.send(QueueCommand::Shutdown);
    }

    /// Send a command and wait for the reply. A stopped actor means the queue
    /// was deleted underneath the caller.
    async fn request<T>(
        &self,
        command: impl FnOnce(oneshot::Sender<T>) -> QueueCommand,
    ) -> Result<T, SqsError> {
        let (reply, response) = oneshot::channel();
        self.sender
            .send(command(reply))
            .map_err(|_| SqsError::non_existent_queue())?;
        response.await.map_err(|_| SqsError::non_existent_queue())
    }
}

async fn run(
    mut store: QueueStore,
    clock: Arc<dyn Clock>,
    mut mailbox: mpsc::UnboundedReceiver<QueueCommand>,
) {
    info!(queue = %store.name(), "Starting queue actor");

    while let Some(command) = mailbox.recv().await {
        let now = clock.now();
        match command {
            QueueCommand::Enqueue {
                body,
                delay_seconds,
                reply,
            } => {
                let _ = reply.send(store.enqueue(body, delay_seconds, now));
            }
            QueueCommand::Receive {
                max_number_of_messages,
                visibility_timeout,
                reply,
            } => {
                let result = store.receive(max_number_of_messages, visibility_timeout, now);
                if let Ok(messages) = &result {
                    debug!(queue = %store.name(), count = messages.len(), "Claimed messages");
                }
                let _ = reply.send(result);
            }
            QueueCommand::Delete {
                receipt_handle,
                reply,
            } => {
                let _ = reply.send(store.delete(&receipt_handle));
            }
            QueueCommand::ChangeVisibility {
                receipt_handle,
                visibility_timeout,
                reply,
            } => {
                let _ = reply.send(store.change_visibility(
                    &receipt_handle,
                    visibility_timeout,
                    now,
                ));
            }
            QueueCommand::Describe { reply } => {
                let _ = reply.send(store.describe(now));
            }
            QueueCommand::SetAttributes { attributes, reply } => {
                let _ = reply.send(store.set_attributes(&attributes, now));
            }
            QueueCommand::Purge { reply } => {
                let purged = store.purge();
                info!(queue = %store.name(), purged, "Purged queue");
                let _ = reply.send(purged);
            }
            QueueCommand::Shutdown => break,
        }
    }

    info!(queue = %store.name(), remaining = store.len(), "Queue actor stopped");
}
