//! A small stateless pub-sub channel.
//!
//! Each [`EventHandler`] owns one receiver and an async callback. Any number of [`EventProducer`]s can publish into
//! it. Handlers only see the event itself, never engine state, so a slow or failing subscriber can delay its own
//! events but cannot block the request that published them beyond the channel buffer.
use std::{future::Future, pin::Pin, sync::Arc};

use log::*;
use tokio::{
    sync::mpsc,
    task::{JoinError, JoinSet},
};

pub type Handler<E> = Arc<dyn Fn(E) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

pub struct EventHandler<E: Send + Sync + 'static> {
    receiver: mpsc::Receiver<E>,
    sender: mpsc::Sender<E>,
    handler: Handler<E>,
}

impl<E: Send + Sync + 'static> EventHandler<E> {
    pub fn new(buffer_size: usize, handler: Handler<E>) -> Self {
        let (sender, receiver) = mpsc::channel(buffer_size);
        Self { receiver, sender, handler }
    }

    pub fn subscribe(&self) -> EventProducer<E> {
        EventProducer::new(self.sender.clone())
    }

    /// Runs until every producer has been dropped, then waits for in-flight callbacks to finish.
    pub async fn start_handler(mut self) {
        debug!("📬️ Starting event handler");
        // Only producers may keep the channel open.
        drop(self.sender);
        let mut callbacks = JoinSet::new();
        while let Some(event) = self.receiver.recv().await {
            trace!("📬️ Handling event");
            callbacks.spawn((self.handler)(event));
            while let Some(res) = callbacks.try_join_next() {
                log_callback_result(res);
            }
        }
        if !callbacks.is_empty() {
            debug!("📬️ Waiting for {} event callbacks to complete", callbacks.len());
        }
        while let Some(res) = callbacks.join_next().await {
            log_callback_result(res);
        }
        debug!("📬️ Event handler has shut down");
    }
}

fn log_callback_result(res: Result<(), JoinError>) {
    if let Err(e) = res {
        error!("📬️ An event callback did not complete. {e}");
    }
}

#[derive(Clone)]
pub struct EventProducer<E: Send + Sync> {
    sender: mpsc::Sender<E>,
}

impl<E: Send + Sync> EventProducer<E> {
    pub fn new(sender: mpsc::Sender<E>) -> Self {
        Self { sender }
    }

    pub async fn publish_event(&self, event: E) {
        if let Err(e) = self.sender.send(event).await {
            error!("📬️ Failed to send event: {e}");
        }
    }
}
