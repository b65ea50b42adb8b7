use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

use super::connection::Transport;
use super::protocol::{control_query, QueryType, Response, ResponseType};
use crate::errors::ThinkerError;

/// Lazy, single-pass sequence of query results
#[async_trait]
pub trait DocumentCursor: Send {
    /// Next value, `None` once the sequence is exhausted. Change feeds never
    /// end on their own.
    async fn next(&mut self) -> Option<Result<Value, ThinkerError>>;

    /// Release the server-side cursor if it is still open
    async fn close(&mut self) -> Result<(), ThinkerError>;

    fn is_feed(&self) -> bool;
}

/// Cursor over the responses to one query token
pub struct ResponseCursor {
    transport: Arc<Mutex<Transport>>,
    token: u64,
    buffer: VecDeque<Value>,
    open: bool,
    feed: bool,
}

impl ResponseCursor {
    pub(crate) fn new(
        transport: Arc<Mutex<Transport>>,
        token: u64,
        kind: ResponseType,
        response: Response,
    ) -> Self {
        let mut cursor = Self {
            transport,
            token,
            buffer: VecDeque::new(),
            open: false,
            feed: false,
        };
        cursor.absorb(kind, response);
        cursor
    }

    fn absorb(&mut self, kind: ResponseType, response: Response) {
        self.feed |= response.is_feed();

        match kind {
            ResponseType::SuccessAtom => {
                // An atom holding an array is iterated like a sequence
                for value in response.results {
                    match value {
                        Value::Array(items) => self.buffer.extend(items),
                        other => self.buffer.push_back(other),
                    }
                }
                self.open = false;
            }
            ResponseType::SuccessSequence => {
                self.buffer.extend(response.results);
                self.open = false;
            }
            ResponseType::SuccessPartial => {
                self.buffer.extend(response.results);
                self.open = true;
            }
            _ => {
                self.open = false;
            }
        }
    }

    async fn fetch_more(&mut self) -> Result<(), ThinkerError> {
        debug!(token = self.token, "Requesting next batch");
        let response = {
            let mut transport = self.transport.lock().await;
            transport
                .send(self.token, &control_query(QueryType::Continue))
                .await?;
            transport.receive(self.token).await?
        };

        let (kind, response) = response.check()?;
        self.absorb(kind, response);
        Ok(())
    }
}

#[async_trait]
impl DocumentCursor for ResponseCursor {
    async fn next(&mut self) -> Option<Result<Value, ThinkerError>> {
        loop {
            if let Some(value) = self.buffer.pop_front() {
                return Some(Ok(value));
            }
            if !self.open {
                return None;
            }
            if let Err(e) = self.fetch_more().await {
                self.open = false;
                return Some(Err(e));
            }
        }
    }

    async fn close(&mut self) -> Result<(), ThinkerError> {
        self.buffer.clear();
        if !self.open {
            return Ok(());
        }
        self.open = false;

        debug!(token = self.token, "Stopping cursor");
        let mut transport = self.transport.lock().await;
        transport
            .send(self.token, &control_query(QueryType::Stop))
            .await?;
        let response = transport.receive(self.token).await?;
        response.check().map(|_| ())
    }

    fn is_feed(&self) -> bool {
        self.feed
    }
}
