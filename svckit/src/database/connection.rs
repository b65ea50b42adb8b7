use async_trait::async_trait;
use serde_json::{Map, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

use super::cursor::{DocumentCursor, ResponseCursor};
use super::protocol::{self, FrameHeader, Response};
use super::query_builder::Term;
use crate::errors::ThinkerError;
use crate::types::{Document, IndexFilter, TableTarget, WriteSummary};

/// Database operations the commands are built from
#[async_trait]
pub trait DatabaseConnection: Send + Sync {
    async fn list_databases(&self) -> Result<Vec<String>, ThinkerError>;
    async fn create_database(&self, db: &str) -> Result<(), ThinkerError>;
    async fn list_tables(&self, db: &str) -> Result<Vec<String>, ThinkerError>;
    async fn create_table(&self, db: &str, table: &str) -> Result<(), ThinkerError>;
    async fn list_indexes(&self, target: &TableTarget) -> Result<Vec<String>, ThinkerError>;
    async fn create_index(&self, target: &TableTarget, index: &str) -> Result<(), ThinkerError>;

    async fn insert(
        &self,
        target: &TableTarget,
        document: &Document,
    ) -> Result<WriteSummary, ThinkerError>;

    /// Index lookup when a filter is given, full table scan otherwise
    async fn fetch(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError>;

    /// Change feed including the initial matching rows
    async fn follow(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError>;

    /// Delete matching rows (all rows without a filter), returning old values
    async fn delete(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<WriteSummary, ThinkerError>;

    /// Rows of `rethinkdb.server_status`, one per cluster member
    async fn server_status(&self) -> Result<Vec<Value>, ThinkerError>;

    async fn close(&self) -> Result<(), ThinkerError>;

    fn address(&self) -> &str;
}

/// Anything a session can run over: TCP in production, in-memory pipes in tests
pub trait ByteStream: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> ByteStream for T {}

#[derive(Debug, Clone, Default)]
pub struct ConnectOptions {
    pub address: String,
    pub auth_key: String,
    /// Default database sent as the `db` global optarg
    pub database: Option<String>,
}

/// Framed query/response exchange over one stream
pub(crate) struct Transport {
    stream: Box<dyn ByteStream>,
}

impl Transport {
    pub(crate) async fn send(&mut self, token: u64, query: &Value) -> Result<(), ThinkerError> {
        let frame = protocol::encode_frame(token, query)?;
        self.stream
            .write_all(&frame)
            .await
            .map_err(|e| ThinkerError::ConnectionError(format!("Failed to send query: {}", e)))?;
        self.stream
            .flush()
            .await
            .map_err(|e| ThinkerError::ConnectionError(format!("Failed to send query: {}", e)))
    }

    /// Read frames until the one answering `token` arrives
    pub(crate) async fn receive(&mut self, token: u64) -> Result<Response, ThinkerError> {
        loop {
            let header = FrameHeader::read_from(&mut self.stream).await?;

            let mut body = vec![0u8; header.length as usize];
            self.stream.read_exact(&mut body).await.map_err(|e| {
                ThinkerError::ConnectionError(format!("Failed to read response body: {}", e))
            })?;

            if header.token != token {
                debug!(
                    expected = token,
                    received = header.token,
                    "Skipping response for another query"
                );
                continue;
            }

            return Response::parse(&body);
        }
    }

    async fn shutdown(&mut self) -> Result<(), ThinkerError> {
        self.stream.shutdown().await.map_err(ThinkerError::from)
    }
}

/// Session with one RethinkDB server over the V0_4 JSON protocol
pub struct RethinkConnection {
    transport: Arc<Mutex<Transport>>,
    next_token: AtomicU64,
    address: String,
    database: Option<String>,
}

impl RethinkConnection {
    /// Dial the server and perform the handshake
    pub async fn connect(options: &ConnectOptions) -> Result<Self, ThinkerError> {
        info!("Connecting to RethinkDB at {}", options.address);

        let stream = TcpStream::connect(&options.address).await.map_err(|e| {
            error!("Failed to connect to RethinkDB: {}", e);
            ThinkerError::ConnectionError(format!(
                "Connection to {} failed: {}",
                options.address, e
            ))
        })?;

        if let Err(e) = stream.set_nodelay(true) {
            debug!("Could not set TCP_NODELAY: {}", e);
        }

        Self::handshake(stream, options).await
    }

    /// Perform the handshake over an already-open stream
    pub async fn handshake<S: ByteStream + 'static>(
        mut stream: S,
        options: &ConnectOptions,
    ) -> Result<Self, ThinkerError> {
        stream
            .write_all(&protocol::handshake_bytes(&options.auth_key))
            .await
            .map_err(|e| ThinkerError::ConnectionError(format!("Handshake failed: {}", e)))?;
        stream
            .flush()
            .await
            .map_err(|e| ThinkerError::ConnectionError(format!("Handshake failed: {}", e)))?;

        protocol::read_handshake_reply(&mut stream).await?;
        info!("Connected to RethinkDB at {}", options.address);

        Ok(Self {
            transport: Arc::new(Mutex::new(Transport {
                stream: Box::new(stream),
            })),
            next_token: AtomicU64::new(1),
            address: options.address.clone(),
            database: options.database.clone(),
        })
    }

    fn global_optargs(&self) -> Map<String, Value> {
        let mut optargs = Map::new();
        if let Some(db) = &self.database {
            optargs.insert("db".to_string(), Term::db(db).to_json());
        }
        optargs
    }

    /// Start a query and return a cursor over its results
    pub async fn run(&self, term: &Term) -> Result<ResponseCursor, ThinkerError> {
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let query = protocol::start_query(term.to_json(), self.global_optargs());
        debug!(token, term_type = ?term.kind(), "Running query");

        let response = {
            let mut transport = self.transport.lock().await;
            transport.send(token, &query).await?;
            transport.receive(token).await?
        };

        let (kind, response) = response.check()?;
        Ok(ResponseCursor::new(
            self.transport.clone(),
            token,
            kind,
            response,
        ))
    }

    /// Run a query and drain every result
    pub async fn run_all(&self, term: &Term) -> Result<Vec<Value>, ThinkerError> {
        let mut cursor = self.run(term).await?;
        let mut values = Vec::new();
        while let Some(value) = cursor.next().await {
            values.push(value?);
        }
        Ok(values)
    }

    pub async fn run_strings(&self, term: &Term) -> Result<Vec<String>, ThinkerError> {
        self.run_all(term)
            .await?
            .into_iter()
            .map(|value| match value {
                Value::String(s) => Ok(s),
                other => Err(ThinkerError::QueryError(format!(
                    "Expected a string, got {}",
                    other
                ))),
            })
            .collect()
    }

    pub async fn run_write(&self, term: &Term) -> Result<WriteSummary, ThinkerError> {
        let value = self
            .run_all(term)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ThinkerError::QueryError("Empty write response".to_string()))?;

        let summary: WriteSummary = serde_json::from_value(value)
            .map_err(|e| ThinkerError::QueryError(format!("Malformed write response: {}", e)))?;
        summary.into_result()
    }
}

fn table_term(target: &TableTarget) -> Term {
    Term::db(&target.db).table(&target.table)
}

#[async_trait]
impl DatabaseConnection for RethinkConnection {
    async fn list_databases(&self) -> Result<Vec<String>, ThinkerError> {
        self.run_strings(&Term::db_list()).await
    }

    async fn create_database(&self, db: &str) -> Result<(), ThinkerError> {
        self.run_write(&Term::db_create(db)).await.map(|_| ())
    }

    async fn list_tables(&self, db: &str) -> Result<Vec<String>, ThinkerError> {
        self.run_strings(&Term::db(db).table_list()).await
    }

    async fn create_table(&self, db: &str, table: &str) -> Result<(), ThinkerError> {
        self.run_write(&Term::db(db).table_create(table))
            .await
            .map(|_| ())
    }

    async fn list_indexes(&self, target: &TableTarget) -> Result<Vec<String>, ThinkerError> {
        self.run_strings(&table_term(target).index_list()).await
    }

    async fn create_index(&self, target: &TableTarget, index: &str) -> Result<(), ThinkerError> {
        self.run_write(&table_term(target).index_create(index))
            .await
            .map(|_| ())
    }

    async fn insert(
        &self,
        target: &TableTarget,
        document: &Document,
    ) -> Result<WriteSummary, ThinkerError> {
        self.run_write(&table_term(target).insert(document)).await
    }

    async fn fetch(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError> {
        let table = table_term(target);
        let term = match filter {
            Some(filter) => table.get_all(filter),
            None => table,
        };
        Ok(Box::new(self.run(&term).await?))
    }

    async fn follow(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<Box<dyn DocumentCursor>, ThinkerError> {
        let table = table_term(target);
        let term = match filter {
            Some(filter) => table.filter_eq(filter).changes(true),
            None => table.changes(true),
        };
        Ok(Box::new(self.run(&term).await?))
    }

    async fn delete(
        &self,
        target: &TableTarget,
        filter: Option<&IndexFilter>,
    ) -> Result<WriteSummary, ThinkerError> {
        let table = table_term(target);
        let term = match filter {
            Some(filter) => table.get_all(filter).delete(true),
            None => table.delete(true),
        };
        self.run_write(&term).await
    }

    async fn server_status(&self) -> Result<Vec<Value>, ThinkerError> {
        self.run_all(&Term::db("rethinkdb").table("server_status"))
            .await
    }

    async fn close(&self) -> Result<(), ThinkerError> {
        debug!("Closing connection to {}", self.address);
        self.transport.lock().await.shutdown().await
    }

    fn address(&self) -> &str {
        &self.address
    }
}
