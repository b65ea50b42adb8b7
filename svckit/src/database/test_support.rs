// Scripted stand-in for a RethinkDB server, driven over an in-memory pipe

use serde_json::Value;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::task::JoinHandle;

use super::protocol::{encode_frame, FrameHeader, PROTOCOL_JSON, VERSION_V0_4};

pub(crate) struct FakeServer {
    auth_key: String,
    script: Vec<Value>,
}

impl FakeServer {
    pub(crate) fn new(auth_key: &str) -> Self {
        Self {
            auth_key: auth_key.to_string(),
            script: Vec::new(),
        }
    }

    /// Queue the response body for the next query received
    pub(crate) fn respond(mut self, response: Value) -> Self {
        self.script.push(response);
        self
    }

    /// Returns the client end of the pipe and a handle resolving to every
    /// `(token, query)` the server received.
    pub(crate) fn spawn(self) -> (DuplexStream, JoinHandle<Vec<(u64, Value)>>) {
        let (client, mut server) = tokio::io::duplex(64 * 1024);

        let handle = tokio::spawn(async move {
            let mut received = Vec::new();

            assert_eq!(server.read_u32_le().await.unwrap(), VERSION_V0_4);
            let key_len = server.read_u32_le().await.unwrap() as usize;
            let mut key = vec![0u8; key_len];
            server.read_exact(&mut key).await.unwrap();
            assert_eq!(server.read_u32_le().await.unwrap(), PROTOCOL_JSON);

            if key != self.auth_key.as_bytes() {
                server
                    .write_all(b"ERROR: Incorrect authorization key.\n\0")
                    .await
                    .unwrap();
                return received;
            }
            server.write_all(b"SUCCESS\0").await.unwrap();

            for response in self.script {
                let header = match FrameHeader::read_from(&mut server).await {
                    Ok(header) => header,
                    Err(_) => break,
                };
                let mut body = vec![0u8; header.length as usize];
                server.read_exact(&mut body).await.unwrap();
                received.push((header.token, serde_json::from_slice(&body).unwrap()));

                let frame = encode_frame(header.token, &response).unwrap();
                server.write_all(&frame).await.unwrap();
            }

            received
        });

        (client, handle)
    }
}
