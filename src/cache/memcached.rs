//! memcached-backed cache store
//!
//! Talks the memcached ASCII protocol (`get` / `set`) directly over TCP. Each
//! configured server gets one lazily opened connection guarded by an async
//! mutex. A connection is only returned to its slot after a complete reply; one
//! that fails mid-exchange, or whose request is cancelled, is dropped and a new
//! one is opened on the next call. Nothing here retries: a transport failure surfaces once as
//! [`CacheError::Unavailable`] and the caller decides what to do with it.
//!
//! ## Key placement
//!
//! With several servers a key is routed by the SHA-256 of its bytes, so every
//! process sharing the same host list agrees on where an inbox lives.

use super::{CacheError, CacheStore, MailRecord, decode_records, encode_records};
use sha2::{Digest, Sha256};
use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufStream};
use tokio::net::TcpStream;
use tokio::sync::Mutex;

/// Longest key memcached accepts
const MAX_KEY_LEN: usize = 250;

/// Largest value accepted in a reply (memcached's default item size limit)
const MAX_VALUE_LEN: usize = 1024 * 1024;

type Connection = BufStream<TcpStream>;

pub struct MemcachedStore {
    servers: Vec<Server>,
    expiry_secs: u32,
}

struct Server {
    addr: String,
    conn: Mutex<Option<Connection>>,
}

impl MemcachedStore {
    /// Create a client for the given `host:port` list.
    ///
    /// `expiry_secs` is sent with every `set`; `0` means the value never
    /// expires (it may still be evicted).
    pub fn new<I, A>(hosts: I, expiry_secs: u32) -> Result<Self, CacheError>
    where
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let servers: Vec<Server> = hosts
            .into_iter()
            .map(|addr| Server {
                addr: addr.into(),
                conn: Mutex::new(None),
            })
            .collect();

        if servers.is_empty() {
            return Err(CacheError::NoServers);
        }

        Ok(Self {
            servers,
            expiry_secs,
        })
    }

    pub fn server_count(&self) -> usize {
        self.servers.len()
    }

    fn server_index(&self, key: &str) -> usize {
        if self.servers.len() == 1 {
            return 0;
        }
        let digest = Sha256::digest(key.as_bytes());
        let mut prefix = [0u8; 8];
        prefix.copy_from_slice(&digest[..8]);
        (u64::from_be_bytes(prefix) % self.servers.len() as u64) as usize
    }

    fn server_for(&self, key: &str) -> &Server {
        &self.servers[self.server_index(key)]
    }
}

impl CacheStore for MemcachedStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<MailRecord>>, CacheError> {
        validate_key(key)?;
        let server = self.server_for(key);
        log::debug!("memcached get {} via {}", key, server.addr);

        match server.fetch(key).await? {
            Some(data) => decode_records(&data).map(Some),
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, records: &[MailRecord]) -> Result<(), CacheError> {
        validate_key(key)?;
        let data = encode_records(records)?;
        let server = self.server_for(key);
        log::debug!(
            "memcached set {} ({} records, {} bytes) via {}",
            key,
            records.len(),
            data.len(),
            server.addr
        );

        server.store(key, &data, self.expiry_secs).await
    }
}

impl Server {
    async fn fetch(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut slot = self.conn.lock().await;
        let mut conn = self.checkout(&mut slot).await?;
        let result = get_value(&mut conn, key).await;
        self.checkin(&mut slot, conn, &result);
        result
    }

    async fn store(&self, key: &str, data: &[u8], expiry_secs: u32) -> Result<(), CacheError> {
        let mut slot = self.conn.lock().await;
        let mut conn = self.checkout(&mut slot).await?;
        let result = set_value(&mut conn, key, data, expiry_secs).await;
        self.checkin(&mut slot, conn, &result);
        result
    }

    /// Take the idle connection out of the slot, or open a new one.
    ///
    /// The slot stays empty while a request is in flight, so a request whose
    /// future is dropped closes its socket instead of leaving an unread reply
    /// for the next caller.
    async fn checkout(&self, slot: &mut Option<Connection>) -> Result<Connection, CacheError> {
        if let Some(conn) = slot.take() {
            return Ok(conn);
        }
        log::debug!("connecting to memcached at {}", self.addr);
        let stream = TcpStream::connect(&self.addr).await?;
        stream.set_nodelay(true)?;
        Ok(BufStream::new(stream))
    }

    /// Return a connection to the slot unless the exchange left it out of step.
    fn checkin<T>(
        &self,
        slot: &mut Option<Connection>,
        conn: Connection,
        result: &Result<T, CacheError>,
    ) {
        match result {
            Err(err) if desyncs_connection(err) => {
                log::warn!("dropping memcached connection to {}", self.addr);
            }
            _ => *slot = Some(conn),
        }
    }
}

/// Errors after which the stream position can no longer be trusted.
fn desyncs_connection(err: &CacheError) -> bool {
    matches!(err, CacheError::Unavailable(_) | CacheError::Protocol(_))
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    let bad_byte = key
        .bytes()
        .any(|b| b.is_ascii_whitespace() || b.is_ascii_control());
    if key.is_empty() || key.len() > MAX_KEY_LEN || bad_byte {
        return Err(CacheError::InvalidKey(key.to_string()));
    }
    Ok(())
}

async fn read_line(conn: &mut Connection) -> Result<String, CacheError> {
    let mut line = String::new();
    let read = conn.read_line(&mut line).await?;
    if read == 0 {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "memcached closed the connection",
        )
        .into());
    }
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

/// Map `ERROR`, `CLIENT_ERROR ...` and `SERVER_ERROR ...` replies.
fn server_error(line: &str) -> Option<CacheError> {
    if line == "ERROR" || line.starts_with("CLIENT_ERROR") || line.starts_with("SERVER_ERROR") {
        Some(CacheError::Protocol(line.to_string()))
    } else {
        None
    }
}

fn unexpected_reply(line: &str) -> CacheError {
    server_error(line).unwrap_or_else(|| CacheError::Protocol(format!("unexpected reply `{line}`")))
}

/// Parse `VALUE <key> <flags> <bytes>` and return the byte count.
fn parse_value_header(line: &str, key: &str) -> Result<usize, CacheError> {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next(), parts.next(), parts.next()) {
        (Some("VALUE"), Some(found), Some(_flags), Some(bytes)) if found == key => {
            match bytes.parse::<usize>() {
                Ok(len) if len <= MAX_VALUE_LEN => Ok(len),
                Ok(_) => Err(CacheError::Protocol(format!(
                    "value larger than {MAX_VALUE_LEN} bytes in `{line}`"
                ))),
                Err(_) => Err(CacheError::Protocol(format!("bad value length in `{line}`"))),
            }
        }
        _ => Err(unexpected_reply(line)),
    }
}

async fn get_value(conn: &mut Connection, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
    conn.write_all(format!("get {key}\r\n").as_bytes()).await?;
    conn.flush().await?;

    let header = read_line(conn).await?;
    if header == "END" {
        return Ok(None);
    }

    let len = parse_value_header(&header, key)?;
    let block_len = len
        .checked_add(2)
        .ok_or_else(|| CacheError::Protocol(format!("bad value length in `{header}`")))?;
    let mut data = vec![0u8; block_len];
    conn.read_exact(&mut data).await?;
    if !data.ends_with(b"\r\n") {
        return Err(CacheError::Protocol("value block not terminated by CRLF".into()));
    }
    data.truncate(len);

    let end = read_line(conn).await?;
    if end != "END" {
        return Err(unexpected_reply(&end));
    }

    Ok(Some(data))
}

async fn set_value(
    conn: &mut Connection,
    key: &str,
    data: &[u8],
    expiry_secs: u32,
) -> Result<(), CacheError> {
    let mut command = format!("set {key} 0 {expiry_secs} {}\r\n", data.len()).into_bytes();
    command.extend_from_slice(data);
    command.extend_from_slice(b"\r\n");
    conn.write_all(&command).await?;
    conn.flush().await?;

    let reply = read_line(conn).await?;
    match reply.as_str() {
        "STORED" => Ok(()),
        "NOT_STORED" => Err(CacheError::NotStored(key.to_string())),
        other => Err(unexpected_reply(other)),
    }
}
