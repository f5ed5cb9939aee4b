//! NetworkSink - streams chunks to a TCP peer

use bytes::{BufMut, BytesMut};
use contracts::{fault_channel, Chunk, ContractError, DataSink, FaultReceiver, FaultSender};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::task::JoinHandle;
use tracing::{debug, instrument, warn};

/// How chunks are delimited on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Framing {
    /// Payload bytes as-is
    #[default]
    Raw,
    /// Payload preceded by its length as a big-endian u32
    LengthPrefixed,
}

/// Configuration for NetworkSink
#[derive(Debug, Clone)]
pub struct NetworkSinkConfig {
    /// Target address
    pub addr: SocketAddr,
    /// Wire framing
    pub framing: Framing,
    /// Connection establishment timeout
    pub connect_timeout: Duration,
}

impl NetworkSinkConfig {
    /// Create config from params map
    pub fn from_params(params: &HashMap<String, String>) -> Result<Self, String> {
        let addr_str = params
            .get("addr")
            .ok_or_else(|| "missing 'addr' parameter".to_string())?;

        let addr: SocketAddr = addr_str
            .parse()
            .map_err(|e| format!("invalid address '{}': {}", addr_str, e))?;

        let framing = match params.get("framing").map(String::as_str) {
            Some("raw") | None => Framing::Raw,
            Some("length_prefixed") => Framing::LengthPrefixed,
            Some(other) => return Err(format!("unknown framing '{}'", other)),
        };

        let connect_timeout = params
            .get("connect_timeout_ms")
            .and_then(|s| s.parse().ok())
            .map(Duration::from_millis)
            .unwrap_or(Duration::from_secs(5));

        Ok(Self {
            addr,
            framing,
            connect_timeout,
        })
    }
}

/// Sink that writes chunks to a TCP connection
///
/// A background task watches the read side of the connection and reports a
/// peer hang-up as an out-of-band fault.
pub struct NetworkSink {
    name: String,
    config: NetworkSinkConfig,
    writer: Option<OwnedWriteHalf>,
    faults: Option<FaultReceiver>,
    watcher: Option<JoinHandle<()>>,
}

impl NetworkSink {
    /// Connect a new NetworkSink
    #[instrument(name = "network_sink_new", skip(name, config), fields(addr = %config.addr))]
    pub async fn new(name: impl Into<String>, config: NetworkSinkConfig) -> std::io::Result<Self> {
        let name = name.into();
        let stream = tokio::time::timeout(config.connect_timeout, TcpStream::connect(config.addr))
            .await
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::TimedOut, "connect timed out"))??;
        stream.set_nodelay(true)?;

        let (reader, writer) = stream.into_split();
        let (fault_tx, fault_rx) = fault_channel();
        let watcher = tokio::spawn(watch_connection(name.clone(), reader, fault_tx));

        debug!(
            sink = %name,
            target = %config.addr,
            framing = ?config.framing,
            "NetworkSink connected"
        );

        Ok(Self {
            name,
            config,
            writer: Some(writer),
            faults: Some(fault_rx),
            watcher: Some(watcher),
        })
    }

    /// Create from params (for factory)
    pub async fn from_params(
        name: impl Into<String>,
        params: &HashMap<String, String>,
    ) -> Result<Self, ContractError> {
        let name = name.into();
        let config = NetworkSinkConfig::from_params(params)
            .map_err(|e| ContractError::sink_connection(&name, e))?;

        Self::new(name.clone(), config)
            .await
            .map_err(|e| ContractError::sink_connection(&name, e.to_string()))
    }

    fn frame(&self, chunk: &Chunk) -> Result<BytesMut, ContractError> {
        match self.config.framing {
            Framing::Raw => Ok(BytesMut::from(&chunk.data[..])),
            Framing::LengthPrefixed => {
                let len = u32::try_from(chunk.len()).map_err(|_| {
                    ContractError::sink_write(&self.name, "chunk too large for length prefix")
                })?;
                let mut frame = BytesMut::with_capacity(4 + chunk.len());
                frame.put_u32(len);
                frame.extend_from_slice(&chunk.data);
                Ok(frame)
            }
        }
    }

    fn stop_watcher(&mut self) {
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }
}

impl Drop for NetworkSink {
    fn drop(&mut self) {
        self.stop_watcher();
    }
}

/// Report the end of the connection as a fault; inbound data is discarded
async fn watch_connection(name: String, mut reader: OwnedReadHalf, faults: FaultSender) {
    let mut buf = [0u8; 1024];
    let fault = loop {
        match reader.read(&mut buf).await {
            Ok(0) => break ContractError::sink_fault(&name, "peer closed the connection"),
            Ok(n) => debug!(sink = %name, bytes = n, "Discarding inbound data"),
            Err(e) => break ContractError::sink_fault(&name, e.to_string()),
        }
    };

    warn!(sink = %name, error = %fault, "Connection lost");
    // Nobody may be listening anymore; the connection is gone either way
    let _ = faults.send(fault);
}

impl DataSink for NetworkSink {
    fn name(&self) -> &str {
        &self.name
    }

    #[instrument(
        name = "network_sink_write",
        skip(self, chunk),
        fields(sink = %self.name, bytes = chunk.len())
    )]
    async fn write(&mut self, chunk: &Chunk) -> Result<(), ContractError> {
        let frame = self.frame(chunk)?;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| ContractError::sink_closed(&self.name))?;

        writer
            .write_all(&frame)
            .await
            .map_err(|e| ContractError::sink_write(&self.name, e.to_string()))
    }

    #[instrument(name = "network_sink_flush", skip(self))]
    async fn flush(&mut self) -> Result<(), ContractError> {
        match self.writer.as_mut() {
            Some(writer) => writer
                .flush()
                .await
                .map_err(|e| ContractError::sink_write(&self.name, e.to_string())),
            None => Ok(()),
        }
    }

    #[instrument(name = "network_sink_close", skip(self))]
    async fn close(&mut self) -> Result<(), ContractError> {
        // Our own shutdown ends the connection, which is not a fault
        self.stop_watcher();

        if let Some(mut writer) = self.writer.take() {
            writer
                .shutdown()
                .await
                .map_err(|e| ContractError::sink_close(&self.name, e.to_string()))?;
        }

        debug!(sink = %self.name, "NetworkSink closed");
        Ok(())
    }

    fn take_faults(&mut self) -> Option<FaultReceiver> {
        self.faults.take()
    }
}
