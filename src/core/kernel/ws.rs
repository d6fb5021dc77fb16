use crate::core::errors::ExchangeError;
use async_trait::async_trait;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::{interval_at, sleep, Instant, Interval, MissedTickBehavior};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{client_async_tls, connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, instrument, warn};

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

const MAX_PROXY_RESPONSE_BYTES: usize = 8 * 1024;

/// Per-connection WebSocket settings
///
/// Passed explicitly to every subscription, so concurrent streams can run
/// with different proxies or keep-alive policies.
#[derive(Debug, Clone)]
pub struct WsConfig {
    /// Upper bound for TCP + TLS + WebSocket handshake
    pub connect_timeout: Duration,
    /// Ping every period and drop the connection when a ping goes a full period without any reply
    pub keepalive_enabled: bool,
    /// Ping period, also the time allowed for a reply
    pub keepalive_timeout: Duration,
    /// HTTP proxy used as a CONNECT tunnel (`http://host:port`)
    pub proxy_url: Option<String>,
    /// Reconnection attempts after a drop; 0 disables reconnection
    pub max_reconnect_attempts: u32,
    /// Initial delay between reconnection attempts, doubled each time
    pub reconnect_delay: Duration,
}

impl Default for WsConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            keepalive_enabled: false,
            keepalive_timeout: Duration::from_secs(60),
            proxy_url: None,
            max_reconnect_attempts: 0,
            reconnect_delay: Duration::from_secs(1),
        }
    }
}

impl WsConfig {
    pub fn with_proxy(mut self, proxy_url: impl Into<String>) -> Self {
        self.proxy_url = Some(proxy_url.into());
        self
    }

    pub fn with_keepalive(mut self, timeout: Duration) -> Self {
        self.keepalive_enabled = true;
        self.keepalive_timeout = timeout;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_reconnect(mut self, max_attempts: u32, delay: Duration) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self.reconnect_delay = delay;
        self
    }

    pub fn reconnect_enabled(&self) -> bool {
        self.max_reconnect_attempts > 0
    }
}

/// WebSocket session trait - pure transport layer
///
/// `next_raw` only yields data frames. Ping/pong are answered internally and a
/// close from the peer ends the session (`None`).
#[async_trait]
pub trait WsSession: Send + Sync {
    /// Connect to the WebSocket
    async fn connect(&mut self) -> Result<(), ExchangeError>;

    /// Send a raw message
    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError>;

    /// Receive the next data frame; `None` once the connection has ended
    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>>;

    /// Close the connection
    async fn close(&mut self) -> Result<(), ExchangeError>;

    /// Check if the connection is alive
    fn is_connected(&self) -> bool;
}

/// Ping probe: a ping goes out on connect and on every tick, and the
/// connection is dead when nothing arrived since the previous ping.
struct Keepalive {
    ticker: Interval,
    last_ping: Instant,
    last_activity: Option<Instant>,
}

impl Keepalive {
    fn new(period: Duration) -> Self {
        let mut ticker = interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        Self {
            ticker,
            last_ping: Instant::now(),
            last_activity: None,
        }
    }

    fn ping_sent(&mut self) {
        self.last_ping = Instant::now();
    }

    fn touch(&mut self) {
        self.last_activity = Some(Instant::now());
    }

    fn expired(&self) -> bool {
        !self
            .last_activity
            .is_some_and(|activity| activity >= self.last_ping)
    }
}

enum Next {
    Frame(Option<Result<Message, tokio_tungstenite::tungstenite::Error>>),
    KeepaliveTick,
}

/// Tungstenite-based WebSocket implementation
pub struct TungsteniteWs {
    url: String,
    stream_name: String,
    config: WsConfig,
    write: Option<SplitSink<WsStream, Message>>,
    read: Option<SplitStream<WsStream>>,
    connected: bool,
    keepalive: Option<Keepalive>,
}

impl TungsteniteWs {
    /// Create a new WebSocket session
    ///
    /// # Arguments
    /// * `url` - The WebSocket URL to connect to
    /// * `stream_name` - Name used in logs instead of the URL, which may embed a credential
    /// * `config` - Connection settings
    pub fn new(url: String, stream_name: String, config: WsConfig) -> Self {
        Self {
            url,
            stream_name,
            config,
            write: None,
            read: None,
            connected: false,
            keepalive: None,
        }
    }

    pub fn config(&self) -> &WsConfig {
        &self.config
    }

    async fn open_stream(&self) -> Result<WsStream, ExchangeError> {
        let stream = match self.config.proxy_url.as_deref() {
            None => connect_async(self.url.as_str()).await.map(|(s, _)| s),
            Some(proxy) => {
                let tunnel = open_proxy_tunnel(proxy, &self.url).await?;
                client_async_tls(self.url.as_str(), tunnel)
                    .await
                    .map(|(s, _)| s)
            }
        };

        stream.map_err(|e| ExchangeError::NetworkError(format!("WebSocket connection failed: {}", e)))
    }

    fn teardown(&mut self) {
        self.connected = false;
        self.write = None;
        self.read = None;
        self.keepalive = None;
    }
}

#[async_trait]
impl WsSession for TungsteniteWs {
    #[instrument(skip(self), fields(stream = %self.stream_name, proxied = self.config.proxy_url.is_some()))]
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        let ws_stream = tokio::time::timeout(self.config.connect_timeout, self.open_stream())
            .await
            .map_err(|_| {
                ExchangeError::ConnectionTimeout("WebSocket connection timeout".to_string())
            })??;

        let (write, read) = ws_stream.split();
        self.write = Some(write);
        self.read = Some(read);
        self.connected = true;
        self.keepalive = None;

        if self.config.keepalive_enabled {
            let mut keepalive = Keepalive::new(self.config.keepalive_timeout);
            if let Err(e) = self.send_raw(Message::Ping(Vec::new())).await {
                self.teardown();
                return Err(e);
            }
            keepalive.ping_sent();
            self.keepalive = Some(keepalive);
        }

        debug!("WebSocket connected");
        Ok(())
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.connected {
            return Err(ExchangeError::NetworkError(
                "WebSocket not connected".to_string(),
            ));
        }

        let write = self.write.as_mut().ok_or_else(|| {
            ExchangeError::NetworkError("WebSocket write stream not available".to_string())
        })?;

        write.send(msg).await.map_err(|e| {
            self.connected = false;
            ExchangeError::NetworkError(format!("Failed to send WebSocket message: {}", e))
        })
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        loop {
            let next = {
                let read = self.read.as_mut()?;
                match self.keepalive.as_mut() {
                    Some(keepalive) => tokio::select! {
                        frame = read.next() => Next::Frame(frame),
                        _ = keepalive.ticker.tick() => Next::KeepaliveTick,
                    },
                    None => Next::Frame(read.next().await),
                }
            };

            match next {
                Next::KeepaliveTick => {
                    if self.keepalive.as_ref().is_some_and(Keepalive::expired) {
                        warn!(stream = %self.stream_name, "No reply to keepalive ping, dropping connection");
                        self.teardown();
                        return Some(Err(ExchangeError::ConnectionTimeout(
                            "WebSocket keepalive timeout".to_string(),
                        )));
                    }
                    if let Err(e) = self.send_raw(Message::Ping(Vec::new())).await {
                        self.teardown();
                        return Some(Err(e));
                    }
                    if let Some(keepalive) = self.keepalive.as_mut() {
                        keepalive.ping_sent();
                    }
                }
                Next::Frame(Some(Ok(message))) => {
                    if let Some(keepalive) = self.keepalive.as_mut() {
                        keepalive.touch();
                    }
                    match message {
                        Message::Ping(data) => {
                            if let Err(e) = self.send_raw(Message::Pong(data)).await {
                                warn!("Failed to send pong response: {}", e);
                            }
                        }
                        Message::Pong(_) | Message::Frame(_) => {}
                        Message::Close(frame) => {
                            debug!(stream = %self.stream_name, ?frame, "WebSocket closed by peer");
                            self.teardown();
                            return None;
                        }
                        data => return Some(Ok(data)),
                    }
                }
                Next::Frame(Some(Err(e))) => {
                    self.teardown();
                    return Some(Err(ExchangeError::NetworkError(format!(
                        "WebSocket error: {}",
                        e
                    ))));
                }
                Next::Frame(None) => {
                    self.teardown();
                    return None;
                }
            }
        }
    }

    #[instrument(skip(self), fields(stream = %self.stream_name))]
    async fn close(&mut self) -> Result<(), ExchangeError> {
        if let Some(write) = self.write.as_mut() {
            let _ = write.send(Message::Close(None)).await;
        }
        self.teardown();
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }
}

/// Wrapper that adds automatic reconnection capabilities
pub struct ReconnectWs<T: WsSession> {
    inner: T,
    max_reconnect_attempts: u32,
    reconnect_delay: Duration,
}

impl<T: WsSession> ReconnectWs<T> {
    /// Create a new reconnecting WebSocket wrapper
    ///
    /// # Arguments
    /// * `inner` - The underlying WebSocket session to wrap
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_reconnect_attempts: 5,
            reconnect_delay: Duration::from_secs(1),
        }
    }

    /// Set the maximum number of reconnection attempts
    pub fn with_max_reconnect_attempts(mut self, max_attempts: u32) -> Self {
        self.max_reconnect_attempts = max_attempts;
        self
    }

    /// Set the initial delay between reconnection attempts
    pub fn with_reconnect_delay(mut self, delay: Duration) -> Self {
        self.reconnect_delay = delay;
        self
    }

    pub fn inner(&self) -> &T {
        &self.inner
    }

    async fn attempt_reconnect(&mut self) -> Result<(), ExchangeError> {
        let mut attempts = 0;
        let mut delay = self.reconnect_delay;

        while attempts < self.max_reconnect_attempts {
            attempts += 1;

            match self.inner.connect().await {
                Ok(()) => {
                    debug!("Reconnected after {} attempt(s)", attempts);
                    return Ok(());
                }
                Err(e) => {
                    error!("Reconnection attempt {} failed: {}", attempts, e);
                    if attempts < self.max_reconnect_attempts {
                        sleep(delay).await;
                        delay = std::cmp::min(delay * 2, Duration::from_secs(60));
                    }
                }
            }
        }

        Err(ExchangeError::NetworkError(format!(
            "Failed to reconnect after {} attempts",
            self.max_reconnect_attempts
        )))
    }
}

#[async_trait]
impl<T: WsSession> WsSession for ReconnectWs<T> {
    async fn connect(&mut self) -> Result<(), ExchangeError> {
        self.inner.connect().await
    }

    async fn send_raw(&mut self, msg: Message) -> Result<(), ExchangeError> {
        if !self.inner.is_connected() {
            self.attempt_reconnect().await?;
        }
        self.inner.send_raw(msg).await
    }

    async fn next_raw(&mut self) -> Option<Result<Message, ExchangeError>> {
        loop {
            if self.inner.is_connected() {
                match self.inner.next_raw().await {
                    Some(Ok(msg)) => return Some(Ok(msg)),
                    Some(Err(e)) => warn!("Connection dropped, reconnecting: {}", e),
                    None => warn!("Connection closed, reconnecting"),
                }
            }

            if let Err(e) = self.attempt_reconnect().await {
                return Some(Err(e));
            }
        }
    }

    async fn close(&mut self) -> Result<(), ExchangeError> {
        self.inner.close().await
    }

    fn is_connected(&self) -> bool {
        self.inner.is_connected()
    }
}

fn authority(uri: &Uri, default_port: u16) -> Result<(String, u16), ExchangeError> {
    let host = uri
        .host()
        .ok_or_else(|| ExchangeError::ConfigurationError(format!("URL has no host: {}", uri)))?;
    Ok((host.to_string(), uri.port_u16().unwrap_or(default_port)))
}

/// Open a TCP tunnel to the target URL through an HTTP CONNECT proxy
pub(crate) async fn open_proxy_tunnel(
    proxy_url: &str,
    target_url: &str,
) -> Result<TcpStream, ExchangeError> {
    let proxy: Uri = proxy_url.parse().map_err(|e| {
        ExchangeError::ConfigurationError(format!("Invalid proxy URL '{}': {}", proxy_url, e))
    })?;
    let target: Uri = target_url.parse().map_err(|e| {
        ExchangeError::ConfigurationError(format!("Invalid WebSocket URL: {}", e))
    })?;

    let (proxy_host, proxy_port) = authority(&proxy, 80)?;
    let default_target_port = if target.scheme_str() == Some("ws") {
        80
    } else {
        443
    };
    let (host, port) = authority(&target, default_target_port)?;

    let mut stream = TcpStream::connect((proxy_host.as_str(), proxy_port))
        .await
        .map_err(|e| ExchangeError::NetworkError(format!("Proxy connection failed: {}", e)))?;

    let request = format!(
        "CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n\r\n",
        host = host,
        port = port
    );
    stream
        .write_all(request.as_bytes())
        .await
        .map_err(|e| ExchangeError::NetworkError(format!("Proxy handshake failed: {}", e)))?;

    let mut response = Vec::with_capacity(512);
    let mut chunk = [0u8; 512];
    while !response.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream
            .read(&mut chunk)
            .await
            .map_err(|e| ExchangeError::NetworkError(format!("Proxy handshake failed: {}", e)))?;
        if n == 0 {
            return Err(ExchangeError::NetworkError(
                "Proxy closed the connection during CONNECT".to_string(),
            ));
        }
        response.extend_from_slice(&chunk[..n]);
        if response.len() > MAX_PROXY_RESPONSE_BYTES {
            return Err(ExchangeError::NetworkError(
                "Proxy CONNECT response too large".to_string(),
            ));
        }
    }

    let head = String::from_utf8_lossy(&response);
    let status_line = head.lines().next().unwrap_or_default();
    match status_line.split_whitespace().nth(1) {
        Some("200") => Ok(stream),
        _ => Err(ExchangeError::NetworkError(format!(
            "Proxy refused CONNECT: {}",
            status_line
        ))),
    }
}
