//! Test helpers for integration tests
//!
//! Spawns a gateway on an ephemeral port and wraps WebSocket clients.

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::time::Duration;

use anyhow::{Context, Result};
use chat_common::{AppConfig, AppError, JwtService};
use chat_core::UserId;
use chat_gateway::protocol::ServerFrame;
use chat_gateway::server::{create_gateway_state, serve};
use futures_util::{SinkExt, StreamExt};
use reqwest::{Client, Response, StatusCode};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};

use crate::fixtures::test_config;

/// How long a client waits for a frame before failing the test
pub const RECV_TIMEOUT: Duration = Duration::from_secs(5);

/// Test server instance that manages lifecycle
pub struct TestServer {
    pub addr: SocketAddr,
    pub client: Client,
    jwt: JwtService,
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<Result<(), AppError>>,
}

impl TestServer {
    /// Start a gateway with default settings
    pub async fn start() -> Result<Self> {
        Self::start_with_config(test_config(&[])?).await
    }

    /// Start a gateway with custom config
    pub async fn start_with_config(config: AppConfig) -> Result<Self> {
        let jwt = JwtService::new(&config.jwt.secret, config.jwt.access_token_expiry);
        let state = create_gateway_state(config).await?;

        let listener = TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0))).await?;
        let addr = listener.local_addr()?;

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(serve(listener, state, async move {
            let _ = shutdown_rx.await;
        }));

        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            addr,
            client,
            jwt,
            shutdown: Some(shutdown_tx),
            handle,
        })
    }

    /// Get base URL for the server
    pub fn base_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Mint an access token for `user`
    pub fn token(&self, user: &str) -> Result<String> {
        let user_id = UserId::parse(user)?;
        Ok(self.jwt.issue_access_token(&user_id)?)
    }

    /// Make a GET request
    pub async fn get(&self, path: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self.client.get(&url).send().await?)
    }

    /// Make a GET request with auth token
    pub async fn get_auth(&self, path: &str, token: &str) -> Result<Response> {
        let url = format!("{}{}", self.base_url(), path);
        Ok(self
            .client
            .get(&url)
            .header("Authorization", format!("Bearer {token}"))
            .send()
            .await?)
    }

    /// Open a room connection as `user`
    pub async fn join_room(&self, room: &str, user: &str) -> Result<WsClient> {
        let token = self.token(user)?;
        self.connect(&format!("/ws/{room}?token={token}")).await
    }

    /// Open the notification connection of `user`
    pub async fn connect_user(&self, user: &str) -> Result<WsClient> {
        let token = self.token(user)?;
        self.connect(&format!("/ws/user/{user}?token={token}")).await
    }

    /// Open a WebSocket on `path`
    pub async fn connect(&self, path: &str) -> Result<WsClient> {
        let url = format!("ws://{}{}", self.addr, path);
        let (stream, _) = connect_async(url).await?;
        Ok(WsClient::new(stream))
    }

    /// Attempt an upgrade that is expected to be refused, returning the status
    pub async fn rejected_upgrade(&self, path: &str) -> Result<StatusCode> {
        let url = format!("ws://{}{}", self.addr, path);
        match connect_async(url).await {
            Ok(_) => anyhow::bail!("upgrade to {path} unexpectedly succeeded"),
            Err(tungstenite::Error::Http(response)) => {
                Ok(StatusCode::from_u16(response.status().as_u16())?)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Trigger graceful shutdown and wait for the server to stop
    pub async fn shutdown(mut self) -> Result<()> {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        tokio::time::timeout(Duration::from_secs(10), &mut self.handle)
            .await
            .context("server did not stop")??
            .map_err(Into::into)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// WebSocket client that splits coalesced text frames into server frames
pub struct WsClient {
    stream: WsStream,
    pending: VecDeque<ServerFrame>,
}

impl WsClient {
    fn new(stream: WsStream) -> Self {
        Self {
            stream,
            pending: VecDeque::new(),
        }
    }

    /// Send one text line
    pub async fn send_text(&mut self, text: &str) -> Result<()> {
        self.stream.send(Message::Text(text.to_string())).await?;
        Ok(())
    }

    /// Send a raw message
    pub async fn send(&mut self, message: Message) -> Result<()> {
        self.stream.send(message).await?;
        Ok(())
    }

    /// Wait for the next server frame
    pub async fn recv(&mut self) -> Result<ServerFrame> {
        loop {
            if let Some(frame) = self.pending.pop_front() {
                return Ok(frame);
            }

            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for frame")?
                .context("connection ended")??;

            match message {
                Message::Text(text) => {
                    for line in text.lines().filter(|l| !l.is_empty()) {
                        self.pending.push_back(serde_json::from_str(line)?);
                    }
                }
                Message::Close(frame) => {
                    anyhow::bail!("connection closed: {frame:?}");
                }
                _ => {}
            }
        }
    }

    /// Assert nothing arrives within `wait`
    pub async fn expect_silence(&mut self, wait: Duration) -> Result<()> {
        if let Some(frame) = self.pending.pop_front() {
            anyhow::bail!("unexpected frame: {frame:?}");
        }
        match tokio::time::timeout(wait, self.stream.next()).await {
            Err(_) => Ok(()),
            Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => Ok(()),
            Ok(other) => anyhow::bail!("unexpected message: {other:?}"),
        }
    }

    /// Read until the server closes and return its close code
    pub async fn close_code(&mut self) -> Result<Option<u16>> {
        loop {
            let message = tokio::time::timeout(RECV_TIMEOUT, self.stream.next())
                .await
                .context("timed out waiting for close")?;

            match message {
                Some(Ok(Message::Close(frame))) => return Ok(frame.map(|f| u16::from(f.code))),
                Some(Ok(_)) => {}
                Some(Err(_)) | None => return Ok(None),
            }
        }
    }

    /// Close from the client side
    pub async fn close(mut self) -> Result<()> {
        self.stream.close(None).await?;
        Ok(())
    }
}

/// Assert response status without parsing body
pub async fn assert_status(response: Response, expected_status: StatusCode) -> Result<()> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(())
}

/// Assert response status and parse JSON body
pub async fn assert_json(response: Response, expected_status: StatusCode) -> Result<serde_json::Value> {
    let status = response.status();
    if status != expected_status {
        let body = response.text().await?;
        anyhow::bail!("Expected status {expected_status}, got {status}. Body: {body}");
    }
    Ok(response.json().await?)
}
