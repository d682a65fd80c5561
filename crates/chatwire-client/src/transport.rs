//! WebSocket transport driver.
//!
//! Executes the actions produced by the Sans-IO [`Connection`]: opens
//! sockets, writes frames, runs the reconnect timer, and forwards
//! [`SessionEvent`]s to the subscriber channel. Protocol decisions stay in
//! the state machine; this is the only place that touches I/O.
//!
//! Callers interact through [`ChatHandle`], a cheap clonable handle whose
//! methods surface the synchronous error taxonomy (`InvalidIdentity`,
//! `NotConnected`, encode errors, write failures) from the driver task.

use std::{collections::VecDeque, pin::Pin};

use chatwire_proto::OutboundAction;
use chrono::Utc;
use futures_util::{SinkExt, StreamExt};
use tokio::{
    net::TcpStream,
    sync::{mpsc, oneshot},
    time::{Sleep, sleep},
};
use tokio_tungstenite::{
    MaybeTlsStream, WebSocketStream, connect_async,
    tungstenite::{
        Error as WsError, Message, Utf8Bytes,
        protocol::{CloseFrame, frame::coding::CloseCode},
    },
};
use tracing::{debug, warn};

use crate::{
    connection::{Connection, ConnectionConfig, NORMAL_CLOSURE_CODE},
    endpoint::Endpoint,
    error::ClientError,
    event::{ConnectionAction, SessionEvent},
};

/// Closure code reported when the peer closed without a status code.
const NO_STATUS_CODE: u16 = 1005;

/// Capacity of the bounded subscriber event channel.
const EVENT_CHANNEL_CAPACITY: usize = 256;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Command {
    Connect { identity: String, reply: oneshot::Sender<Result<(), ClientError>> },
    Send { content: String, reply: oneshot::Sender<Result<(), ClientError>> },
    Disconnect,
}

/// Handle to a running connection driver.
///
/// Cloning is cheap; all clones address the same connection. Dropping every
/// clone stops the driver after a graceful close.
#[derive(Debug, Clone)]
pub struct ChatHandle {
    commands: mpsc::UnboundedSender<Command>,
}

impl ChatHandle {
    /// Begin a connection attempt as `identity`.
    ///
    /// Resolves once the state machine has accepted the request (state
    /// `Connecting`); the transport open itself completes asynchronously and
    /// is reported via [`SessionEvent::Opened`].
    ///
    /// # Errors
    ///
    /// - `ClientError::InvalidIdentity` if `identity` trims to nothing
    /// - `ClientError::Transport` if the driver task has stopped
    pub async fn connect(&self, identity: &str) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Connect { identity: identity.to_owned(), reply })
            .map_err(|_| driver_gone())?;
        response.await.map_err(|_| driver_gone())?
    }

    /// Send one chat message.
    ///
    /// # Errors
    ///
    /// - `ClientError::NotConnected` if the connection is not open
    /// - `ClientError::Encode` if the content is empty after trimming
    /// - `ClientError::Transport` if the write fails (the connection is then
    ///   treated as broken and the retry policy applies)
    pub async fn send(&self, content: &str) -> Result<(), ClientError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Command::Send { content: content.to_owned(), reply })
            .map_err(|_| driver_gone())?;
        response.await.map_err(|_| driver_gone())?
    }

    /// Terminate the connection intentionally.
    ///
    /// Closes the transport with the normal-closure code and suppresses any
    /// pending reconnect. Fire-and-forget.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }
}

fn driver_gone() -> ClientError {
    ClientError::Transport("connection driver stopped".to_owned())
}

/// Start a connection driver on the current tokio runtime.
///
/// Returns the caller handle and the subscriber event stream. Events are
/// delivered in decode order on a bounded channel; a slow subscriber
/// backpressures the driver rather than dropping events.
pub fn spawn(
    endpoint: Endpoint,
    config: ConnectionConfig,
) -> (ChatHandle, mpsc::Receiver<SessionEvent>) {
    let (command_tx, command_rx) = mpsc::unbounded_channel();
    let (event_tx, event_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

    let driver = Driver {
        conn: Connection::new(endpoint, config),
        commands: command_rx,
        events: event_tx,
        socket: None,
        reconnect: None,
    };
    tokio::spawn(driver.run());

    (ChatHandle { commands: command_tx }, event_rx)
}

/// Owns the socket and timer; single logical thread of execution.
struct Driver {
    conn: Connection,
    commands: mpsc::UnboundedReceiver<Command>,
    events: mpsc::Sender<SessionEvent>,
    socket: Option<WsStream>,
    reconnect: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            tokio::select! {
                command = self.commands.recv() => {
                    match command {
                        Some(command) => self.handle_command(command).await,
                        // All handles dropped.
                        None => break,
                    }
                },
                message = next_message(&mut self.socket) => {
                    self.handle_message(message).await;
                },
                () = reconnect_elapsed(&mut self.reconnect) => {
                    self.reconnect = None;
                    let actions = self.conn.reconnect_due();
                    self.execute_all(actions).await;
                },
            }
        }

        if let Some(mut ws) = self.socket.take() {
            let _ = ws.close(Some(close_frame(NORMAL_CLOSURE_CODE))).await;
        }
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect { identity, reply } => match self.conn.connect(&identity) {
                Ok(actions) => {
                    self.execute_all(actions).await;
                    let _ = reply.send(Ok(()));
                },
                Err(err) => {
                    let _ = reply.send(Err(err));
                },
            },
            Command::Send { content, reply } => {
                let action = OutboundAction::ChatSend { content };
                match self.conn.send(&action, Utc::now()) {
                    Ok(actions) => {
                        let mut result = Ok(());
                        let mut follow_ups = Vec::new();
                        for action in actions {
                            match action {
                                ConnectionAction::SendFrame(frame) => {
                                    let (written, more) = self.write_frame(frame).await;
                                    result = written;
                                    follow_ups.extend(more);
                                },
                                other => follow_ups.push(other),
                            }
                        }
                        self.execute_all(follow_ups).await;
                        let _ = reply.send(result);
                    },
                    Err(err) => {
                        let _ = reply.send(Err(err));
                    },
                }
            },
            Command::Disconnect => {
                let actions = self.conn.disconnect();
                self.execute_all(actions).await;
            },
        }
    }

    async fn handle_message(&mut self, message: Option<Result<Message, WsError>>) {
        let actions = match message {
            Some(Ok(Message::Text(text))) => self.conn.handle_data(text.as_str()),
            Some(Ok(Message::Close(frame))) => {
                let code = frame.map_or(NO_STATUS_CODE, |f| u16::from(f.code));
                self.socket = None;
                self.conn.handle_close(code)
            },
            // tungstenite answers pings internally; binary frames are not
            // part of the protocol.
            Some(Ok(_)) => Vec::new(),
            Some(Err(err)) => {
                warn!(%err, "websocket stream error");
                self.socket = None;
                self.conn.handle_error()
            },
            None => {
                // Stream ended without a close frame.
                self.socket = None;
                self.conn.handle_error()
            },
        };

        self.execute_all(actions).await;
    }

    /// Execute actions, including any follow-ups they generate (e.g. an
    /// `OpenTransport` resolving into `handle_open`'s publish).
    async fn execute_all(&mut self, actions: Vec<ConnectionAction>) {
        let mut queue: VecDeque<ConnectionAction> = actions.into();
        while let Some(action) = queue.pop_front() {
            let follow_ups = self.execute(action).await;
            queue.extend(follow_ups);
        }
    }

    async fn execute(&mut self, action: ConnectionAction) -> Vec<ConnectionAction> {
        match action {
            ConnectionAction::OpenTransport { url } => self.open_transport(&url).await,
            ConnectionAction::SendFrame(frame) => {
                let (_, follow_ups) = self.write_frame(frame).await;
                follow_ups
            },
            ConnectionAction::CloseTransport { code } => {
                if let Some(ws) = self.socket.as_mut() {
                    if let Err(err) = ws.close(Some(close_frame(code))).await {
                        debug!(%err, "close handshake failed");
                        self.socket = None;
                    }
                }
                Vec::new()
            },
            ConnectionAction::ScheduleReconnect { delay } => {
                self.reconnect = Some(Box::pin(sleep(delay)));
                Vec::new()
            },
            ConnectionAction::Publish(event) => {
                if self.events.send(event).await.is_err() {
                    debug!("subscriber dropped, event discarded");
                }
                Vec::new()
            },
        }
    }

    async fn open_transport(&mut self, url: &str) -> Vec<ConnectionAction> {
        match connect_async(url).await {
            Ok((ws, _response)) => {
                debug!(url, "transport opened");
                self.socket = Some(ws);
                self.conn.handle_open()
            },
            Err(err) => {
                warn!(%err, url, "transport open failed");
                self.conn.handle_error()
            },
        }
    }

    async fn write_frame(
        &mut self,
        frame: String,
    ) -> (Result<(), ClientError>, Vec<ConnectionAction>) {
        let Some(ws) = self.socket.as_mut() else {
            return (
                Err(ClientError::Transport("no live transport".to_owned())),
                self.conn.write_failed(),
            );
        };

        match ws.send(Message::text(frame)).await {
            Ok(()) => (Ok(()), Vec::new()),
            Err(err) => {
                warn!(%err, "websocket write failed");
                self.socket = None;
                (Err(ClientError::Transport(err.to_string())), self.conn.write_failed())
            },
        }
    }
}

fn close_frame(code: u16) -> CloseFrame {
    CloseFrame { code: CloseCode::from(code), reason: Utf8Bytes::from_static("") }
}

async fn next_message(socket: &mut Option<WsStream>) -> Option<Result<Message, WsError>> {
    match socket.as_mut() {
        Some(ws) => ws.next().await,
        None => std::future::pending().await,
    }
}

async fn reconnect_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer.as_mut() {
        Some(sleep) => sleep.as_mut().await,
        None => std::future::pending().await,
    }
}
