//! Server network layer handling TCP connections and the tick loop
//!
//! Task layout:
//!
//! - **Accept loop** ([`Server::run`]): accepts sockets, registers sessions and
//!   is the only place sessions are removed from the [`Registry`].
//! - **Connection reader** ([`read_loop`]): one per socket, assembles frames and
//!   drives its [`Session`].
//! - **Connection writer** ([`write_loop`]): one per socket, drains the
//!   session's outbox so frames never interleave on the wire.
//! - **Ticker**: fires every [`TICK_INTERVAL`] and sends due Keep-Alives.

use bytes::Bytes;
use log::{debug, error, info, warn};
use protocol::FrameAssembler;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};

use crate::config::ServerConfig;
use crate::error::{ConnectionError, ServerError};
use crate::registry::{Registry, SharedSession};
use crate::session::{ConnectionId, Outbox, Session, SessionEvent};

/// One server tick, 20 per second.
pub const TICK_INTERVAL: Duration = Duration::from_millis(50);

pub const READ_BUFFER_SIZE: usize = 4096;

/// Frames a connection may have queued before new ones are dropped.
pub const OUTBOX_CAPACITY: usize = 1024;

const TICKS_PER_MINUTE: u64 = 1200;

/// Messages sent from connection tasks to the accept loop
#[derive(Debug)]
pub enum ConnectionEvent {
    Closed { id: ConnectionId },
}

/// Requests a graceful stop of a running [`Server`].
#[derive(Debug, Clone)]
pub struct ShutdownHandle(Arc<watch::Sender<bool>>);

impl ShutdownHandle {
    pub fn shutdown(&self) {
        self.0.send_replace(true);
    }
}

/// Main server owning the listener and the shared registry
pub struct Server {
    listener: TcpListener,
    registry: Arc<Registry>,
    shutdown_tx: Arc<watch::Sender<bool>>,

    // Communication channels
    events_tx: mpsc::UnboundedSender<ConnectionEvent>,
    events_rx: mpsc::UnboundedReceiver<ConnectionEvent>,
}

impl Server {
    pub async fn bind(config: ServerConfig) -> Result<Self, ServerError> {
        let addr = SocketAddr::new(config.host, config.port);
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ServerError::Bind { addr, source })?;
        info!("Server listening on {}", listener.local_addr()?);

        let (shutdown_tx, _) = watch::channel(false);
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Ok(Server {
            listener,
            registry: Arc::new(Registry::new(config)),
            shutdown_tx: Arc::new(shutdown_tx),
            events_tx,
            events_rx,
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr, ServerError> {
        Ok(self.listener.local_addr()?)
    }

    pub fn registry(&self) -> Arc<Registry> {
        Arc::clone(&self.registry)
    }

    pub fn shutdown_handle(&self) -> ShutdownHandle {
        ShutdownHandle(Arc::clone(&self.shutdown_tx))
    }

    /// Spawns the task that runs one tick every [`TICK_INTERVAL`]
    fn spawn_ticker(&self) -> JoinHandle<()> {
        let registry = Arc::clone(&self.registry);
        let mut shutdown_rx = self.shutdown_tx.subscribe();

        tokio::spawn(async move {
            let mut tick_interval = interval(TICK_INTERVAL);
            tick_interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut tick: u64 = 0;

            loop {
                tokio::select! {
                    _ = tick_interval.tick() => {
                        tick += 1;
                        registry.tick(Instant::now()).await;

                        if tick % TICKS_PER_MINUTE == 0 {
                            debug!(
                                "Tick {}: {} connections, {} players",
                                tick,
                                registry.len().await,
                                registry.online_players()
                            );
                        }
                    }
                    _ = wait_for_shutdown(&mut shutdown_rx) => break,
                }
            }
            debug!("Ticker stopped after {} ticks", tick);
        })
    }

    /// Accept loop. Returns once [`ShutdownHandle::shutdown`] is called.
    pub async fn run(self) -> Result<(), ServerError> {
        let ticker = self.spawn_ticker();
        let Server {
            listener,
            registry,
            shutdown_tx,
            events_tx,
            mut events_rx,
        } = self;
        let mut shutdown_rx = shutdown_tx.subscribe();

        info!("Server started successfully");

        loop {
            tokio::select! {
                accepted = listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            spawn_connection(stream, peer, &registry, &events_tx, &shutdown_tx).await;
                        }
                        Err(e) => {
                            error!("Error accepting connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(10)).await;
                        }
                    }
                },

                Some(event) = events_rx.recv() => {
                    match event {
                        ConnectionEvent::Closed { id } => {
                            registry.remove(id).await;
                        }
                    }
                },

                _ = wait_for_shutdown(&mut shutdown_rx) => {
                    info!("Server shutting down");
                    break;
                }
            }
        }

        if let Err(e) = ticker.await {
            error!("Ticker task panicked: {}", e);
        }
        Ok(())
    }

    /// Runs until `signal` resolves, then shuts down and waits for [`Server::run`]
    /// to finish, ticker included.
    pub async fn run_until<F>(self, signal: F) -> Result<(), ServerError>
    where
        F: Future<Output = ()>,
    {
        let shutdown = self.shutdown_handle();
        let mut server_handle = tokio::spawn(self.run());

        let joined = tokio::select! {
            joined = &mut server_handle => joined,
            _ = signal => {
                info!("Shutdown requested, waiting for server to stop");
                shutdown.shutdown();
                server_handle.await
            }
        };

        match joined {
            Ok(result) => result,
            Err(e) => {
                error!("Server task panicked: {}", e);
                Ok(())
            }
        }
    }
}

/// Resolves once the shutdown flag is set or its sender is gone.
async fn wait_for_shutdown(rx: &mut watch::Receiver<bool>) {
    while !*rx.borrow_and_update() {
        if rx.changed().await.is_err() {
            return;
        }
    }
}

/// Registers a freshly accepted socket and spawns its reader and writer.
async fn spawn_connection(
    stream: TcpStream,
    peer: SocketAddr,
    registry: &Arc<Registry>,
    events_tx: &mpsc::UnboundedSender<ConnectionEvent>,
    shutdown_tx: &watch::Sender<bool>,
) {
    if let Err(e) = stream.set_nodelay(true) {
        warn!("Failed to set TCP_NODELAY for {}: {}", peer, e);
    }

    let id = registry.next_connection_id();
    let (outbox, outbox_rx) = Outbox::channel(OUTBOX_CAPACITY);
    let session = registry.insert(Session::new(id, peer, outbox)).await;
    info!("Connection {} accepted from {}", id, peer);

    let (reader, writer) = stream.into_split();
    tokio::spawn(write_loop(id, writer, outbox_rx));

    let registry = Arc::clone(registry);
    let events_tx = events_tx.clone();
    let mut shutdown_rx = shutdown_tx.subscribe();

    tokio::spawn(async move {
        let result = tokio::select! {
            result = read_loop(reader, &session, &registry) => result,
            _ = wait_for_shutdown(&mut shutdown_rx) => Ok(()),
        };

        match result {
            Ok(()) => info!("Connection {} from {} closed", id, peer),
            Err(e) => warn!("Connection {} from {} dropped: {}", id, peer, e),
        }

        drop(session);
        if events_tx.send(ConnectionEvent::Closed { id }).is_err() {
            debug!("Accept loop gone, not reporting close of {}", id);
        }
    });
}

/// Reads from `reader` until EOF, a framing error or a session-requested close.
///
/// Frames are handled strictly in arrival order. Broadcasts run after the
/// session lock is released.
pub async fn read_loop<R>(
    mut reader: R,
    session: &SharedSession,
    registry: &Registry,
) -> Result<(), ConnectionError>
where
    R: AsyncRead + Unpin,
{
    let mut assembler = FrameAssembler::default();
    let mut buffer = vec![0u8; READ_BUFFER_SIZE];

    loop {
        let len = reader.read(&mut buffer).await?;
        if len == 0 {
            return Ok(());
        }
        assembler.extend(&buffer[..len]);

        while let Some(frame) = assembler.next_frame()? {
            let event = {
                let mut session = session.lock().await;
                session.handle_frame(frame, registry)
            };

            match event {
                Some(SessionEvent::Broadcast(message)) => {
                    registry.broadcast(&message).await;
                }
                Some(SessionEvent::Close) => return Ok(()),
                None => {}
            }
        }
    }
}

/// Writes queued frames to `writer` until every outbox handle is dropped.
///
/// A frame whose write fails is abandoned and the next one is still tried.
pub async fn write_loop<W>(id: ConnectionId, mut writer: W, mut rx: mpsc::Receiver<Bytes>)
where
    W: AsyncWrite + Unpin,
{
    let mut failed = 0usize;
    while let Some(frame) = rx.recv().await {
        if let Err(e) = writer.write_all(&frame).await {
            failed += 1;
            if failed == 1 {
                warn!("Write to connection {} failed: {}", id, e);
            } else {
                debug!("Abandoned frame {} for connection {}: {}", failed, id, e);
            }
        }
    }

    if let Err(e) = writer.shutdown().await {
        debug!("Shutdown of connection {} failed: {}", id, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::tests::{drain, handshake, login_start};
    use bytes::BytesMut;
    use protocol::frame::encode_frame;
    use protocol::packets::ServerboundPacket;
    use protocol::{ClientboundPacket, ConnectionState, FrameError};
    use tokio_test::io::Builder;

    fn frame(payload: &[u8]) -> Vec<u8> {
        let mut buf = BytesMut::new();
        encode_frame(payload, &mut buf);
        buf.to_vec()
    }

    async fn new_session(registry: &Registry) -> (SharedSession, mpsc::Receiver<Bytes>) {
        let (outbox, rx) = Outbox::channel(OUTBOX_CAPACITY);
        let peer: SocketAddr = "127.0.0.1:45000".parse().unwrap();
        let session = Session::new(registry.next_connection_id(), peer, outbox);
        (registry.insert(session).await, rx)
    }

    #[tokio::test]
    async fn test_read_loop_handles_split_login() {
        let registry = Registry::new(ServerConfig::default());
        let (session, mut rx) = new_session(&registry).await;

        let mut bytes = frame(&handshake(2));
        bytes.extend(frame(&login_start("Alice")));
        let (first, second) = bytes.split_at(7);
        let reader = Builder::new().read(first).read(second).build();

        read_loop(reader, &session, &registry).await.unwrap();

        let session = session.lock().await;
        assert_eq!(session.state(), ConnectionState::Play);
        assert_eq!(session.username(), Some("Alice"));
        let packets = drain(&mut rx, &[ConnectionState::Login, ConnectionState::Play]);
        assert_eq!(packets.len(), 3);
    }

    #[tokio::test]
    async fn test_read_loop_status_exchange() {
        let registry = Registry::new(ServerConfig::default());
        let (session, mut rx) = new_session(&registry).await;

        let mut bytes = frame(&handshake(1));
        bytes.extend(ServerboundPacket::StatusRequest.encode().unwrap());
        bytes.extend(ServerboundPacket::Ping { payload: 1234 }.encode().unwrap());
        let reader = Builder::new().read(&bytes).build();

        read_loop(reader, &session, &registry).await.unwrap();

        let packets = drain(&mut rx, &[ConnectionState::Status]);
        assert_eq!(packets.len(), 2);
        assert!(matches!(packets[0], ClientboundPacket::StatusResponse { .. }));
        assert_eq!(packets[1], ClientboundPacket::Pong { payload: 1234 });
    }

    #[tokio::test]
    async fn test_read_loop_rejects_oversized_frame() {
        let registry = Registry::new(ServerConfig::default());
        let (session, _rx) = new_session(&registry).await;

        // length prefix 32768
        let reader = Builder::new().read(&[0x80, 0x80, 0x02, 0x00]).build();

        match read_loop(reader, &session, &registry).await {
            Err(ConnectionError::Framing(FrameError::FrameTooLarge { size, max })) => {
                assert_eq!(size, 32768);
                assert_eq!(max, protocol::MAX_FRAME_LEN);
            }
            other => panic!("Expected oversized frame error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_read_loop_survives_bad_packet() {
        let registry = Registry::new(ServerConfig::default());
        let (session, _rx) = new_session(&registry).await;

        let mut bytes = frame(&[0x42]);
        bytes.extend(frame(&[]));
        bytes.extend(frame(&handshake(2)));
        let reader = Builder::new().read(&bytes).build();

        read_loop(reader, &session, &registry).await.unwrap();
        assert_eq!(session.lock().await.state(), ConnectionState::Login);
    }

    #[tokio::test]
    async fn test_read_loop_broadcasts_chat() {
        let registry = Registry::new(ServerConfig::default());
        let (alice, mut alice_rx) = new_session(&registry).await;
        let (bob, mut bob_rx) = new_session(&registry).await;

        let bob_login = [frame(&handshake(2)), frame(&login_start("Bob"))].concat();
        read_loop(Builder::new().read(&bob_login).build(), &bob, &registry)
            .await
            .unwrap();
        drain(&mut bob_rx, &[ConnectionState::Login, ConnectionState::Play]);

        let mut bytes = [frame(&handshake(2)), frame(&login_start("Alice"))].concat();
        bytes.extend(
            ServerboundPacket::ChatMessage {
                message: "hello".to_string(),
            }
            .encode()
            .unwrap(),
        );
        read_loop(Builder::new().read(&bytes).build(), &alice, &registry)
            .await
            .unwrap();

        let bob_packets = drain(&mut bob_rx, &[ConnectionState::Play]);
        match bob_packets.as_slice() {
            [ClientboundPacket::ChatMessage { json, position }] => {
                assert_eq!(json, r#"{"text":"<Alice> hello"}"#);
                assert_eq!(*position, 0);
            }
            other => panic!("Expected one chat message, got {:?}", other),
        }

        let alice_packets = drain(&mut alice_rx, &[ConnectionState::Login, ConnectionState::Play]);
        assert_eq!(alice_packets.len(), 4);
        assert!(matches!(
            alice_packets[3],
            ClientboundPacket::ChatMessage { .. }
        ));
        assert_eq!(registry.chat_history(), vec!["<Alice> hello".to_string()]);
    }

    #[tokio::test]
    async fn test_read_loop_stops_when_server_full() {
        let mut config = ServerConfig::default();
        config.max_players = 0;
        let registry = Registry::new(config);
        let (session, mut rx) = new_session(&registry).await;

        // the trailing status request must never be processed
        let mut bytes = [frame(&handshake(2)), frame(&login_start("Alice"))].concat();
        bytes.extend(ServerboundPacket::StatusRequest.encode().unwrap());
        let reader = Builder::new().read(&bytes).build();

        read_loop(reader, &session, &registry).await.unwrap();

        assert_eq!(session.lock().await.state(), ConnectionState::Disconnected);
        let packets = drain(&mut rx, &[ConnectionState::Login]);
        assert!(matches!(
            packets.as_slice(),
            [ClientboundPacket::LoginDisconnect { .. }]
        ));
    }

    #[tokio::test]
    async fn test_write_loop_writes_frames_in_order() {
        let first = ClientboundPacket::Pong { payload: 1 }.encode().unwrap();
        let second = ClientboundPacket::Pong { payload: 2 }.encode().unwrap();
        let writer = Builder::new().write(&first).write(&second).build();

        let (outbox, rx) = Outbox::channel(8);
        assert!(outbox.send_frame(first.clone()));
        assert!(outbox.send_frame(second.clone()));
        drop(outbox);

        write_loop(ConnectionId(1), writer, rx).await;
    }

    #[tokio::test]
    async fn test_write_loop_abandons_failed_frame_only() {
        let first = ClientboundPacket::Pong { payload: 1 }.encode().unwrap();
        let second = ClientboundPacket::Pong { payload: 2 }.encode().unwrap();
        let writer = Builder::new()
            .write_error(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "peer went away",
            ))
            .write(&second)
            .build();

        let (outbox, rx) = Outbox::channel(8);
        assert!(outbox.send_frame(first));
        assert!(outbox.send_frame(second.clone()));
        drop(outbox);

        // the mock panics on drop unless the second frame was written
        write_loop(ConnectionId(1), writer, rx).await;
    }

    #[tokio::test]
    async fn test_outbox_drops_when_full() {
        let (outbox, mut rx) = Outbox::channel(1);
        assert!(outbox.send_frame(Bytes::from_static(&[1, 0])));
        assert!(!outbox.send_frame(Bytes::from_static(&[1, 1])));
        assert_eq!(rx.recv().await.unwrap().as_ref(), &[1, 0]);
    }

    #[tokio::test]
    async fn test_server_binds_ephemeral_port_and_stops() {
        let mut config = ServerConfig::default();
        config.host = "127.0.0.1".parse().unwrap();
        config.port = 0;

        let server = Server::bind(config).await.unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);

        let handle = server.shutdown_handle();
        let task = tokio::spawn(server.run());
        handle.shutdown();
        task.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_run_until_joins_ticker_before_returning() {
        let mut config = ServerConfig::default();
        config.host = "127.0.0.1".parse().unwrap();
        config.port = 0;

        let server = Server::bind(config).await.unwrap();
        let registry = server.registry();
        let (signal_tx, signal_rx) = tokio::sync::oneshot::channel::<()>();

        let task = tokio::spawn(server.run_until(async move {
            let _ = signal_rx.await;
        }));
        tokio::time::sleep(TICK_INTERVAL * 3).await;
        signal_tx.send(()).unwrap();
        task.await.unwrap().unwrap();

        // the ticker held the other reference
        assert_eq!(Arc::strong_count(&registry), 1);
    }
}
