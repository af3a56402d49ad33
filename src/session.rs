use crate::config::{ServerAddr, SessionConfig};
use crate::media::{ClipPlayer, MediaQueue, QueueEvents};
use crate::protocol::{ClientCommand, SHUTDOWN_CLIP, ServerCommand};
use crate::socket::{LineSocket, ReadOutcome};
use crate::ticker::ElapsedTicker;
use crate::types::events::{ButtonRole, UiEvent, UiEventBus};
use async_trait::async_trait;
use log::{debug, error, info, warn};
use once_cell::sync::OnceCell;
use std::sync::{Arc, Mutex as StdMutex};
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::time::sleep;

const BANNER_DIALING: &str = "dialing";
const BANNER_CALL_TERMINATED: &str = "call terminated";
const BANNER_NO_SIGNAL: &str = "no signal";

/// How long the provider-info panel stays up after a successful start.
const PROVIDER_INFO_VISIBLE: Duration = Duration::from_secs(1);
/// Banner-to-terminate delay on session death.
const TERMINATE_DELAY: Duration = Duration::from_secs(3);
/// Internal-error banner timings.
const INTERNAL_ERROR_VISIBLE: Duration = Duration::from_secs(6);
const INTERNAL_ERROR_LINGER: Duration = Duration::from_millis(600);

/// Where the protocol reader is in the session's lifecycle. Transitions are
/// forward-only; there is no way back out of `Dead`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReaderState {
    Uninitialized = 0,
    Normal = 1,
    Dead = 2,
}

/// State shared between the session's workers: the read loop, the writer
/// task, the playback queue actor and the transient banner tasks. Owned by
/// exactly one [`SessionController`]; nothing is shared across sessions.
struct SessionShared {
    bus: Arc<UiEventBus>,
    state: AtomicU8,
    socket: Mutex<Option<Arc<LineSocket>>>,
    queue: OnceCell<MediaQueue>,
    ticker: OnceCell<ElapsedTicker>,
    // Dropped when the session dies so the writer task can exit.
    out_tx: StdMutex<Option<UnboundedSender<ClientCommand>>>,
}

impl SessionShared {
    fn new(bus: Arc<UiEventBus>) -> Self {
        Self {
            bus,
            state: AtomicU8::new(ReaderState::Uninitialized as u8),
            socket: Mutex::new(None),
            queue: OnceCell::new(),
            ticker: OnceCell::new(),
            out_tx: StdMutex::new(None),
        }
    }

    fn state(&self) -> ReaderState {
        match self.state.load(Ordering::SeqCst) {
            0 => ReaderState::Uninitialized,
            1 => ReaderState::Normal,
            _ => ReaderState::Dead,
        }
    }

    /// Returns the state the session was in before this call.
    fn mark_dead(&self) -> ReaderState {
        match self.state.swap(ReaderState::Dead as u8, Ordering::SeqCst) {
            0 => ReaderState::Uninitialized,
            1 => ReaderState::Normal,
            _ => ReaderState::Dead,
        }
    }

    fn begin_normal(&self) {
        let _ = self.state.compare_exchange(
            ReaderState::Uninitialized as u8,
            ReaderState::Normal as u8,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }

    /// Queues an outbound command if the session is in steady state;
    /// silently dropped otherwise.
    fn send_when_normal(&self, cmd: ClientCommand) {
        if self.state() != ReaderState::Normal {
            debug!(target: "Session", "Dropping {cmd:?}, reader state is {:?}", self.state());
            return;
        }
        if let Some(tx) = self.out_tx.lock().expect("writer lock poisoned").as_ref() {
            let _ = tx.send(cmd);
        }
    }

    async fn close_socket(&self) {
        if let Some(socket) = self.socket.lock().await.as_ref() {
            socket.close().await;
        }
    }

    /// Terminal failure path, shared by every way a session can die. Runs
    /// its body at most once: marks the reader dead, clears playback, stops
    /// the ticker and schedules the banner-then-terminate sequence.
    fn fail_session(&self, banner: &str) {
        if self.mark_dead() == ReaderState::Dead {
            return;
        }
        info!(target: "Session", "Session over: {banner}");
        if let Some(queue) = self.queue.get() {
            queue.clear();
        }
        if let Some(ticker) = self.ticker.get() {
            ticker.stop();
        }
        self.out_tx.lock().expect("writer lock poisoned").take();
        let bus = self.bus.clone();
        let banner = banner.to_string();
        tokio::spawn(async move {
            bus.emit(UiEvent::ShowBanner(banner));
            sleep(TERMINATE_DELAY).await;
            bus.emit(UiEvent::Terminate);
        });
    }

    /// Interprets one inbound protocol line against the current state.
    async fn dispatch(&self, line: &str) {
        let cmd = ServerCommand::parse(line);
        match self.state() {
            ReaderState::Uninitialized => {
                // Nothing but the readiness line counts before the server
                // is ready.
                if cmd == Some(ServerCommand::Start) {
                    self.begin_normal();
                }
            }
            ReaderState::Normal => match cmd {
                Some(ServerCommand::Play(clip)) => {
                    if let Some(queue) = self.queue.get() {
                        queue.push(clip);
                    }
                }
                Some(ServerCommand::Clear) => {
                    if let Some(queue) = self.queue.get() {
                        queue.clear();
                    }
                }
                Some(ServerCommand::Image(image)) => {
                    self.bus.emit(UiEvent::ShowImage(image));
                }
                Some(ServerCommand::Name(name)) => {
                    self.bus.emit(UiEvent::ShowName(name));
                }
                Some(ServerCommand::Shutdown) => {
                    if let Some(queue) = self.queue.get() {
                        queue.push(SHUTDOWN_CLIP);
                    }
                }
                Some(ServerCommand::Start) | None => {
                    debug!(target: "Session", "Ignoring line: {line}");
                }
            },
            ReaderState::Dead => {}
        }
    }
}

#[async_trait]
impl QueueEvents for SessionShared {
    async fn on_drained(&self) {
        debug!(target: "Session", "Playback queue drained");
        if let Some(tx) = self.out_tx.lock().expect("writer lock poisoned").as_ref() {
            let _ = tx.send(ClientCommand::QueueEmpty);
        }
    }

    async fn on_shutdown_clip(&self) {
        info!(target: "Session", "Shutdown reached playback head, closing connection");
        self.close_socket().await;
    }
}

/// One simulated call, from connect to terminate. Constructing it starts
/// the session; the returned receiver is the presentation layer's event
/// stream. All public methods are safe to call from any thread in any
/// session state.
pub struct SessionController {
    shared: Arc<SessionShared>,
    dialpad_open: AtomicBool,
}

impl SessionController {
    pub fn start(
        config: SessionConfig,
        target: Option<String>,
        player: Arc<dyn ClipPlayer>,
    ) -> (Self, UnboundedReceiver<UiEvent>) {
        let (bus, events_rx) = UiEventBus::new();
        let shared = Arc::new(SessionShared::new(bus.clone()));
        let controller = Self {
            shared: shared.clone(),
            dialpad_open: AtomicBool::new(false),
        };

        // Fail fast on broken preconditions: no connection is attempted.
        let Some(target) = target.filter(|t| !t.is_empty()) else {
            error!(target: "Session", "Session started without a target number");
            shared.mark_dead();
            spawn_internal_error(bus, config.provider_name, "1");
            return (controller, events_rx);
        };
        let Some(addr) = config.server_addr() else {
            error!(target: "Session", "Server address is not configured");
            shared.mark_dead();
            spawn_internal_error(bus, config.provider_name, "2");
            return (controller, events_rx);
        };

        let provider_bus = bus.clone();
        let provider_name = config.provider_name.clone();
        tokio::spawn(async move {
            provider_bus.emit(UiEvent::ShowProviderInfo(provider_name));
            sleep(PROVIDER_INFO_VISIBLE).await;
            provider_bus.emit(UiEvent::HideProviderInfo);
        });

        let queue_events = Arc::downgrade(&(shared.clone() as Arc<dyn QueueEvents>));
        let _ = shared.queue.set(MediaQueue::new(player, queue_events));

        tokio::spawn(run_session(
            shared.clone(),
            config.party_name,
            addr,
            target,
        ));

        (controller, events_rx)
    }

    pub fn on_button_click(&self, button: ButtonRole) {
        match button {
            ButtonRole::ToggleDialpad => {
                // Purely local; no wire traffic.
                let was_open = self.dialpad_open.fetch_xor(true, Ordering::SeqCst);
                self.shared.bus.emit(if was_open {
                    UiEvent::HideDialpad
                } else {
                    UiEvent::ShowDialpad
                });
            }
            ButtonRole::EndCall => {
                let shared = self.shared.clone();
                tokio::spawn(async move {
                    shared.close_socket().await;
                    if let Some(queue) = shared.queue.get() {
                        queue.clear();
                    }
                });
            }
            ButtonRole::Mute | ButtonRole::Speaker => {}
        }
    }

    pub fn on_dialer_click(&self, key: char) {
        self.shared.send_when_normal(ClientCommand::ButtonPress(key));
    }

    pub fn on_shake(&self) {
        self.shared.send_when_normal(ClientCommand::Shake);
    }

    /// Explicit teardown: releases everything the session owns without
    /// waiting for the server. No further UI events follow.
    pub fn teardown(&self) {
        self.shared.mark_dead();
        self.shared
            .out_tx
            .lock()
            .expect("writer lock poisoned")
            .take();
        let shared = self.shared.clone();
        tokio::spawn(async move {
            shared.close_socket().await;
            if let Some(queue) = shared.queue.get() {
                queue.clear();
            }
            if let Some(ticker) = shared.ticker.get() {
                ticker.stop();
            }
        });
    }
}

fn spawn_internal_error(bus: Arc<UiEventBus>, provider_name: String, code: &'static str) {
    tokio::spawn(async move {
        bus.emit(UiEvent::ShowProviderInfo(provider_name));
        bus.emit(UiEvent::ShowBanner(format!("internal phone error ({code})")));
        sleep(INTERNAL_ERROR_VISIBLE).await;
        bus.emit(UiEvent::HideProviderInfo);
        sleep(INTERNAL_ERROR_LINGER).await;
        bus.emit(UiEvent::Terminate);
    });
}

/// The dedicated protocol worker: connects, hands off writes to a single
/// writer task, then blocks on the read loop until the session dies.
async fn run_session(
    shared: Arc<SessionShared>,
    party: String,
    addr: ServerAddr,
    target: String,
) {
    shared.bus.emit(UiEvent::ShowNumber(target.clone()));
    shared
        .bus
        .emit(UiEvent::ShowBanner(BANNER_DIALING.to_string()));

    let (socket, mut reader) = match LineSocket::connect(&addr.host, addr.port).await {
        Ok(pair) => pair,
        Err(e) => {
            error!(target: "Session", "Connect failed: {e}");
            shared.fail_session(BANNER_NO_SIGNAL);
            return;
        }
    };
    shared.bus.emit(UiEvent::HideBanner);
    *shared.socket.lock().await = Some(socket.clone());

    // A teardown may have raced the connect.
    if shared.state() == ReaderState::Dead {
        socket.close().await;
        return;
    }

    let _ = shared.ticker.set(ElapsedTicker::start(shared.bus.clone()));

    // All outbound lines funnel through this one task, so no two writers
    // ever interleave and per-producer ordering is preserved.
    let (out_tx, mut out_rx) = mpsc::unbounded_channel::<ClientCommand>();
    *shared.out_tx.lock().expect("writer lock poisoned") = Some(out_tx.clone());
    let writer_socket = socket.clone();
    let writer_shared = shared.clone();
    tokio::spawn(async move {
        while let Some(cmd) = out_rx.recv().await {
            if let Err(e) = writer_socket.write_line(&cmd.to_line()).await {
                warn!(target: "Session", "Write failed: {e}");
                let banner = if writer_socket.closed_by_us() {
                    BANNER_CALL_TERMINATED
                } else {
                    BANNER_NO_SIGNAL
                };
                writer_shared.fail_session(banner);
                return;
            }
        }
    });

    let _ = out_tx.send(ClientCommand::Hello { party, target });

    loop {
        match reader.read_line().await {
            Ok(ReadOutcome::Line(line)) => shared.dispatch(&line).await,
            Ok(ReadOutcome::EndOfStream) => {
                shared.fail_session(BANNER_CALL_TERMINATED);
                return;
            }
            Err(e) => {
                warn!(target: "Session", "Read failed: {e}");
                let banner = if socket.closed_by_us() {
                    BANNER_CALL_TERMINATED
                } else {
                    BANNER_NO_SIGNAL
                };
                shared.fail_session(banner);
                return;
            }
        }
    }
}
