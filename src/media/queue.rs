use crate::media::player::{ClipPlayer, PlayStart};
use crate::protocol::SHUTDOWN_CLIP;
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Session-side callbacks the queue drives.
#[async_trait]
pub trait QueueEvents: Send + Sync + 'static {
    /// The queue became empty after holding at least one entry. Fires
    /// exactly once per drain.
    async fn on_drained(&self);

    /// The `shutdown` sentinel reached the head of the queue. Runs before
    /// the sentinel is skipped, so the connection is closed first and
    /// draining proceeds normally afterwards.
    async fn on_shutdown_clip(&self);
}

enum QueueCmd {
    Push(String),
    Clear,
    Completed(u64),
}

/// Serializes clip playback: at most one clip plays at a time, in push
/// order. State lives in a single actor task, so no locking is needed;
/// `push` and `clear` are plain sends and safe from any thread.
pub struct MediaQueue {
    cmd_tx: UnboundedSender<QueueCmd>,
}

impl MediaQueue {
    /// `events` is held weakly so the queue's actor task does not keep the
    /// session alive; the actor exits once the `MediaQueue` is dropped.
    pub fn new(player: Arc<dyn ClipPlayer>, events: Weak<dyn QueueEvents>) -> Self {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_queue(player, events, cmd_tx.clone(), cmd_rx));
        Self { cmd_tx }
    }

    pub fn push(&self, clip: impl Into<String>) {
        let _ = self.cmd_tx.send(QueueCmd::Push(clip.into()));
    }

    /// Drops all pending entries and stops active playback.
    pub fn clear(&self) {
        let _ = self.cmd_tx.send(QueueCmd::Clear);
    }
}

async fn run_queue(
    player: Arc<dyn ClipPlayer>,
    events: Weak<dyn QueueEvents>,
    cmd_tx: UnboundedSender<QueueCmd>,
    mut cmd_rx: UnboundedReceiver<QueueCmd>,
) {
    let mut pending: VecDeque<String> = VecDeque::new();
    let mut playing = false;
    // Bumped on clear so completions from stopped playback are discarded.
    let mut generation: u64 = 0;

    while let Some(cmd) = cmd_rx.recv().await {
        match cmd {
            QueueCmd::Push(clip) => {
                if playing {
                    pending.push_back(clip);
                } else {
                    playing =
                        start_clip(clip, &mut pending, &player, &events, &cmd_tx, generation)
                            .await;
                }
            }
            QueueCmd::Completed(completed_gen) => {
                if completed_gen != generation {
                    debug!(target: "Session/MediaQueue", "Discarding stale completion");
                    continue;
                }
                debug!(target: "Session/MediaQueue", "Playback completed");
                match pending.pop_front() {
                    Some(next) => {
                        playing = start_clip(
                            next,
                            &mut pending,
                            &player,
                            &events,
                            &cmd_tx,
                            generation,
                        )
                        .await;
                    }
                    None => {
                        playing = false;
                        if let Some(events) = events.upgrade() {
                            events.on_drained().await;
                        }
                    }
                }
            }
            QueueCmd::Clear => {
                pending.clear();
                if playing {
                    player.stop().await;
                    playing = false;
                    generation = generation.wrapping_add(1);
                }
            }
        }
    }
}

/// Starts `clip`, skipping over sentinels and unknown clips until something
/// actually plays or the queue drains. Returns whether playback is active.
async fn start_clip(
    mut clip: String,
    pending: &mut VecDeque<String>,
    player: &Arc<dyn ClipPlayer>,
    events: &Weak<dyn QueueEvents>,
    cmd_tx: &UnboundedSender<QueueCmd>,
    generation: u64,
) -> bool {
    loop {
        let start = if clip == SHUTDOWN_CLIP {
            if let Some(events) = events.upgrade() {
                events.on_shutdown_clip().await;
            }
            PlayStart::NotFound
        } else {
            player.play(&clip).await
        };

        match start {
            PlayStart::Started(done) => {
                let cmd_tx = cmd_tx.clone();
                tokio::spawn(async move {
                    // A dropped sender counts as completion too.
                    let _ = done.await;
                    let _ = cmd_tx.send(QueueCmd::Completed(generation));
                });
                return true;
            }
            PlayStart::NotFound => {
                if clip != SHUTDOWN_CLIP {
                    warn!(target: "Session/MediaQueue", "Clip does not exist: {clip}");
                }
                match pending.pop_front() {
                    Some(next) => clip = next,
                    None => {
                        if let Some(events) = events.upgrade() {
                            events.on_drained().await;
                        }
                        return false;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tokio::sync::oneshot;
    use tokio::time::timeout;

    struct MockPlayer {
        started_tx: UnboundedSender<(String, oneshot::Sender<()>)>,
        stops: AtomicUsize,
    }

    impl MockPlayer {
        fn new() -> (Arc<Self>, UnboundedReceiver<(String, oneshot::Sender<()>)>) {
            let (started_tx, started_rx) = mpsc::unbounded_channel();
            (
                Arc::new(Self {
                    started_tx,
                    stops: AtomicUsize::new(0),
                }),
                started_rx,
            )
        }
    }

    #[async_trait]
    impl ClipPlayer for MockPlayer {
        async fn play(&self, clip: &str) -> PlayStart {
            if clip.starts_with("missing") {
                return PlayStart::NotFound;
            }
            let (done_tx, done_rx) = oneshot::channel();
            self.started_tx
                .send((clip.to_string(), done_tx))
                .expect("test dropped the start receiver");
            PlayStart::Started(done_rx)
        }

        async fn stop(&self) {
            self.stops.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[derive(Debug, PartialEq, Eq)]
    enum Signal {
        Drained,
        ShutdownClip,
    }

    struct MockEvents {
        tx: UnboundedSender<Signal>,
    }

    #[async_trait]
    impl QueueEvents for MockEvents {
        async fn on_drained(&self) {
            let _ = self.tx.send(Signal::Drained);
        }

        async fn on_shutdown_clip(&self) {
            let _ = self.tx.send(Signal::ShutdownClip);
        }
    }

    fn harness() -> (
        MediaQueue,
        UnboundedReceiver<(String, oneshot::Sender<()>)>,
        UnboundedReceiver<Signal>,
        Arc<MockPlayer>,
        Arc<dyn QueueEvents>,
    ) {
        let (player, started_rx) = MockPlayer::new();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();
        let events: Arc<dyn QueueEvents> = Arc::new(MockEvents { tx: signal_tx });
        let queue = MediaQueue::new(player.clone(), Arc::downgrade(&events));
        (queue, started_rx, signal_rx, player, events)
    }

    async fn expect_start(
        rx: &mut UnboundedReceiver<(String, oneshot::Sender<()>)>,
    ) -> (String, oneshot::Sender<()>) {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no clip started in time")
            .expect("queue task gone")
    }

    async fn expect_signal(rx: &mut UnboundedReceiver<Signal>) -> Signal {
        timeout(Duration::from_secs(1), rx.recv())
            .await
            .expect("no queue signal in time")
            .expect("queue task gone")
    }

    async fn assert_quiet(
        started_rx: &mut UnboundedReceiver<(String, oneshot::Sender<()>)>,
        signal_rx: &mut UnboundedReceiver<Signal>,
    ) {
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(started_rx.try_recv().is_err());
        assert!(signal_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn plays_in_order_one_at_a_time() {
        let (queue, mut started_rx, mut signal_rx, _player, _events) = harness();

        queue.push("a");
        let (clip_a, done_a) = expect_start(&mut started_rx).await;
        assert_eq!(clip_a, "a");

        // "b" must only be appended while "a" plays.
        queue.push("b");
        assert_quiet(&mut started_rx, &mut signal_rx).await;

        done_a.send(()).unwrap();
        let (clip_b, done_b) = expect_start(&mut started_rx).await;
        assert_eq!(clip_b, "b");

        done_b.send(()).unwrap();
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::Drained);
        assert_quiet(&mut started_rx, &mut signal_rx).await;
    }

    #[tokio::test(start_paused = true)]
    async fn unknown_clip_advances_immediately() {
        let (queue, mut started_rx, mut signal_rx, _player, _events) = harness();

        queue.push("missing-clip");
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::Drained);
        assert!(started_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_sentinel_closes_then_drains() {
        let (queue, mut started_rx, mut signal_rx, _player, _events) = harness();

        queue.push(SHUTDOWN_CLIP);
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::ShutdownClip);
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::Drained);
        assert!(started_rx.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn sentinel_behind_playing_clip_waits_for_completion() {
        let (queue, mut started_rx, mut signal_rx, _player, _events) = harness();

        queue.push("a");
        let (_, done_a) = expect_start(&mut started_rx).await;
        queue.push(SHUTDOWN_CLIP);
        assert_quiet(&mut started_rx, &mut signal_rx).await;

        done_a.send(()).unwrap();
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::ShutdownClip);
        assert_eq!(expect_signal(&mut signal_rx).await, Signal::Drained);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_stops_playback_and_discards_stale_completion() {
        let (queue, mut started_rx, mut signal_rx, player, _events) = harness();

        queue.push("a");
        let (_, done_a) = expect_start(&mut started_rx).await;
        queue.push("b");
        queue.clear();

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(player.stops.load(Ordering::SeqCst), 1);

        // Completion of the stopped clip must not resurrect "b" or drain.
        done_a.send(()).unwrap();
        assert_quiet(&mut started_rx, &mut signal_rx).await;

        queue.push("c");
        let (clip_c, _done_c) = expect_start(&mut started_rx).await;
        assert_eq!(clip_c, "c");
    }
}
