use async_trait::async_trait;
use log::info;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

/// Result of asking the player to start a clip. For `Started`, completion
/// (or playback failure, treated the same) is signalled through the
/// receiver; a dropped sender also counts as completion.
#[derive(Debug)]
pub enum PlayStart {
    Started(oneshot::Receiver<()>),
    NotFound,
}

/// Platform media-playback primitive. Clip names are opaque tokens resolved
/// by the host's asset system; the engine only sequences calls to this.
#[async_trait]
pub trait ClipPlayer: Send + Sync + 'static {
    async fn play(&self, clip: &str) -> PlayStart;

    /// Stops whatever is currently playing, if anything.
    async fn stop(&self);
}

/// Stand-in player that "plays" every clip for a fixed duration. Used by
/// the demo binary; real integrations supply their own [`ClipPlayer`].
pub struct SleepClipPlayer {
    clip_duration: Duration,
    current: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl SleepClipPlayer {
    pub fn new(clip_duration: Duration) -> Self {
        Self {
            clip_duration,
            current: tokio::sync::Mutex::new(None),
        }
    }
}

#[async_trait]
impl ClipPlayer for SleepClipPlayer {
    async fn play(&self, clip: &str) -> PlayStart {
        info!(target: "Session/MediaQueue", "Playback started: {clip}");
        let (done_tx, done_rx) = oneshot::channel();
        let duration = self.clip_duration;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(duration).await;
            let _ = done_tx.send(());
        });
        *self.current.lock().await = Some(handle);
        PlayStart::Started(done_rx)
    }

    async fn stop(&self) {
        if let Some(handle) = self.current.lock().await.take() {
            handle.abort();
        }
    }
}
