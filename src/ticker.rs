use crate::types::events::{UiEvent, UiEventBus};
use log::debug;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Emits `UpdateElapsed("mm:ss")` once a second while a session is
/// connected. One-shot: a stopped ticker stays stopped and a fresh one is
/// created per session. No wall-clock drift correction.
pub struct ElapsedTicker {
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl ElapsedTicker {
    pub fn start(bus: Arc<UiEventBus>) -> Self {
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // The first tick of a tokio interval fires immediately; the
            // counter starts one second in, at 00:00.
            interval.tick().await;
            let mut seconds: u64 = 0;
            loop {
                interval.tick().await;
                bus.emit(UiEvent::UpdateElapsed(format_elapsed(seconds)));
                seconds += 1;
            }
        });
        Self {
            handle: Mutex::new(Some(handle)),
        }
    }

    /// Idempotent; ticks stop immediately and permanently.
    pub fn stop(&self) {
        if let Some(handle) = self.handle.lock().expect("ticker lock poisoned").take() {
            debug!(target: "Session/Ticker", "Stopping elapsed-time ticker");
            handle.abort();
        }
    }
}

impl Drop for ElapsedTicker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn format_elapsed(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::timeout;

    #[test]
    fn formats_minutes_and_seconds() {
        assert_eq!(format_elapsed(0), "00:00");
        assert_eq!(format_elapsed(59), "00:59");
        assert_eq!(format_elapsed(60), "01:00");
        assert_eq!(format_elapsed(3600), "60:00");
    }

    #[tokio::test(start_paused = true)]
    async fn ticks_every_second_from_zero() {
        let (bus, mut rx) = UiEventBus::new();
        // Hold onto a bus handle like the session does, so aborting the
        // ticker task doesn't close the channel and end `recv` early.
        let ticker = ElapsedTicker::start(bus.clone());

        assert_eq!(
            rx.recv().await,
            Some(UiEvent::UpdateElapsed("00:00".to_string()))
        );
        assert_eq!(
            rx.recv().await,
            Some(UiEvent::UpdateElapsed("00:01".to_string()))
        );

        ticker.stop();
        ticker.stop();
        assert!(
            timeout(Duration::from_secs(5), rx.recv()).await.is_err(),
            "stopped ticker must not tick again"
        );
    }
}
