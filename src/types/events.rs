use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// Fixed caller-image references the server can select between.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallerImage {
    Old,
    Child,
    Alf,
}

/// In-call button roles forwarded by the presentation layer. Only
/// `ToggleDialpad` and `EndCall` do anything at this layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ButtonRole {
    ToggleDialpad,
    EndCall,
    Mute,
    Speaker,
}

/// Everything the engine reports to the presentation layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiEvent {
    ShowImage(CallerImage),
    ShowNumber(String),
    ShowName(String),
    ShowBanner(String),
    HideBanner,
    ShowProviderInfo(String),
    HideProviderInfo,
    ShowDialpad,
    HideDialpad,
    UpdateElapsed(String),
    Terminate,
}

/// Single ordered channel per session between the engine's workers and the
/// presentation layer. `Terminate` latches the bus shut: it is delivered at
/// most once and nothing is delivered after it, no matter which worker
/// emits what.
#[derive(Debug)]
pub struct UiEventBus {
    tx: UnboundedSender<UiEvent>,
    terminated: AtomicBool,
}

impl UiEventBus {
    pub fn new() -> (Arc<Self>, UnboundedReceiver<UiEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (
            Arc::new(Self {
                tx,
                terminated: AtomicBool::new(false),
            }),
            rx,
        )
    }

    pub fn emit(&self, event: UiEvent) {
        if self.terminated.load(Ordering::Acquire) {
            return;
        }
        if matches!(event, UiEvent::Terminate)
            && self.terminated.swap(true, Ordering::AcqRel)
        {
            return;
        }
        // The receiver dropping just means the presentation layer went away.
        let _ = self.tx.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn terminate_latches_the_bus() {
        let (bus, mut rx) = UiEventBus::new();
        bus.emit(UiEvent::ShowName("Alice".to_string()));
        bus.emit(UiEvent::Terminate);
        bus.emit(UiEvent::Terminate);
        bus.emit(UiEvent::HideBanner);

        assert_eq!(rx.recv().await, Some(UiEvent::ShowName("Alice".to_string())));
        assert_eq!(rx.recv().await, Some(UiEvent::Terminate));
        assert!(rx.try_recv().is_err());
    }
}
