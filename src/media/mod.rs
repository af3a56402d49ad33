pub mod player;
pub mod queue;

pub use player::{ClipPlayer, PlayStart, SleepClipPlayer};
pub use queue::{MediaQueue, QueueEvents};
