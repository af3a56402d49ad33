pub mod config;
pub mod media;
pub mod protocol;
pub mod session;
pub mod socket;
pub mod ticker;

pub mod types {
    pub mod events;
}
