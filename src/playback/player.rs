//! Player abstraction
//!
//! A player plays one content item. It reports what happens to it through
//! [`PlayerEvent`]s sent on a [`PlayerEventSender`]; every sender is tagged
//! with the generation of the player it was handed to so that events from a
//! player that was already replaced can be told apart.

use crate::{content::ContentItem, error::Result};
use async_trait::async_trait;
use std::time::Duration;
use tokio::sync::mpsc;

/// Callback from a player
#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    /// The item is loaded and ready to play
    Prepared {
        /// Length of the item, zero when unknown
        duration: Duration,
    },
    /// Playback position
    Progress {
        /// Position from the start of the item
        position: Duration,
    },
    /// The player started or stopped rendering
    PlayingState {
        /// Whether the player is rendering
        playing: bool,
    },
    /// Chapter marks of the item
    ChapterList(Vec<Duration>),
    /// Playback failed
    Error {
        /// Error code
        what: i32,
        /// Implementation specific detail
        extra: i32,
    },
    /// Informational notice
    Info {
        /// Info code
        what: i32,
        /// Implementation specific detail
        extra: i32,
    },
    /// The item played to its end
    Completion,
}

/// Sending half handed to a player at creation
#[derive(Debug, Clone)]
pub struct PlayerEventSender {
    generation: u64,
    tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
}

impl PlayerEventSender {
    pub(crate) fn new(generation: u64, tx: mpsc::UnboundedSender<(u64, PlayerEvent)>) -> Self {
        Self { generation, tx }
    }

    /// Sends an event; returns false once the sequencer is gone
    pub fn send(&self, event: PlayerEvent) -> bool {
        self.tx.send((self.generation, event)).is_ok()
    }
}

/// Plays one content item
#[async_trait]
pub trait Player: Send {
    /// Starts or resumes playback
    async fn play(&mut self) -> Result<()>;

    /// Pauses playback
    async fn pause(&mut self) -> Result<()>;

    /// Moves the playback position
    async fn seek_to(&mut self, position: Duration) -> Result<()>;

    /// Stops playback and releases every resource held by the player
    async fn terminate(&mut self);
}

/// Creates players for content items
#[async_trait]
pub trait PlayerFactory: Send + Sync {
    /// Creates a player and starts loading `item`
    ///
    /// The player reports [`PlayerEvent::Prepared`] once it can play.
    async fn create(&self, item: &ContentItem, events: PlayerEventSender)
    -> Result<Box<dyn Player>>;
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use crate::error::Error;
    use std::sync::{Arc, Mutex};

    /// What happened to the players of a [`FakeFactory`]
    #[derive(Debug, Default)]
    pub struct Record {
        /// Calls, prefixed with the title of the item
        pub calls: Vec<String>,
        /// Event sender of the last created player
        pub sender: Option<PlayerEventSender>,
        /// Number of players not terminated yet
        pub live: usize,
        /// Highest number of live players seen
        pub max_live: usize,
    }

    pub struct FakePlayer {
        title: String,
        record: Arc<Mutex<Record>>,
    }

    impl FakePlayer {
        fn log(&self, call: String) {
            self.record.lock().unwrap().calls.push(call);
        }
    }

    #[async_trait]
    impl Player for FakePlayer {
        async fn play(&mut self) -> Result<()> {
            self.log(format!("{}:play", self.title));
            Ok(())
        }

        async fn pause(&mut self) -> Result<()> {
            self.log(format!("{}:pause", self.title));
            Ok(())
        }

        async fn seek_to(&mut self, position: Duration) -> Result<()> {
            self.log(format!("{}:seek:{}", self.title, position.as_millis()));
            Ok(())
        }

        async fn terminate(&mut self) {
            self.log(format!("{}:terminate", self.title));
            self.record.lock().unwrap().live -= 1;
        }
    }

    /// Factory creating [`FakePlayer`]s
    #[derive(Default, Clone)]
    pub struct FakeFactory {
        pub record: Arc<Mutex<Record>>,
        /// Titles whose players fail to be created
        pub broken: Arc<Mutex<Vec<String>>>,
    }

    impl FakeFactory {
        pub fn calls(&self) -> Vec<String> {
            self.record.lock().unwrap().calls.clone()
        }

        pub fn sender(&self) -> PlayerEventSender {
            self.record.lock().unwrap().sender.clone().unwrap()
        }
    }

    #[async_trait]
    impl PlayerFactory for FakeFactory {
        async fn create(
            &self,
            item: &ContentItem,
            events: PlayerEventSender,
        ) -> Result<Box<dyn Player>> {
            let mut record = self.record.lock().unwrap();
            record.calls.push(format!("{}:create", item.title));
            if self.broken.lock().unwrap().contains(&item.title) {
                return Err(Error::PlaybackPrepareFailed {
                    uri: item.title.clone(),
                    reason: "unsupported".to_string(),
                });
            }
            record.sender = Some(events);
            record.live += 1;
            record.max_live = record.max_live.max(record.live);
            Ok(Box::new(FakePlayer {
                title: item.title.clone(),
                record: self.record.clone(),
            }))
        }
    }
}
