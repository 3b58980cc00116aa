//! Playback of content listings
//!
//! A [`PlaybackSequencer`] walks a playlist and drives one [`Player`] at a
//! time. Players come from a [`PlayerFactory`]; the crate ships one that plays
//! on a DLNA renderer.

pub mod player;
pub mod playlist;
pub mod sequencer;
pub mod state;

pub use player::{Player, PlayerEvent, PlayerEventSender, PlayerFactory};
pub use playlist::PlaylistCursor;
pub use sequencer::{
    PlaybackSequencer, SequencerCommand, SequencerEvent, SequencerHandle, SkipHandler,
};
pub use state::PlaybackState;
