use std::fmt;

/// Phase of a playback session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    /// Nothing loaded
    #[default]
    Idle,
    /// Waiting for the player to load the current item
    Preparing,
    /// Playing
    Playing,
    /// Loaded and paused
    Paused,
    /// The player reported an error; completion follows after a grace delay
    Error,
    /// The current item reached its end
    Completed,
}

impl PlaybackState {
    /// Whether play/pause/seek commands apply
    pub fn is_active(self) -> bool {
        matches!(self, PlaybackState::Playing | PlaybackState::Paused)
    }
}

impl fmt::Display for PlaybackState {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            PlaybackState::Idle => "idle",
            PlaybackState::Preparing => "preparing",
            PlaybackState::Playing => "playing",
            PlaybackState::Paused => "paused",
            PlaybackState::Error => "error",
            PlaybackState::Completed => "completed",
        };
        write!(f, "{name}")
    }
}
