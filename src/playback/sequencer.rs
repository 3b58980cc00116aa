//! Playback sequencing
//!
//! The sequencer drives one playback session: it owns the player of the
//! current item, moves through the playlist according to the repeat mode and
//! decides what happens when an item completes or fails.
//!
//! State changes only come from commands and player events. After a player
//! error the sequencer waits for a grace delay before running the completion
//! logic; a second error replaces the pending deadline.

use crate::{
    config::{Config, EVENT_CHANNEL_CAPACITY, PLAYER_ERROR_MSG},
    content::{ContentCategory, ContentItem},
    error::{Error, Result},
    notify::{Notifier, NotifyLevel},
    settings::{RepeatMode, Settings},
};
use log::{debug, info, warn};
use std::{sync::Arc, time::Duration};
use tokio::{
    sync::{broadcast, mpsc, oneshot},
    task::JoinHandle,
    time::{Instant, sleep_until},
};

use super::{
    player::{Player, PlayerEvent, PlayerEventSender, PlayerFactory},
    playlist::PlaylistCursor,
    state::PlaybackState,
};

/// Called when next/previous cannot move
pub type SkipHandler = Box<dyn FnMut() + Send>;

/// Status update from a sequencer
#[derive(Debug, Clone, PartialEq)]
pub enum SequencerEvent {
    /// The playback state changed
    StateChanged(PlaybackState),
    /// Duration of the current item
    Duration(Duration),
    /// Position in the current item
    Progress(Duration),
    /// Chapter marks of the current item
    ChapterList(Vec<Duration>),
    /// A new item is being loaded
    ItemChanged {
        /// Index in the playlist
        index: usize,
        /// The item
        item: ContentItem,
    },
    /// The repeat mode changed
    RepeatModeChanged(RepeatMode),
    /// Informational notice from the player
    Info {
        /// Info code
        what: i32,
        /// Implementation specific detail
        extra: i32,
    },
    /// The session ended
    Finished,
}

/// Command sent to a spawned sequencer
#[derive(Debug)]
pub enum SequencerCommand {
    /// Resume playback
    Play,
    /// Pause playback
    Pause,
    /// Toggle between playing and paused
    Toggle,
    /// Seek, resuming playback
    SeekTo(Duration),
    /// Move to the next item; the reply tells whether it moved
    Next(oneshot::Sender<bool>),
    /// Move to the previous item; the reply tells whether it moved
    Previous(oneshot::Sender<bool>),
    /// Switch to the next repeat mode
    CycleRepeatMode,
    /// End the session
    Terminate,
}

/// Drives a playback session over a playlist
pub struct PlaybackSequencer {
    cursor: PlaylistCursor,
    repeat_mode: RepeatMode,
    category: ContentCategory,
    state: PlaybackState,
    factory: Arc<dyn PlayerFactory>,
    player: Option<Box<dyn Player>>,
    generation: u64,
    player_tx: mpsc::UnboundedSender<(u64, PlayerEvent)>,
    player_rx: Option<mpsc::UnboundedReceiver<(u64, PlayerEvent)>>,
    settings: Settings,
    notifier: Arc<dyn Notifier>,
    events: broadcast::Sender<SequencerEvent>,
    skip_handler: SkipHandler,
    autoplay: bool,
    error_grace_delay: Duration,
    too_short_play_time: Duration,
    started_at: Instant,
    skipped: bool,
    has_error: bool,
    duration: Duration,
    position: Duration,
    error_deadline: Option<Instant>,
    terminated: bool,
    finished: bool,
}

impl PlaybackSequencer {
    /// Creates a sequencer positioned at `index` of `items`
    ///
    /// The repeat mode is read from the settings for the category of the
    /// starting item. Nothing plays until [`PlaybackSequencer::start`].
    pub fn new(
        items: Vec<ContentItem>,
        index: usize,
        factory: Arc<dyn PlayerFactory>,
        settings: Settings,
        notifier: Arc<dyn Notifier>,
        config: &Config,
    ) -> Result<Self> {
        let cursor = PlaylistCursor::new(items, index);
        let Some(item) = cursor.current() else {
            return Err(Error::NoContent {
                context: "Playback needs at least one item".to_string(),
            });
        };
        let category = item.category();
        let repeat_mode = settings.repeat_mode(category);
        let (player_tx, player_rx) = mpsc::unbounded_channel();
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        debug!("New {category} session in {repeat_mode} mode");

        Ok(Self {
            cursor,
            repeat_mode,
            category,
            state: PlaybackState::Idle,
            factory,
            player: None,
            generation: 0,
            player_tx,
            player_rx: Some(player_rx),
            settings,
            notifier,
            events,
            skip_handler: Box::new(|| {}),
            autoplay: config.autoplay,
            error_grace_delay: config.error_grace_delay,
            too_short_play_time: config.too_short_play_time,
            started_at: Instant::now(),
            skipped: false,
            has_error: false,
            duration: Duration::ZERO,
            position: Duration::ZERO,
            error_deadline: None,
            terminated: false,
            finished: false,
        })
    }

    /// Sets the handler run when next/previous cannot move
    pub fn with_skip_handler(mut self, handler: impl FnMut() + Send + 'static) -> Self {
        self.skip_handler = Box::new(handler);
        self
    }

    /// Receives status updates from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SequencerEvent> {
        self.events.subscribe()
    }

    /// Current playback state
    pub fn state(&self) -> PlaybackState {
        self.state
    }

    /// Active repeat mode
    pub fn repeat_mode(&self) -> RepeatMode {
        self.repeat_mode
    }

    /// Category of the content being played
    pub fn category(&self) -> ContentCategory {
        self.category
    }

    /// The item being played
    pub fn current(&self) -> Option<&ContentItem> {
        self.cursor.current()
    }

    /// Index of the item being played
    pub fn index(&self) -> Option<usize> {
        self.cursor.index()
    }

    /// Last reported playback position
    pub fn position(&self) -> Duration {
        self.position
    }

    /// Length of the current item, zero when unknown
    pub fn duration(&self) -> Duration {
        self.duration
    }

    /// Pending forced completion after an error
    pub fn error_deadline(&self) -> Option<Instant> {
        self.error_deadline
    }

    /// Whether the session has ended
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Loads the current item
    pub async fn start(&mut self) {
        self.load_current().await;
    }

    /// Resumes playback; only meaningful while paused
    pub async fn play(&mut self) {
        if self.state != PlaybackState::Paused {
            return;
        }
        match self.resume_player().await {
            Ok(()) => self.set_state(PlaybackState::Playing),
            Err(e) => self.report_command_failure("play", e),
        }
    }

    /// Pauses playback; only meaningful while playing
    pub async fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        let result = match self.player.as_mut() {
            Some(player) => player.pause().await,
            None => Ok(()),
        };
        match result {
            Ok(()) => self.set_state(PlaybackState::Paused),
            Err(e) => self.report_command_failure("pause", e),
        }
    }

    /// Switches between playing and paused
    pub async fn toggle(&mut self) {
        match self.state {
            PlaybackState::Playing => self.pause().await,
            PlaybackState::Paused => self.play().await,
            _ => {}
        }
    }

    /// Seeks within the current item and resumes playback
    ///
    /// The position is clamped to the duration when the duration is known.
    pub async fn seek_to(&mut self, position: Duration) {
        if !self.state.is_active() {
            return;
        }
        let target = if self.duration.is_zero() {
            position
        } else {
            position.min(self.duration)
        };
        let result = match self.player.as_mut() {
            Some(player) => player.seek_to(target).await,
            None => Ok(()),
        };
        if let Err(e) = result {
            self.report_command_failure("seek", e);
            return;
        }
        self.skipped = true;
        self.position = target;
        self.emit(SequencerEvent::Progress(target));
        if self.state == PlaybackState::Paused {
            self.play().await;
        }
    }

    /// Moves to the next item, running the skip handler when that is not possible
    pub async fn next(&mut self) -> bool {
        let moved = self.advance(true).await;
        if !moved {
            (self.skip_handler)();
        }
        moved
    }

    /// Moves to the previous item, running the skip handler when that is not possible
    pub async fn previous(&mut self) -> bool {
        let moved = self.advance(false).await;
        if !moved {
            (self.skip_handler)();
        }
        moved
    }

    /// Switches to the next repeat mode and remembers it for this category
    pub async fn cycle_repeat_mode(&mut self) {
        self.repeat_mode = self.repeat_mode.next();
        self.settings
            .set_repeat_mode(self.category, self.repeat_mode);
        self.notifier
            .notify(NotifyLevel::Info, self.repeat_mode.message());
        self.emit(SequencerEvent::RepeatModeChanged(self.repeat_mode));
    }

    /// Ends the session; no callback or timer has any effect afterwards
    pub async fn terminate(&mut self) {
        if self.terminated {
            return;
        }
        self.terminated = true;
        self.error_deadline = None;
        self.release_player().await;
        self.set_state(PlaybackState::Idle);
        info!("Playback session terminated");
    }

    /// Handles an event of the player created with the given generation
    pub async fn on_player_event(&mut self, generation: u64, event: PlayerEvent) {
        if self.terminated || generation != self.generation {
            debug!("Ignoring event of stale player {generation}: {event:?}");
            return;
        }
        match event {
            PlayerEvent::Prepared { duration } => {
                if self.state != PlaybackState::Preparing {
                    return;
                }
                self.duration = duration;
                self.emit(SequencerEvent::Duration(duration));
                if !self.autoplay {
                    self.set_state(PlaybackState::Paused);
                    return;
                }
                match self.resume_player().await {
                    Ok(()) => self.set_state(PlaybackState::Playing),
                    Err(e) => {
                        warn!("Failed to start playback: {e}");
                        self.on_error();
                    }
                }
            }
            PlayerEvent::Progress { position } => {
                self.position = position;
                self.emit(SequencerEvent::Progress(position));
            }
            PlayerEvent::PlayingState { playing } => match (playing, self.state) {
                (true, PlaybackState::Paused) => self.set_state(PlaybackState::Playing),
                (false, PlaybackState::Playing) => self.set_state(PlaybackState::Paused),
                _ => {}
            },
            PlayerEvent::ChapterList(chapters) => {
                self.emit(SequencerEvent::ChapterList(chapters));
            }
            PlayerEvent::Error { what, extra } => {
                warn!("Player error what={what} extra={extra}");
                self.on_error();
            }
            PlayerEvent::Info { what, extra } => {
                self.emit(SequencerEvent::Info { what, extra });
            }
            PlayerEvent::Completion => {
                if !self.state.is_active() {
                    debug!("Ignoring completion in state {}", self.state);
                    return;
                }
                self.set_state(PlaybackState::Completed);
                self.on_completion().await;
            }
        }
    }

    /// Runs the completion logic once the error grace delay has passed
    pub async fn on_error_deadline(&mut self) {
        if self.terminated || self.error_deadline.take().is_none() {
            return;
        }
        self.set_state(PlaybackState::Completed);
        self.on_completion().await;
    }

    async fn on_completion(&mut self) {
        if self.repeat_mode == RepeatMode::RepeatOne && !self.has_error {
            debug!("Repeating current item");
            let result = match self.player.as_mut() {
                Some(player) => match player.seek_to(Duration::ZERO).await {
                    Ok(()) => player.play().await,
                    Err(e) => Err(e),
                },
                None => Ok(()),
            };
            match result {
                Ok(()) => {
                    self.position = Duration::ZERO;
                    self.set_state(PlaybackState::Playing);
                }
                Err(e) => {
                    warn!("Failed to repeat item: {e}");
                    self.on_error();
                }
            }
            return;
        }
        if self.category.is_audio() && (self.has_error || self.is_too_short()) {
            info!("Audio playback failed or ended too early, ending session");
            self.finish().await;
            return;
        }
        if !self.advance(true).await {
            self.finish().await;
        }
    }

    fn is_too_short(&self) -> bool {
        !self.skipped && self.started_at.elapsed() < self.too_short_play_time
    }

    fn on_error(&mut self) {
        self.has_error = true;
        self.notifier.notify(NotifyLevel::Error, PLAYER_ERROR_MSG);
        self.set_state(PlaybackState::Error);
        self.error_deadline = Some(Instant::now() + self.error_grace_delay);
    }

    fn report_command_failure(&self, command: &str, error: Error) {
        warn!("Player failed to {command}: {error}");
        self.notifier.notify(NotifyLevel::Error, &error.to_string());
    }

    async fn advance(&mut self, forward: bool) -> bool {
        if !self.repeat_mode.allows_skip() {
            debug!("Skipping disabled in {} mode", self.repeat_mode);
            return false;
        }
        let wrap = self.repeat_mode.wraps();
        let moved = if forward {
            self.cursor.next(wrap).is_some()
        } else {
            self.cursor.previous(wrap).is_some()
        };
        if moved {
            self.load_current().await;
        }
        moved
    }

    async fn load_current(&mut self) {
        self.release_player().await;
        let Some(item) = self.cursor.current().cloned() else {
            self.finish().await;
            return;
        };
        let index = self.cursor.index().unwrap_or_default();
        info!("Loading [{index}] {}", item.title);

        self.generation += 1;
        self.started_at = Instant::now();
        self.skipped = false;
        self.has_error = false;
        self.duration = Duration::ZERO;
        self.position = Duration::ZERO;
        self.error_deadline = None;
        self.emit(SequencerEvent::ItemChanged {
            index,
            item: item.clone(),
        });
        self.set_state(PlaybackState::Preparing);

        let events = PlayerEventSender::new(self.generation, self.player_tx.clone());
        match self.factory.create(&item, events).await {
            Ok(player) => self.player = Some(player),
            Err(e) => {
                warn!("Failed to prepare {}: {e}", item.title);
                self.on_error();
            }
        }
    }

    async fn resume_player(&mut self) -> Result<()> {
        match self.player.as_mut() {
            Some(player) => player.play().await,
            None => Ok(()),
        }
    }

    async fn release_player(&mut self) {
        if let Some(mut player) = self.player.take() {
            player.terminate().await;
        }
    }

    async fn finish(&mut self) {
        self.release_player().await;
        self.error_deadline = None;
        self.finished = true;
        self.emit(SequencerEvent::Finished);
        info!("Playback session finished");
    }

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Playback state {} -> {state}", self.state);
            self.state = state;
            self.emit(SequencerEvent::StateChanged(state));
        }
    }

    fn emit(&self, event: SequencerEvent) {
        let _ = self.events.send(event);
    }

    async fn execute(&mut self, command: SequencerCommand) {
        match command {
            SequencerCommand::Play => self.play().await,
            SequencerCommand::Pause => self.pause().await,
            SequencerCommand::Toggle => self.toggle().await,
            SequencerCommand::SeekTo(position) => self.seek_to(position).await,
            SequencerCommand::Next(reply) => {
                let moved = self.next().await;
                let _ = reply.send(moved);
            }
            SequencerCommand::Previous(reply) => {
                let moved = self.previous().await;
                let _ = reply.send(moved);
            }
            SequencerCommand::CycleRepeatMode => self.cycle_repeat_mode().await,
            SequencerCommand::Terminate => self.terminate().await,
        }
    }

    /// Starts the session and processes commands, player events and the
    /// error deadline until the session ends or every handle is dropped
    pub async fn run(mut self, mut commands: mpsc::UnboundedReceiver<SequencerCommand>) {
        let Some(mut player_events) = self.player_rx.take() else {
            warn!("Sequencer is already running");
            return;
        };
        self.start().await;
        while !self.finished && !self.terminated {
            let deadline = self.error_deadline;
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.execute(command).await,
                    None => break,
                },
                Some((generation, event)) = player_events.recv() => {
                    self.on_player_event(generation, event).await;
                }
                _ = wait_for_deadline(deadline) => self.on_error_deadline().await,
            }
        }
        self.terminate().await;
    }

    /// Runs the sequencer on its own task
    pub fn spawn(self) -> (SequencerHandle, JoinHandle<()>) {
        let (commands, rx) = mpsc::unbounded_channel();
        let handle = SequencerHandle {
            commands,
            events: self.events.clone(),
        };
        (handle, tokio::spawn(self.run(rx)))
    }
}

async fn wait_for_deadline(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Cloneable handle to a spawned sequencer
#[derive(Debug, Clone)]
pub struct SequencerHandle {
    commands: mpsc::UnboundedSender<SequencerCommand>,
    events: broadcast::Sender<SequencerEvent>,
}

impl SequencerHandle {
    fn send(&self, command: SequencerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| Error::SessionClosed)
    }

    /// Receives status updates from now on
    pub fn subscribe(&self) -> broadcast::Receiver<SequencerEvent> {
        self.events.subscribe()
    }

    /// Resumes playback
    pub fn play(&self) -> Result<()> {
        self.send(SequencerCommand::Play)
    }

    /// Pauses playback
    pub fn pause(&self) -> Result<()> {
        self.send(SequencerCommand::Pause)
    }

    /// Switches between playing and paused
    pub fn toggle(&self) -> Result<()> {
        self.send(SequencerCommand::Toggle)
    }

    /// Seeks within the current item
    pub fn seek_to(&self, position: Duration) -> Result<()> {
        self.send(SequencerCommand::SeekTo(position))
    }

    /// Moves to the next item; `false` when the repeat mode or the playlist forbids it
    pub async fn next(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(SequencerCommand::Next(tx))?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Moves to the previous item; `false` when the repeat mode or the playlist forbids it
    pub async fn previous(&self) -> Result<bool> {
        let (tx, rx) = oneshot::channel();
        self.send(SequencerCommand::Previous(tx))?;
        rx.await.map_err(|_| Error::SessionClosed)
    }

    /// Switches to the next repeat mode
    pub fn cycle_repeat_mode(&self) -> Result<()> {
        self.send(SequencerCommand::CycleRepeatMode)
    }

    /// Ends the session
    pub fn terminate(&self) -> Result<()> {
        self.send(SequencerCommand::Terminate)
    }
}
