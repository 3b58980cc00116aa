//! Player backed by a DLNA render
//!
//! The render is driven with AVTransport actions and polled for its transport
//! state and position. Poll results are translated into player events.

use crate::{
    content::ContentItem,
    devices::{PositionInfo, Render, TransportInfo},
    error::Result,
    playback::{Player, PlayerEvent, PlayerEventSender, PlayerFactory},
    utils::time_str_to_milliseconds,
};
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::{task::JoinHandle, time::interval};

use super::{
    actions::{pause, resume, seek, set_av_transport_uri, stop},
    metadata::{build_metadata, build_setavtransporturi_payload},
};

/// Error code reported when the render signals a failure
pub const ERROR_UNKNOWN: i32 = 1;

/// Error code reported when the render stops answering
pub const ERROR_IO: i32 = -1004;

/// Consecutive failed polls after which the render is considered gone
const MAX_POLL_FAILURES: u32 = 3;

/// Creates players on one render
#[derive(Debug, Clone)]
pub struct RendererPlayerFactory {
    render: Render,
    poll_interval: Duration,
}

impl RendererPlayerFactory {
    /// Creates a factory for players on `render`, polled every `poll_interval`
    pub fn new(render: Render, poll_interval: Duration) -> Self {
        Self {
            render,
            poll_interval,
        }
    }
}

#[async_trait]
impl PlayerFactory for RendererPlayerFactory {
    async fn create(
        &self,
        item: &ContentItem,
        events: PlayerEventSender,
    ) -> Result<Box<dyn Player>> {
        let metadata = build_metadata(item)?;
        let uri = item.uri.as_deref().unwrap_or_default();
        let payload = build_setavtransporturi_payload(uri, &metadata);
        set_av_transport_uri(&self.render, &payload, uri).await?;

        events.send(PlayerEvent::Prepared {
            duration: item.duration.unwrap_or_default(),
        });
        let poller = tokio::spawn(poll_render(
            self.render.clone(),
            events,
            self.poll_interval,
        ));
        Ok(Box::new(RendererPlayer {
            render: self.render.clone(),
            poller: Some(poller),
        }))
    }
}

/// Plays one item on a render
pub struct RendererPlayer {
    render: Render,
    poller: Option<JoinHandle<()>>,
}

#[async_trait]
impl Player for RendererPlayer {
    async fn play(&mut self) -> Result<()> {
        resume(&self.render).await
    }

    async fn pause(&mut self) -> Result<()> {
        pause(&self.render).await
    }

    async fn seek_to(&mut self, position: Duration) -> Result<()> {
        seek(&self.render, position).await
    }

    async fn terminate(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
        if let Err(e) = stop(&self.render).await {
            warn!("Failed to stop render: {e}");
        }
    }
}

impl Drop for RendererPlayer {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.abort();
        }
    }
}

/// Status queries the poller needs from a render
#[async_trait]
trait TransportStatus: Send + Sync + 'static {
    async fn transport_info(&self) -> Result<TransportInfo>;
    async fn position_info(&self) -> Result<PositionInfo>;
}

#[async_trait]
impl TransportStatus for Render {
    async fn transport_info(&self) -> Result<TransportInfo> {
        Render::transport_info(self).await
    }

    async fn position_info(&self) -> Result<PositionInfo> {
        Render::position_info(self).await
    }
}

/// Follows the transport state of a render across polls
#[derive(Debug, Default)]
struct TransportTracker {
    started: bool,
    playing: bool,
}

impl TransportTracker {
    /// Appends the events implied by a poll; returns true when the render failed
    ///
    /// A stop after playback reports a completion and re-arms the tracker, so
    /// the same item can be played again and complete again.
    fn update(&mut self, info: &TransportInfo, events: &mut Vec<PlayerEvent>) -> bool {
        if info.transport_status == "ERROR_OCCURRED" {
            events.push(PlayerEvent::Error {
                what: ERROR_UNKNOWN,
                extra: 0,
            });
            return true;
        }
        match info.transport_state.as_str() {
            "PLAYING" => {
                if !self.playing {
                    events.push(PlayerEvent::PlayingState { playing: true });
                }
                self.started = true;
                self.playing = true;
            }
            "PAUSED_PLAYBACK" => {
                if self.playing {
                    events.push(PlayerEvent::PlayingState { playing: false });
                }
                self.playing = false;
            }
            "STOPPED" | "NO_MEDIA_PRESENT" if self.started => {
                events.push(PlayerEvent::Completion);
                self.started = false;
                self.playing = false;
            }
            _ => {}
        }
        false
    }
}

/// Polls the render until it fails or the sequencer goes away
///
/// The task is aborted by the player owning it.
async fn poll_render<R: TransportStatus>(render: R, events: PlayerEventSender, period: Duration) {
    let mut ticker = interval(period);
    let mut tracker = TransportTracker::default();
    let mut failures = 0;
    loop {
        ticker.tick().await;
        let info = match render.transport_info().await {
            Ok(info) => {
                failures = 0;
                info
            }
            Err(e) => {
                failures += 1;
                warn!("Polling render failed ({failures}/{MAX_POLL_FAILURES}): {e}");
                if failures >= MAX_POLL_FAILURES {
                    events.send(PlayerEvent::Error {
                        what: ERROR_IO,
                        extra: 0,
                    });
                    return;
                }
                continue;
            }
        };

        let mut pending = Vec::new();
        let failed = tracker.update(&info, &mut pending);
        if tracker.playing {
            match render.position_info().await {
                Ok(position) => pending.push(PlayerEvent::Progress {
                    position: Duration::from_millis(time_str_to_milliseconds(&position.rel_time)),
                }),
                Err(e) => debug!("Failed to read position: {e}"),
            }
        }
        for event in pending {
            if !events.send(event) {
                return;
            }
        }
        if failed {
            debug!("Render reported an error in state {}", info.transport_state);
            return;
        }
    }
}
