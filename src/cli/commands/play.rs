//! Play command implementation for dlna-explorer
//!
//! This module implements the play command which turns a container of a
//! media server into a playlist and plays it on a render.

use crate::{
    config::Config,
    content::ContentItem,
    devices::{Render, RenderSpec},
    dlna::RendererPlayerFactory,
    error::Result,
    notify::LogNotifier,
    playback::{PlaybackSequencer, SequencerEvent},
    settings::{MemoryStorage, Settings},
    utils::format_time_text,
};
use log::{debug, info, warn};
use std::sync::Arc;
use tokio::sync::broadcast::error::RecvError;

use super::find_server;

/// Play command implementation
pub struct PlayCommand<'a> {
    args: &'a super::super::Play,
}

impl<'a> PlayCommand<'a> {
    /// Create a new play command
    pub fn new(args: &'a super::super::Play) -> Self {
        Self { args }
    }

    /// Execute the play command
    pub async fn run(&self, config: &Config) -> Result<()> {
        let items = self.load_playlist(config).await?;
        let render = self.select_render(config).await?;
        info!("Playing on {render}");

        let settings = Settings::initialize(Arc::new(MemoryStorage::new()))
            .wait()
            .await?;
        if let (Some(mode), Some(first)) = (
            self.args.repeat,
            items.get(self.args.index).or(items.last()),
        ) {
            settings.set_repeat_mode(first.category(), mode);
        }

        let factory = Arc::new(RendererPlayerFactory::new(
            render,
            config.position_poll_interval,
        ));
        let sequencer = PlaybackSequencer::new(
            items,
            self.args.index,
            factory,
            settings,
            Arc::new(LogNotifier),
            config,
        )?
        .with_skip_handler(|| info!("No other item to move to"));
        info!("Repeat mode: {}", sequencer.repeat_mode().message());

        let mut events = sequencer.subscribe();
        let (handle, task) = sequencer.spawn();
        loop {
            tokio::select! {
                event = events.recv() => match event {
                    Ok(SequencerEvent::ItemChanged { index, item }) => {
                        println!("[{index}] {}", item.title);
                    }
                    Ok(SequencerEvent::StateChanged(state)) => info!("Playback {state}"),
                    Ok(SequencerEvent::Progress(position)) => {
                        debug!("Position {}", format_time_text(position));
                    }
                    Ok(SequencerEvent::Finished) | Err(RecvError::Closed) => break,
                    Ok(event) => debug!("{event:?}"),
                    Err(RecvError::Lagged(missed)) => debug!("Missed {missed} playback events"),
                },
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupted, stopping playback");
                    if handle.terminate().is_err() {
                        debug!("Playback session already closed");
                    }
                    break;
                }
            }
        }

        drop(handle);
        if let Err(e) = task.await {
            warn!("Playback task ended abnormally: {e}");
        }
        Ok(())
    }

    /// Browse the container and keep its playable items
    async fn load_playlist(&self, config: &Config) -> Result<Vec<ContentItem>> {
        let (control_point, server) =
            find_server(config, self.args.server_query.as_deref()).await?;

        let listing = match control_point.select(&server).await {
            Ok(()) => {
                let listing = server.browse(&self.args.object_id).await;
                control_point.unselect().await;
                listing
            }
            Err(e) => Err(e),
        };
        control_point.terminate().await;

        let items: Vec<ContentItem> = listing?
            .into_iter()
            .filter(ContentItem::is_playable)
            .collect();
        info!(
            "{} playable items in '{}'",
            items.len(),
            self.args.object_id
        );
        Ok(items)
    }

    /// Select the render device based on command arguments
    async fn select_render(&self, config: &Config) -> Result<Render> {
        info!("Selecting render");
        Render::new(if let Some(device_url) = &self.args.device_url {
            RenderSpec::Location(device_url.to_owned())
        } else if let Some(device_query) = &self.args.device_query {
            RenderSpec::Query(config.discovery_timeout, device_query.to_owned())
        } else {
            RenderSpec::First(config.discovery_timeout)
        })
        .await
    }
}
