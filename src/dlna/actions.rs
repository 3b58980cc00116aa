//! AVTransport actions for dlna-explorer
//!
//! This module contains the transport control actions sent to a render:
//! loading a URI, play, pause, stop and seek.

use crate::{
    config::{
        DLNA_ACTION_PAUSE, DLNA_ACTION_PLAY, DLNA_ACTION_SEEK, DLNA_ACTION_SET_AV_TRANSPORT_URI,
        DLNA_ACTION_STOP, DLNA_DEFAULT_SPEED, DLNA_INSTANCE_ID, LOG_MSG_SETTING_URI,
    },
    devices::Render,
    error::{Error, Result},
    utils::{format_dlna_time, retry_with_backoff},
};
use log::{debug, info};
use std::time::Duration;

/// Builds a DLNA play payload with configurable parameters
fn build_play_payload(instance_id: u32, speed: u32) -> String {
    format!(
        r#"
    <InstanceID>{instance_id}</InstanceID>
    <Speed>{speed}</Speed>
"#
    )
}

/// Builds a payload carrying only the instance id (Pause, Stop)
fn build_instance_payload(instance_id: u32) -> String {
    format!(
        r#"
    <InstanceID>{instance_id}</InstanceID>
"#
    )
}

/// Builds a relative time seek payload
fn build_seek_payload(instance_id: u32, position: Duration) -> String {
    format!(
        r#"
    <InstanceID>{instance_id}</InstanceID>
    <Unit>REL_TIME</Unit>
    <Target>{}</Target>
"#,
        format_dlna_time(position)
    )
}

/// Runs an AVTransport action with retries, mapping failures to a playback error
async fn run_action(render: &Render, action: &str, payload: &str, context: &str) -> Result<()> {
    retry_with_backoff(
        || async {
            render
                .service
                .action(render.device.url(), action, payload)
                .await
        },
        action,
    )
    .await
    .map(|_| ())
    .map_err(|err| Error::DlnaPlaybackFailed {
        source: err,
        context: context.to_string(),
    })
}

/// Loads a URI with its DIDL-Lite metadata into the render
pub async fn set_av_transport_uri(render: &Render, payload: &str, uri: &str) -> Result<()> {
    info!("{LOG_MSG_SETTING_URI}: {uri}");
    debug!("SetAVTransportURI payload: '{payload}'");
    retry_with_backoff(
        || async {
            render
                .service
                .action(
                    render.device.url(),
                    DLNA_ACTION_SET_AV_TRANSPORT_URI,
                    payload,
                )
                .await
        },
        DLNA_ACTION_SET_AV_TRANSPORT_URI,
    )
    .await
    .map_err(|err| Error::DlnaSetTransportUriFailed {
        source: err,
        uri: uri.to_string(),
    })?;
    Ok(())
}

/// Pauses playback on a DLNA device
pub async fn pause(render: &Render) -> Result<()> {
    let payload = build_instance_payload(DLNA_INSTANCE_ID);
    run_action(
        render,
        DLNA_ACTION_PAUSE,
        &payload,
        "Failed to pause media playback on render device",
    )
    .await?;

    info!("Media playback paused");
    Ok(())
}

/// Starts or resumes playback on a DLNA device
pub async fn resume(render: &Render) -> Result<()> {
    let payload = build_play_payload(DLNA_INSTANCE_ID, DLNA_DEFAULT_SPEED);
    run_action(
        render,
        DLNA_ACTION_PLAY,
        &payload,
        "Failed to resume media playback on render device",
    )
    .await?;

    info!("Media playback resumed");
    Ok(())
}

/// Stops playback on a DLNA device
pub async fn stop(render: &Render) -> Result<()> {
    let payload = build_instance_payload(DLNA_INSTANCE_ID);
    run_action(
        render,
        DLNA_ACTION_STOP,
        &payload,
        "Failed to stop media playback on render device",
    )
    .await?;

    info!("Media playback stopped");
    Ok(())
}

/// Moves the playback position of a DLNA device
pub async fn seek(render: &Render, position: Duration) -> Result<()> {
    let payload = build_seek_payload(DLNA_INSTANCE_ID, position);
    run_action(
        render,
        DLNA_ACTION_SEEK,
        &payload,
        "Failed to seek on render device",
    )
    .await?;

    debug!("Seeked to {}", format_dlna_time(position));
    Ok(())
}
