//! DLNA render device for dlna-explorer
//!
//! A [`Render`] is the AVTransport side of a UPnP device: where selected
//! content is played. It is located once from a [`RenderSpec`] and then
//! queried for its transport state while a player drives it.

use crate::{
    config::{
        DLNA_ACTION_GET_POSITION_INFO, DLNA_ACTION_GET_TRANSPORT_INFO, DLNA_POSITION_INFO_PAYLOAD,
        DLNA_TRANSPORT_INFO_PAYLOAD, NO_DEVICES_DISCOVERED_MSG, RENDER_NOT_FOUND_MSG,
    },
    error::{Error, Result},
    utils::{format_device_with_service_description, retry_with_backoff},
};
use http::Uri;
use log::{debug, info};
use std::collections::HashMap;

use super::types::{PositionInfo, RenderSpec, TransportInfo};

/// A DLNA device which is capable of AVTransport actions.
#[derive(Debug, Clone)]
pub struct Render {
    /// The UPnP device
    pub device: rupnp::Device,
    /// The AVTransport service
    pub service: rupnp::Service,
}

impl Render {
    /// Locates the render described by `render_spec`
    pub async fn new(render_spec: RenderSpec) -> Result<Self> {
        let (found, context) = match &render_spec {
            RenderSpec::Location(device_url) => {
                info!("Render specified by location: {device_url}");
                (
                    Self::select_by_url(device_url).await?,
                    "Device not found at specified URL".to_string(),
                )
            }
            RenderSpec::Query(timeout, device_query) => {
                info!("Render specified by query: {device_query}");
                (
                    Self::select_by_query(*timeout, device_query).await?,
                    format!("No device found matching query '{device_query}'"),
                )
            }
            RenderSpec::First(timeout) => {
                info!("{RENDER_NOT_FOUND_MSG}");
                (
                    Self::discover(*timeout).await?.into_iter().next(),
                    NO_DEVICES_DISCOVERED_MSG.to_string(),
                )
            }
        };
        found.ok_or(Error::RenderNotFound {
            spec: render_spec,
            context,
        })
    }

    /// Loads the device description at `url`
    async fn select_by_url(url: &str) -> Result<Option<Self>> {
        debug!("Selecting device by url: {url}");
        let uri: Uri = url.parse().map_err(|e| Error::DeviceUrlParseError {
            url: url.to_owned(),
            reason: format!("Invalid URL format: {e}"),
        })?;

        let device = retry_with_backoff(
            || rupnp::Device::from_url(uri.clone()),
            &format!("Device creation from URL {url}"),
        )
        .await
        .map_err(|err| Error::DeviceCreationError {
            url: url.to_owned(),
            source: err,
        })?;

        Ok(Self::from_device(device))
    }

    /// Current position, from `GetPositionInfo`
    pub async fn position_info(&self) -> Result<PositionInfo> {
        self.query(
            DLNA_ACTION_GET_POSITION_INFO,
            DLNA_POSITION_INFO_PAYLOAD,
            PositionInfo::from_map,
        )
        .await
    }

    /// Current transport state (playing, paused...), from `GetTransportInfo`
    pub async fn transport_info(&self) -> Result<TransportInfo> {
        self.query(
            DLNA_ACTION_GET_TRANSPORT_INFO,
            DLNA_TRANSPORT_INFO_PAYLOAD,
            TransportInfo::from_map,
        )
        .await
    }

    async fn query<T>(
        &self,
        action: &str,
        payload: &str,
        parse: fn(&HashMap<String, String>) -> std::result::Result<T, String>,
    ) -> Result<T> {
        let response = self
            .service
            .action(self.device.url(), action, payload)
            .await
            .map_err(|err| Error::DlnaActionFailed {
                action: action.to_string(),
                source: err,
            })?;

        parse(&response).map_err(|error| Error::DlnaResponseParseError {
            action: action.to_string(),
            error,
        })
    }
}

impl std::fmt::Display for Render {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{}",
            format_device_with_service_description(
                &self.device.device_type().to_string(),
                &self.service.service_type().to_string(),
                self.device.friendly_name(),
                &self.device.url().to_string()
            )
        )
    }
}
