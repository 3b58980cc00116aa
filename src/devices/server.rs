//! DLNA media server implementation for dlna-explorer
//!
//! A [`MediaServer`] wraps a UPnP device exposing a ContentDirectory service.
//! It backs the [`ServerControl`] capability of a [`MediaServerHandle`]:
//! GENA subscriptions on the ContentDirectory and paged `Browse` calls.

use crate::{
    config::{
        BROWSE_PAGE_SIZE, DLNA_ACTION_BROWSE, DLNA_ACTION_DESTROY_OBJECT,
        SUBSCRIPTION_TIMEOUT_SECS,
    },
    content::{ContentItem, parse_didl},
    error::{Error, Result},
    utils::{format_device_description, retry_with_backoff},
};
use async_trait::async_trait;
use futures_util::StreamExt;
use log::{debug, info, warn};
use quick_xml::escape::escape;
use std::{collections::HashMap, fmt::Display, future::Future, sync::Arc, time::Duration};
use tokio::{
    sync::Mutex,
    task::JoinHandle,
    time::{Instant, interval_at},
};

use super::{
    discovery::{CONTENT_DIRECTORY, format_device},
    types::{DeviceId, MediaServerHandle, ServerControl},
};

/// An open GENA subscription
#[derive(Debug)]
struct Subscription {
    sid: String,
    events: JoinHandle<()>,
    renewal: JoinHandle<()>,
}

impl Subscription {
    fn stop_tasks(&self) {
        self.events.abort();
        self.renewal.abort();
    }
}

/// Consecutive failed renewals after which the subscription is given up
const MAX_RENEWAL_FAILURES: u32 = 2;

/// Runs `renew` every `period` until it fails [`MAX_RENEWAL_FAILURES`] times in a row
async fn keep_renewed<F, Fut, E>(name: String, period: Duration, mut renew: F)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<(), E>>,
    E: Display,
{
    let mut ticker = interval_at(Instant::now() + period, period);
    let mut failures = 0;
    while failures < MAX_RENEWAL_FAILURES {
        ticker.tick().await;
        match renew().await {
            Ok(()) => {
                debug!("Renewed subscription to {name}");
                failures = 0;
            }
            Err(e) => {
                failures += 1;
                warn!(
                    "Failed to renew subscription to {name} \
                     ({failures}/{MAX_RENEWAL_FAILURES}): {e}"
                );
            }
        }
    }
    warn!("Subscription to {name} lapsed");
}

/// A DLNA device which exposes a ContentDirectory.
#[derive(Debug)]
pub struct MediaServer {
    /// The UPnP device
    pub device: rupnp::Device,
    /// The ContentDirectory service
    pub service: rupnp::Service,
    subscription: Mutex<Option<Subscription>>,
}

impl Drop for MediaServer {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.get_mut().take() {
            subscription.stop_tasks();
        }
    }
}

impl MediaServer {
    /// Creates a media server from a UPnP device if it has a ContentDirectory service
    pub fn from_device(device: rupnp::Device) -> Option<Self> {
        debug!(
            "Retrieving ContentDirectory service from device '{}'",
            format_device!(device)
        );
        match device.find_service(&CONTENT_DIRECTORY) {
            Some(service) => Some(Self {
                service: service.clone(),
                device,
                subscription: Mutex::new(None),
            }),
            None => {
                debug!("No ContentDirectory service found on {}", device.friendly_name());
                None
            }
        }
    }

    /// Wraps this server into a handle usable by the control point
    pub fn into_handle(self) -> MediaServerHandle {
        let id = DeviceId::new(self.device.udn());
        let device_type = self.device.device_type().to_string();
        let friendly_name = self.device.friendly_name().to_string();
        let location = self.device.url().to_string();
        MediaServerHandle::new(id, device_type, friendly_name, location, Arc::new(self))
    }

    /// Calls `Browse` for one page of direct children
    async fn browse_page(&self, object_id: &str, start: u32) -> Result<HashMap<String, String>> {
        let payload = build_browse_payload(object_id, start, BROWSE_PAGE_SIZE);
        self.service
            .action(self.device.url(), DLNA_ACTION_BROWSE, &payload)
            .await
            .map_err(|err| Error::DlnaActionFailed {
                action: DLNA_ACTION_BROWSE.to_string(),
                source: err,
            })
    }
}

#[async_trait]
impl ServerControl for MediaServer {
    async fn subscribe(&self) -> Result<()> {
        let mut subscription = self.subscription.lock().await;
        if subscription.is_some() {
            return Ok(());
        }

        let name = self.device.friendly_name().to_string();
        let (sid, stream) = self
            .service
            .subscribe(self.device.url(), SUBSCRIPTION_TIMEOUT_SECS)
            .await
            .map_err(|err| Error::SubscribeFailed {
                device: name.clone(),
                reason: err.to_string(),
            })?;
        info!("Subscribed to {name} ({sid})");

        let renewal = {
            let service = self.service.clone();
            let url = self.device.url().clone();
            let sid = sid.clone();
            tokio::spawn(keep_renewed(
                name.clone(),
                Duration::from_secs(u64::from(SUBSCRIPTION_TIMEOUT_SECS) / 2),
                move || {
                    let (service, url, sid) = (service.clone(), url.clone(), sid.clone());
                    async move {
                        service
                            .renew_subscription(&url, &sid, SUBSCRIPTION_TIMEOUT_SECS)
                            .await
                    }
                },
            ))
        };
        let events = tokio::spawn(async move {
            let mut stream = std::pin::pin!(stream);
            while let Some(event) = stream.next().await {
                match event {
                    Ok(vars) => debug!("Event from {name}: {vars:?}"),
                    Err(e) => {
                        warn!("Event stream of {name} failed: {e}");
                        break;
                    }
                }
            }
        });
        *subscription = Some(Subscription {
            sid,
            events,
            renewal,
        });
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        let Some(subscription) = self.subscription.lock().await.take() else {
            return Ok(());
        };
        subscription.stop_tasks();
        self.service
            .unsubscribe(self.device.url(), &subscription.sid)
            .await
            .map_err(|err| Error::UnsubscribeFailed {
                device: self.device.friendly_name().to_string(),
                reason: err.to_string(),
            })?;
        info!(
            "Unsubscribed from {} ({})",
            self.device.friendly_name(),
            subscription.sid
        );
        Ok(())
    }

    async fn browse(&self, object_id: &str) -> Result<Vec<ContentItem>> {
        let mut items = Vec::new();
        let mut start = 0;
        loop {
            let response = self.browse_page(object_id, start).await?;
            let didl = response.get("Result").map(String::as_str).unwrap_or("");
            let page = parse_didl(didl).map_err(|err| Error::DlnaResponseParseError {
                action: DLNA_ACTION_BROWSE.to_string(),
                error: err,
            })?;
            let returned = count_field(&response, "NumberReturned").unwrap_or(page.len() as u32);
            let total = count_field(&response, "TotalMatches").unwrap_or(0);
            items.extend(page);
            start += returned;
            if returned == 0 || start >= total {
                break;
            }
        }
        debug!("Browsed {} entries under '{object_id}'", items.len());
        Ok(items)
    }

    async fn destroy_object(&self, object_id: &str) -> Result<()> {
        let payload = build_destroy_object_payload(object_id);
        retry_with_backoff(
            || async {
                self.service
                    .action(self.device.url(), DLNA_ACTION_DESTROY_OBJECT, &payload)
                    .await
            },
            DLNA_ACTION_DESTROY_OBJECT,
        )
        .await
        .map_err(|err| Error::DlnaActionFailed {
            action: DLNA_ACTION_DESTROY_OBJECT.to_string(),
            source: err,
        })?;
        info!("Deleted '{object_id}' from {}", self.device.friendly_name());
        Ok(())
    }
}

fn count_field(response: &HashMap<String, String>, key: &str) -> Option<u32> {
    response.get(key).and_then(|value| value.trim().parse().ok())
}

/// Builds a ContentDirectory `Browse` payload listing direct children
fn build_browse_payload(object_id: &str, start: u32, count: u32) -> String {
    format!(
        r#"
    <ObjectID>{}</ObjectID>
    <BrowseFlag>BrowseDirectChildren</BrowseFlag>
    <Filter>*</Filter>
    <StartingIndex>{start}</StartingIndex>
    <RequestedCount>{count}</RequestedCount>
    <SortCriteria></SortCriteria>
"#,
        escape(object_id)
    )
}

/// Builds a ContentDirectory `DestroyObject` payload
fn build_destroy_object_payload(object_id: &str) -> String {
    format!(
        r#"
    <ObjectID>{}</ObjectID>
"#,
        escape(object_id)
    )
}
