use std::time::Duration;

use anyhow::Context;
use helpdesk_sync::{
    Channel, ChannelTasks, HttpSupportApi, SupportSession, SupportSessionHandle, SyncConfig,
};
use tokio::sync::mpsc;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

/// A running session, optionally wired to the event channel
pub struct Connected {
    pub handle: SupportSessionHandle,
    channel: Option<ChannelTasks>,
}

impl Connected {
    /// REST only. Outbound events are dropped.
    pub fn rest_only(config: &SyncConfig) -> Self {
        let (outbound_tx, _) = mpsc::channel(1);
        let handle = SupportSession::spawn(HttpSupportApi::from_config(config), outbound_tx, None);
        Self {
            handle,
            channel: None,
        }
    }

    /// Connect the channel, join the room, and route both directions through
    /// the session.
    pub async fn live(config: &SyncConfig) -> anyhow::Result<Self> {
        let channel = Channel::connect(&config.channel_url, &config.room)
            .await
            .with_context(|| format!("connecting to {}", config.channel_url))?;
        let (outbound_tx, inbound_rx, tasks) = channel.into_parts();
        let handle = SupportSession::spawn(
            HttpSupportApi::from_config(config),
            outbound_tx,
            Some(inbound_rx),
        );
        Ok(Self {
            handle,
            channel: Some(tasks),
        })
    }

    pub fn is_live(&self) -> bool {
        self.channel.is_some()
    }

    /// Resolves when the server drops the event channel. Never resolves for
    /// a REST-only session.
    pub async fn channel_closed(&mut self) {
        match self.channel.as_mut() {
            Some(tasks) => tasks.closed().await,
            None => std::future::pending().await,
        }
    }

    /// Drop the session and give queued outbound frames a moment to leave
    pub async fn shutdown(self) {
        drop(self.handle);
        if let Some(tasks) = self.channel {
            if tokio::time::timeout(DRAIN_TIMEOUT, tasks.finish())
                .await
                .is_err()
            {
                tracing::warn!(
                    component = "cli",
                    event = "cli.channel.drain_timeout",
                    "Channel did not drain in time"
                );
            }
        }
    }
}
