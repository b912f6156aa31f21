use futures_util::{SinkExt, StreamExt};
use std::time::Duration;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;

use crate::error::{Error, Result};

/// Sends one text message over a WebSocket and returns the first reply.
#[derive(Clone, Debug)]
pub struct EchoProbe {
    url: String,
    message: String,
    timeout: Duration,
}

impl EchoProbe {
    pub fn new(url: impl Into<String>, message: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            message: message.into(),
            timeout,
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// The whole exchange, connect included, is bounded by the configured timeout.
    pub async fn probe(&self) -> Result<String> {
        tokio::time::timeout(self.timeout, self.exchange())
            .await
            .map_err(|_| Error::Timeout(self.timeout))?
    }

    async fn exchange(&self) -> Result<String> {
        let (mut socket, _) = connect_async(self.url.as_str()).await?;
        debug!("Connected to {}", self.url);

        socket.send(Message::Text(self.message.as_str().into())).await?;

        let reply = loop {
            match socket.next().await {
                Some(Ok(Message::Text(text))) => break text.as_str().to_owned(),
                Some(Ok(Message::Binary(bytes))) => {
                    break String::from_utf8_lossy(&bytes).into_owned();
                }
                Some(Ok(Message::Close(_))) | None => return Err(Error::ConnectionClosed),
                // Ping, pong and raw frames are not replies.
                Some(Ok(_)) => continue,
                Some(Err(err)) => return Err(err.into()),
            }
        };

        // Anything after the first reply is discarded.
        if let Err(err) = socket.close(None).await {
            debug!("Closing {} failed: {err}", self.url);
        }

        Ok(reply)
    }
}
