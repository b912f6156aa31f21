use eventsource_client::{self as es, Client};
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tracing::{info, warn};

use crate::error::{Error, Result};

/// Reads a fixed-size batch of event payloads from a `text/event-stream` source.
///
/// The underlying client is built once and reused; every call to [`EventSampler::sample`]
/// opens a fresh connection.
#[derive(Clone)]
pub struct EventSampler {
    url: String,
    client: Arc<dyn Client>,
    batch_size: usize,
}

impl EventSampler {
    pub fn new(url: &str, batch_size: usize) -> Result<Self> {
        let client = es::ClientBuilder::for_url(url)
            .map_err(|err| Error::EventStream(format!("{url}: {err:?}")))?
            .reconnect(es::ReconnectOptions::reconnect(false).build())
            .build();

        Ok(Self {
            url: url.to_string(),
            client: Arc::new(client),
            batch_size,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Connects and waits, without a deadline, for the first full batch.
    pub async fn sample(&self) -> Result<Vec<String>> {
        let data = self.client.stream().filter_map(|event| async move {
            match event {
                Ok(es::SSE::Event(event)) => Some(Ok(event.data)),
                Ok(_) => None,
                Err(err) => Some(Err(Error::EventStream(format!("{err:?}")))),
            }
        });

        take_batch(data, self.batch_size).await
    }
}

/// Collects the first `size` non-empty payloads. A stream that ends early yields a short batch.
pub async fn take_batch<S>(data: S, size: usize) -> Result<Vec<String>>
where
    S: Stream<Item = Result<String>>,
{
    let mut data = std::pin::pin!(data);
    let mut batch = Vec::with_capacity(size);

    while batch.len() < size {
        match data.next().await {
            Some(Ok(item)) if item.is_empty() => continue,
            Some(Ok(item)) => {
                info!("Received event: {item}");
                batch.push(item);
            }
            Some(Err(err)) => return Err(err),
            None => {
                warn!("Event stream ended after {} of {} items", batch.len(), size);
                break;
            }
        }
    }

    Ok(batch)
}
