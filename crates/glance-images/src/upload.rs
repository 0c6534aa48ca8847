//! Raw streaming upload of image data.
//!
//! Uploads never go through the JSON request path: the source is piped chunk by
//! chunk into a `PUT /images/{id}/file` and the response text is handed back
//! uninterpreted.

use crate::operation::Operation;
use crate::request::RequestBuilder;
use futures::{StreamExt, TryStreamExt};
use glance_core::transport::{ByteStream, Transport};
use glance_core::Result;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;
use tracing::{info, warn};

/// Streams image data to Glance.
#[derive(Clone)]
pub struct UploadChannel {
    transport: Arc<dyn Transport>,
    requests: RequestBuilder,
}

impl UploadChannel {
    /// Create a channel over `transport`.
    #[must_use]
    pub fn new(transport: Arc<dyn Transport>, requests: RequestBuilder) -> Self {
        Self {
            transport,
            requests,
        }
    }

    /// Pipe everything readable from `source` into the image's file endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or `source` fails to read.
    pub async fn send<R>(&self, id: &str, source: R) -> Result<String>
    where
        R: AsyncRead + Send + 'static,
    {
        self.send_stream(id, ReaderStream::new(source).boxed()).await
    }

    /// Pipe an already chunked body into the image's file endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error if the connection fails or the stream yields an error.
    pub async fn send_stream(&self, id: &str, body: ByteStream) -> Result<String> {
        let sent = Arc::new(AtomicU64::new(0));
        let counter = Arc::clone(&sent);
        let body = body
            .inspect_ok(move |chunk| {
                counter.fetch_add(chunk.len() as u64, Ordering::Relaxed);
            })
            .boxed();

        let request = self.requests.upload(id);
        match self.transport.stream(request, body).await {
            Ok(response) => {
                info!(
                    operation = %Operation::Upload,
                    image_id = %id,
                    bytes_sent = sent.load(Ordering::Relaxed),
                    response = %response,
                    "Upload done"
                );
                Ok(response)
            }
            Err(err) => {
                warn!(
                    operation = %Operation::Upload,
                    image_id = %id,
                    bytes_sent = sent.load(Ordering::Relaxed),
                    error = %err,
                    "Upload failed"
                );
                Err(err)
            }
        }
    }
}

impl std::fmt::Debug for UploadChannel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UploadChannel")
            .field("requests", &self.requests)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bytes::Bytes;
    use glance_core::config::EndpointConfig;
    use glance_core::transport::{RawRequest, RequestOptions, TransportResponse};
    use glance_core::Error;
    use reqwest::Method;
    use std::sync::Mutex;

    /// Drains the body like a real connection and records what it saw.
    #[derive(Default)]
    struct RecordingTransport {
        received: Mutex<Vec<u8>>,
        requests: Mutex<Vec<RawRequest>>,
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, _: Method, _: RequestOptions) -> Result<TransportResponse> {
            Err(Error::InvalidRequest("json path not used".to_string()))
        }

        async fn stream(&self, request: RawRequest, mut body: ByteStream) -> Result<String> {
            self.requests.lock().unwrap().push(request);
            while let Some(chunk) = body.next().await {
                self.received.lock().unwrap().extend_from_slice(&chunk?);
            }
            Ok("{\"ok\":true}".to_string())
        }
    }

    fn channel(transport: Arc<RecordingTransport>) -> UploadChannel {
        let endpoint = EndpointConfig::new("http://glance:9292", "tok").unwrap();
        UploadChannel::new(transport, RequestBuilder::new(Arc::new(endpoint)))
    }

    #[tokio::test]
    async fn send_pipes_every_byte_in_order() {
        let transport = Arc::new(RecordingTransport::default());
        let data: Vec<u8> = (0..=255u8).cycle().take(64 * 1024 + 17).collect();

        let response = channel(Arc::clone(&transport))
            .send("img-1", std::io::Cursor::new(data.clone()))
            .await
            .unwrap();

        assert_eq!(response, "{\"ok\":true}");
        assert_eq!(*transport.received.lock().unwrap(), data);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].uri, "http://glance:9292/images/img-1/file");
    }

    #[tokio::test]
    async fn send_stream_surfaces_source_errors() {
        let transport = Arc::new(RecordingTransport::default());
        let chunks: Vec<std::io::Result<Bytes>> = vec![
            Ok(Bytes::from_static(b"head")),
            Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "source died")),
        ];

        let err = channel(transport)
            .send_stream("img-1", futures::stream::iter(chunks).boxed())
            .await
            .unwrap_err();
        assert_eq!(err, Error::Io("source died".to_string()));
    }
}
