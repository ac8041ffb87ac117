//! Base-URL client that GETs an endpoint and decodes JSON or an image.
//!
//! # Design
//! `HttpClient` holds `base_url` and its wiring, never per-call state. Each
//! call runs one linear pipeline: compose the URL, GET it, reject an empty
//! body, decode. The future methods (`get_json`, `get_image`) return the
//! outcome directly; the callback methods (`fetch_json`, `fetch_image`) spawn
//! the same pipeline and hand its single outcome to `Delivery`.

use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;
use tracing::debug;
use url::Url;

use crate::delivery::Delivery;
use crate::error::{FetchError, TransportError};
use crate::http::{Transport, UreqTransport};
use crate::runtime;

/// Decoded image returned by `get_image` / `fetch_image`.
pub type Image = image::DynamicImage;

/// Stateless GET client rooted at a base URL.
///
/// Cloning is cheap; clones share the transport and delivery configuration.
#[derive(Clone)]
pub struct HttpClient {
    base_url: String,
    transport: Arc<dyn Transport>,
    delivery: Delivery,
    runtime: Option<Handle>,
}

impl HttpClient {
    /// Client with the default ureq transport and inline delivery.
    ///
    /// `base_url` is stored verbatim and not validated until a call is made.
    pub fn new(base_url: &str) -> Self {
        Self::builder(base_url).build()
    }

    pub fn builder(base_url: &str) -> HttpClientBuilder {
        HttpClientBuilder {
            base_url: base_url.to_string(),
            transport: None,
            delivery: Delivery::inline(),
            runtime: None,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Join `base_url` and `endpoint` by plain concatenation and validate.
    ///
    /// The joined string is returned as-is: it must already be an absolute
    /// URL and a strict URI, since nothing here escapes or normalizes it.
    pub fn endpoint_url(&self, endpoint: &str) -> Result<String, FetchError> {
        let joined = format!("{}{endpoint}", self.base_url);
        // `Url` requires a scheme and a valid host; `Uri` refuses the
        // characters `Url` would percent-encode.
        let checked: Result<(), Box<dyn std::error::Error + Send + Sync>> = match Url::parse(&joined) {
            Ok(_) => http::Uri::try_from(joined.as_str())
                .map(drop)
                .map_err(Into::into),
            Err(err) => Err(err.into()),
        };
        match checked {
            Ok(()) => Ok(joined),
            Err(source) => Err(FetchError::InvalidUrl {
                url: joined,
                source,
            }),
        }
    }

    pub async fn get_json<T: DeserializeOwned>(&self, endpoint: &str) -> Result<T, FetchError> {
        let url = self.endpoint_url(endpoint)?;
        self.json_at(&url).await
    }

    pub async fn get_image(&self, endpoint: &str) -> Result<Image, FetchError> {
        let url = self.endpoint_url(endpoint)?;
        self.image_at(&url).await
    }

    /// GET `endpoint` and decode it as `T`, reporting the outcome to
    /// `callback` exactly once.
    ///
    /// Returns immediately. An invalid URL is reported without spawning
    /// anything; otherwise the request runs on the pinned runtime or the
    /// shared one.
    pub fn fetch_json<T, F>(&self, endpoint: &str, callback: F)
    where
        T: DeserializeOwned + Send + 'static,
        F: FnOnce(Result<T, FetchError>) + Send + 'static,
    {
        let url = match self.endpoint_url(endpoint) {
            Ok(url) => url,
            Err(err) => return self.delivery.deliver(Err(err), callback),
        };
        let client = self.clone();
        self.spawn_call(async move { client.json_at(&url).await }, callback);
    }

    /// Image counterpart of `fetch_json`.
    pub fn fetch_image<F>(&self, endpoint: &str, callback: F)
    where
        F: FnOnce(Result<Image, FetchError>) + Send + 'static,
    {
        let url = match self.endpoint_url(endpoint) {
            Ok(url) => url,
            Err(err) => return self.delivery.deliver(Err(err), callback),
        };
        let client = self.clone();
        self.spawn_call(async move { client.image_at(&url).await }, callback);
    }

    async fn json_at<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let body = self.body_at(url).await?;
        decode_json(&body)
    }

    async fn image_at(&self, url: &str) -> Result<Image, FetchError> {
        let body = self.body_at(url).await?;
        decode_image(&body)
    }

    async fn body_at(&self, url: &str) -> Result<Bytes, FetchError> {
        debug!(url, "GET");
        let response = self
            .transport
            .get(url)
            .await
            .inspect_err(|err| debug!(url, error = %err, "transport failed"))?;
        let content_type = response.header("content-type").unwrap_or("-");
        if response.body.is_empty() {
            debug!(url, status = response.status, content_type, "empty body");
            return Err(FetchError::EmptyBody);
        }
        debug!(
            url,
            status = response.status,
            content_type,
            bytes = response.body.len(),
            "body received"
        );
        Ok(response.body)
    }

    /// Run `work` in its own task and hand the outcome to `callback`.
    ///
    /// A panic inside `work` comes back as a `JoinError` and is reported as a
    /// transport error. If the runtime drops the task before it finishes, the
    /// `Completion` guard reports that instead.
    fn spawn_call<T, F, Fut>(&self, work: Fut, callback: F)
    where
        T: Send + 'static,
        F: FnOnce(Result<T, FetchError>) + Send + 'static,
        Fut: Future<Output = Result<T, FetchError>> + Send + 'static,
    {
        let completion = Completion::new(self.delivery.clone(), callback);
        let handle = match self.runtime.clone().map_or_else(runtime::shared, Ok) {
            Ok(handle) => handle,
            Err(err) => return completion.complete(Err(err.into())),
        };
        let inner = handle.clone();
        // Detached: calls cannot be cancelled once started.
        handle.spawn(async move {
            let result = match inner.spawn(work).await {
                Ok(result) => result,
                Err(err) => {
                    debug!(error = %err, "request task failed");
                    Err(TransportError::new(err).into())
                }
            };
            completion.complete(result);
        });
    }
}

/// Owns a pending callback until the call reports its outcome.
///
/// Dropping it unreported delivers a transport error, so a task torn down
/// with its runtime still completes the callback.
struct Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T, FetchError>) + Send + 'static,
{
    pending: Option<(Delivery, F)>,
    _result: PhantomData<fn() -> T>,
}

impl<T, F> Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T, FetchError>) + Send + 'static,
{
    fn new(delivery: Delivery, callback: F) -> Self {
        Self {
            pending: Some((delivery, callback)),
            _result: PhantomData,
        }
    }

    fn complete(mut self, result: Result<T, FetchError>) {
        if let Some((delivery, callback)) = self.pending.take() {
            delivery.deliver(result, callback);
        }
    }
}

impl<T, F> Drop for Completion<T, F>
where
    T: Send + 'static,
    F: FnOnce(Result<T, FetchError>) + Send + 'static,
{
    fn drop(&mut self) {
        if let Some((delivery, callback)) = self.pending.take() {
            debug!("request task dropped before completion");
            let err = TransportError::new("request dropped before completion");
            delivery.deliver(Err(err.into()), callback);
        }
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("base_url", &self.base_url)
            .field("delivery", &self.delivery)
            .field("pinned_runtime", &self.runtime.is_some())
            .finish()
    }
}

/// Wiring for an `HttpClient` beyond its base URL.
pub struct HttpClientBuilder {
    base_url: String,
    transport: Option<Arc<dyn Transport>>,
    delivery: Delivery,
    runtime: Option<Handle>,
}

impl HttpClientBuilder {
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn delivery(mut self, delivery: Delivery) -> Self {
        self.delivery = delivery;
        self
    }

    /// Spawn callback-style calls on `handle` instead of the shared runtime.
    pub fn runtime(mut self, handle: Handle) -> Self {
        self.runtime = Some(handle);
        self
    }

    pub fn build(self) -> HttpClient {
        HttpClient {
            base_url: self.base_url,
            transport: self
                .transport
                .unwrap_or_else(|| Arc::new(UreqTransport::new())),
            delivery: self.delivery,
            runtime: self.runtime,
        }
    }
}

fn decode_json<T: DeserializeOwned>(body: &[u8]) -> Result<T, FetchError> {
    serde_json::from_slice(body).map_err(|err| {
        debug!(error = %err, "JSON decode failed");
        FetchError::Decode(err)
    })
}

fn decode_image(body: &[u8]) -> Result<Image, FetchError> {
    image::load_from_memory(body).map_err(|err| {
        debug!(error = %err, "image decode failed");
        FetchError::EmptyBody
    })
}
