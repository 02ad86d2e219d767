use reqwest::Url;
use std::{fmt, sync::Arc};
use tracing::{debug, warn};

use crate::{ConfigProvider, FetchError, WeatherRecord};

pub mod openweather;
pub mod transport;

pub use transport::{HttpResponse, HttpTransport, ReqwestTransport, TransportFailure};

/// Fetches current weather for a city.
///
/// Holds only read-only configuration and a shared transport, so one client
/// can serve any number of concurrent [`FetchClient::fetch`] calls.
#[derive(Clone)]
pub struct FetchClient {
    config: Arc<dyn ConfigProvider>,
    transport: Arc<dyn HttpTransport>,
}

impl FetchClient {
    /// Client backed by `reqwest`, honouring the configured request timeout.
    pub fn new(config: Arc<dyn ConfigProvider>) -> Self {
        let transport = Arc::new(ReqwestTransport::new(config.request_timeout()));
        Self::with_transport(config, transport)
    }

    pub fn with_transport(
        config: Arc<dyn ConfigProvider>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self { config, transport }
    }

    /// `<base>?q=<city>&appid=<key>&units=metric`, with the city trimmed and escaped.
    pub fn request_url(&self, city: &str) -> Result<Url, FetchError> {
        let city = city.trim();
        if city.is_empty() {
            return Err(FetchError::InvalidInput);
        }

        let api_key = match self.config.api_key() {
            Some(key) if self.config.is_configured() => key,
            _ => {
                return Err(FetchError::Config(
                    "API key not configured. Run `weatherboard configure` first.".to_string(),
                ));
            }
        };

        let base_url = self.config.base_url();
        Url::parse_with_params(
            base_url,
            &[("q", city), ("appid", api_key), ("units", "metric")],
        )
        .map_err(|e| FetchError::Config(format!("Invalid base URL '{base_url}': {e}")))
    }

    /// One request/response cycle. No retries, no caching.
    ///
    /// A decoded record is returned even if it is not [`WeatherRecord::is_valid`].
    pub async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        let result = self.fetch_inner(city).await;
        if let Err(err) = &result {
            warn!(city, kind = err.kind(), "weather fetch failed: {err}");
        }
        result
    }

    async fn fetch_inner(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        let url = self.request_url(city)?;
        debug!(city = city.trim(), "requesting current weather");

        let response = match self.transport.get(url).await {
            Ok(response) => response,
            Err(TransportFailure::Connect(message)) => return Err(FetchError::Network(message)),
            Err(TransportFailure::Body { status, message }) => {
                return Err(if is_success(status) {
                    FetchError::Transport(message)
                } else {
                    FetchError::Http {
                        status,
                        message: openweather::reason_phrase(status),
                    }
                });
            }
        };

        if !is_success(response.status) {
            return Err(FetchError::Http {
                status: response.status,
                message: openweather::error_message(response.status, &response.body),
            });
        }

        let record = openweather::decode_current(&response.body)
            .map_err(|e| FetchError::Decode(e.to_string()))?;

        debug!(city = %record.city, valid = record.is_valid(), "decoded weather record");
        Ok(record)
    }
}

impl fmt::Debug for FetchClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FetchClient")
            .field("base_url", &self.config.base_url())
            .field("configured", &self.config.is_configured())
            .field("transport", &self.transport)
            .finish()
    }
}

fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}
