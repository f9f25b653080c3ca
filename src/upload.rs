//! Posting measurements to the backend.

use crate::config::DEVICE_SECRET_HEADER;
use crate::models::Measurement;
use anyhow::Context;
use embassy_time::Duration;

const BASE_COOL_DOWN: Duration = Duration::from_secs(5);
const MAX_COOL_DOWN: Duration = Duration::from_secs(300);

/// Synchronous HTTP POST returning the response status.
pub trait HttpPost {
    fn post(&mut self, url: &str, body: &[u8], headers: &[(&str, &str)]) -> anyhow::Result<u16>;
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadOutcome {
    Accepted(u16),
    RateLimited,
    Rejected(u16),
}

impl UploadOutcome {
    pub fn from_status(status: u16) -> Self {
        match status {
            200..=299 => Self::Accepted(status),
            429 => Self::RateLimited,
            _ => Self::Rejected(status),
        }
    }
}

/// Doubling cool-down after rate limiting, reset by the next accepted post.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Backoff {
    current: Duration,
}

impl Backoff {
    pub const fn new() -> Self {
        Self {
            current: BASE_COOL_DOWN,
        }
    }

    pub fn current(&self) -> Duration {
        self.current
    }

    /// Returns the delay to wait now and doubles the next one.
    pub fn escalate(&mut self) -> Duration {
        let wait = self.current;
        self.current = (self.current * 2).min(MAX_COOL_DOWN);
        wait
    }

    pub fn reset(&mut self) {
        self.current = BASE_COOL_DOWN;
    }
}

impl Default for Backoff {
    fn default() -> Self {
        Self::new()
    }
}

pub struct Uploader<C> {
    client: C,
    url: &'static str,
    secret: &'static str,
}

impl<C: HttpPost> Uploader<C> {
    pub fn new(client: C, url: &'static str, secret: &'static str) -> Self {
        Self {
            client,
            url,
            secret,
        }
    }

    pub fn upload(&mut self, measurement: &Measurement) -> anyhow::Result<UploadOutcome> {
        let body = measurement
            .to_json()
            .context("‼️ Failed to serialize measurement")?;
        let content_length = body.len().to_string();
        let headers = [
            ("Content-Type", "application/json"),
            ("Content-Length", content_length.as_str()),
            (DEVICE_SECRET_HEADER, self.secret),
        ];

        let status = self
            .client
            .post(self.url, &body, &headers)
            .with_context(|| format!("‼️ POST to {} failed", self.url))?;
        Ok(UploadOutcome::from_status(status))
    }
}

#[cfg(target_os = "espidf")]
pub use esp::EspHttpPost;

#[cfg(target_os = "espidf")]
mod esp {
    use super::HttpPost;
    use crate::config::{BACKEND_CA_CERT, HTTP_TIMEOUT_SECS};
    use anyhow::{Context, anyhow};
    use embedded_svc::http::client::Client;
    use embedded_svc::io::Write;
    use esp_idf_svc::http::client::{Configuration, EspHttpConnection};
    use esp_idf_svc::tls::X509;
    use std::time::Duration;

    pub struct EspHttpPost {
        client: Client<EspHttpConnection>,
    }

    impl EspHttpPost {
        /// Pins the configured CA certificate, or trusts the ESP-IDF
        /// certificate bundle when none was baked in.
        pub fn new() -> anyhow::Result<Self> {
            let mut config = Configuration {
                timeout: Some(Duration::from_secs(HTTP_TIMEOUT_SECS)),
                ..Default::default()
            };
            if BACKEND_CA_CERT.is_empty() {
                config.crt_bundle_attach = Some(esp_idf_svc::sys::esp_crt_bundle_attach);
            } else {
                config.server_certificate = Some(X509::pem_until_nul(BACKEND_CA_CERT));
            }

            let connection =
                EspHttpConnection::new(&config).context("‼️ Failed to create HTTP connection")?;
            Ok(Self {
                client: Client::wrap(connection),
            })
        }
    }

    impl HttpPost for EspHttpPost {
        fn post(
            &mut self,
            url: &str,
            body: &[u8],
            headers: &[(&str, &str)],
        ) -> anyhow::Result<u16> {
            let mut request = self
                .client
                .post(url, headers)
                .map_err(|e| anyhow!("{e:?}"))?;
            request.write_all(body).map_err(|e| anyhow!("{e:?}"))?;
            request.flush().map_err(|e| anyhow!("{e:?}"))?;
            let response = request.submit().map_err(|e| anyhow!("{e:?}"))?;
            Ok(response.status())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct RecordingClient {
        status: u16,
        requests: Vec<(String, Vec<u8>, Vec<(String, String)>)>,
    }

    impl HttpPost for RecordingClient {
        fn post(
            &mut self,
            url: &str,
            body: &[u8],
            headers: &[(&str, &str)],
        ) -> anyhow::Result<u16> {
            self.requests.push((
                url.into(),
                body.to_vec(),
                headers
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
            ));
            Ok(self.status)
        }
    }

    struct BrokenClient;

    impl HttpPost for BrokenClient {
        fn post(&mut self, _: &str, _: &[u8], _: &[(&str, &str)]) -> anyhow::Result<u16> {
            anyhow::bail!("connection reset")
        }
    }

    const READING: Measurement = Measurement {
        temp_fahrenheit: 70.0,
        humidity_percentage: 45.5,
    };

    #[test]
    fn upload_posts_json_with_secret_header() {
        let client = RecordingClient {
            status: 201,
            ..Default::default()
        };
        let mut uploader = Uploader::new(client, "https://example.test/readings", "s3cr3t");

        assert_eq!(
            uploader.upload(&READING).unwrap(),
            UploadOutcome::Accepted(201)
        );

        let (url, body, headers) = &uploader.client.requests[0];
        assert_eq!(url, "https://example.test/readings");
        assert_eq!(body.as_slice(), READING.to_json().unwrap().as_slice());
        assert!(headers.contains(&(DEVICE_SECRET_HEADER.into(), "s3cr3t".into())));
        assert!(headers.contains(&("Content-Length".into(), body.len().to_string())));
    }

    #[test]
    fn status_codes_are_classified() {
        assert_eq!(UploadOutcome::from_status(200), UploadOutcome::Accepted(200));
        assert_eq!(UploadOutcome::from_status(429), UploadOutcome::RateLimited);
        assert_eq!(UploadOutcome::from_status(500), UploadOutcome::Rejected(500));
        assert_eq!(UploadOutcome::from_status(301), UploadOutcome::Rejected(301));
    }

    #[test]
    fn transport_errors_carry_context() {
        let mut uploader = Uploader::new(BrokenClient, "https://example.test", "");
        let err = uploader.upload(&READING).unwrap_err();
        assert!(format!("{err:#}").contains("connection reset"));
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new();
        assert_eq!(backoff.escalate(), Duration::from_secs(5));
        assert_eq!(backoff.escalate(), Duration::from_secs(10));
        for _ in 0..10 {
            backoff.escalate();
        }
        assert_eq!(backoff.current(), Duration::from_secs(300));

        backoff.reset();
        assert_eq!(backoff.current(), Duration::from_secs(5));
    }
}
