//! ESP-IDF HTTP(S) client adapter.
//!
//! Implements [`HttpClient`] on top of `EspHttpConnection`. Every request
//! opens a fresh connection; TLS server certificates are checked against
//! the ESP-IDF certificate bundle.

use core::time::Duration;

use embedded_svc::http::Method as SvcMethod;
use embedded_svc::io::{Read, Write};
use esp_idf_svc::http::client::{
    Configuration as HttpConfig, EspHttpConnection, FollowRedirectsPolicy,
};
use log::warn;

use crate::app::ports::{ByteSource, HttpClient, HttpResponse, Method, StreamHead, TransportError};

/// Size of the connection's internal receive/transmit buffers.
const BUFFER_SIZE: usize = 4096;

pub struct EspHttpClient {
    timeout: Duration,
}

impl EspHttpClient {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    fn connect(&self) -> Result<EspHttpConnection, TransportError> {
        EspHttpConnection::new(&HttpConfig {
            crt_bundle_attach: Some(esp_idf_svc::sys::esp_crt_bundle_attach),
            timeout: Some(self.timeout),
            follow_redirects_policy: FollowRedirectsPolicy::FollowAll,
            buffer_size: Some(BUFFER_SIZE),
            ..Default::default()
        })
        .map_err(|e| {
            warn!("HTTP: connection setup failed: {e}");
            TransportError::Connect
        })
    }
}

impl Default for EspHttpClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

fn svc_method(method: Method) -> SvcMethod {
    match method {
        Method::Get => SvcMethod::Get,
        Method::Post => SvcMethod::Post,
    }
}

impl HttpClient for EspHttpClient {
    type Body<'a>
        = EspHttpBody
    where
        Self: 'a;

    fn request(
        &mut self,
        method: Method,
        url: &str,
        headers: &[(&str, &str)],
        body: Option<&str>,
    ) -> Result<HttpResponse, TransportError> {
        let mut conn = self.connect()?;

        let content_length = body.map(|b| b.len().to_string());
        let mut all_headers = headers.to_vec();
        if let Some(len) = &content_length {
            all_headers.push(("Content-Length", len.as_str()));
        }

        conn.initiate_request(svc_method(method), url, &all_headers)
            .map_err(|e| {
                warn!("HTTP: {method:?} {url}: {e}");
                TransportError::Connect
            })?;
        if let Some(body) = body {
            conn.write_all(body.as_bytes()).map_err(|e| {
                warn!("HTTP: writing request body: {e}");
                TransportError::Io
            })?;
        }
        conn.initiate_response().map_err(|e| {
            warn!("HTTP: awaiting response: {e}");
            TransportError::Io
        })?;

        let status = conn.status();
        let mut raw = Vec::new();
        let mut buf = [0u8; 256];
        loop {
            let n = Read::read(&mut conn, &mut buf).map_err(|e| {
                warn!("HTTP: reading response body: {e}");
                TransportError::Io
            })?;
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
        }

        Ok(HttpResponse {
            status,
            body: String::from_utf8_lossy(&raw).into_owned(),
        })
    }

    fn get_stream(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<(StreamHead, EspHttpBody), TransportError> {
        let mut conn = self.connect()?;
        conn.initiate_request(SvcMethod::Get, url, headers)
            .map_err(|e| {
                warn!("HTTP: GET {url}: {e}");
                TransportError::Connect
            })?;
        conn.initiate_response().map_err(|e| {
            warn!("HTTP: awaiting response: {e}");
            TransportError::Io
        })?;

        let head = StreamHead {
            status: conn.status(),
            content_length: conn.header("Content-Length").and_then(|v| v.trim().parse().ok()),
        };
        Ok((head, EspHttpBody { conn }))
    }
}

/// Body of a streamed response. The connection closes on drop.
pub struct EspHttpBody {
    conn: EspHttpConnection,
}

impl ByteSource for EspHttpBody {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize, TransportError> {
        Read::read(&mut self.conn, buf).map_err(|e| {
            warn!("HTTP: body read failed: {e}");
            TransportError::Io
        })
    }
}
