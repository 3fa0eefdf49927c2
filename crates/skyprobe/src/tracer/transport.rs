//! Single-use HTTP transport with lifecycle instrumentation.
//!
//! Each phase (name resolution, TCP connect, TLS handshake, HTTP handshake,
//! response head, body) is driven explicitly so the [`Timeline`] can record
//! when it starts and ends.

use std::collections::BTreeMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::client::conn::{http1, http2};
use hyper::header::{CONTENT_TYPE, HOST, HeaderName, HeaderValue, USER_AGENT};
use hyper::http::response::Parts;
use hyper::Request;
use hyper_util::rt::{TokioExecutor, TokioIo};
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tracing::debug;
use url::{Host, Position, Url};

use super::timeline::Timeline;
use crate::error::ProbeError;
use crate::prober::host_and_port;
use crate::schema::{Method, Protocol};

const TLS_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// What to send
#[derive(Debug, Clone, Default)]
pub struct RequestSpec {
    pub method: Method,
    pub headers: BTreeMap<String, String>,
    pub body: Option<Bytes>,
}

/// Response head of a completed round trip
#[derive(Debug)]
pub struct Exchange {
    pub connect_addr: SocketAddr,
    pub http2: bool,
    pub parts: Parts,
}

impl Exchange {
    /// Status line in `"<code> <reason>"` form
    pub fn status_line(&self) -> String {
        let reason = self
            .parts
            .extensions
            .get::<hyper::ext::ReasonPhrase>()
            .map(|reason| String::from_utf8_lossy(reason.as_bytes()).into_owned())
            .or_else(|| self.parts.status.canonical_reason().map(str::to_string))
            .unwrap_or_default();

        format!("{} {}", self.parts.status.as_u16(), reason)
    }

    pub fn headers(&self) -> BTreeMap<String, Vec<String>> {
        let mut headers: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (name, value) in &self.parts.headers {
            headers
                .entry(name.as_str().to_string())
                .or_default()
                .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
        }
        headers
    }
}

struct TlsSettings {
    connector: TlsConnector,
    server_name: ServerName<'static>,
    handshake_timeout: Duration,
}

/// Transport built for exactly one invocation
pub struct Transport {
    url: Url,
    tls: Option<TlsSettings>,
}

impl Transport {
    /// Without `tls_config`, https targets are verified against the webpki roots
    pub fn for_target(
        url: &Url,
        protocol: Protocol,
        tls_config: Option<Arc<ClientConfig>>,
    ) -> Result<Self, ProbeError> {
        let tls = if protocol.is_tls() {
            let (host, _) = host_and_port(url)?;
            let server_name = ServerName::try_from(host.clone())
                .map_err(|e| ProbeError::config(format!("invalid TLS server name {host}: {e}")))?;
            let config = match tls_config {
                Some(config) => config,
                None => client_config(webpki_root_store())?,
            };

            Some(TlsSettings {
                connector: TlsConnector::from(config),
                server_name,
                handshake_timeout: TLS_HANDSHAKE_TIMEOUT,
            })
        } else {
            None
        };

        Ok(Self { url: url.clone(), tls })
    }

    /// Perform the round trip, recording every lifecycle event on `timeline`
    pub async fn round_trip(
        &self,
        spec: &RequestSpec,
        timeline: &mut Timeline,
    ) -> Result<Exchange, ProbeError> {
        let addrs = self.resolve(timeline).await?;

        timeline.begin_connect();
        let (stream, addr) = connect_any(&addrs).await?;
        timeline.connect_done = Some(Instant::now());
        let _ = stream.set_nodelay(true);

        let Some(tls) = &self.tls else {
            let parts = self.exchange(stream, false, spec, timeline).await?;
            return Ok(Exchange { connect_addr: addr, http2: false, parts });
        };

        timeline.tls_start = Some(Instant::now());
        let stream = tokio::time::timeout(
            tls.handshake_timeout,
            tls.connector.connect(tls.server_name.clone(), stream),
        )
        .await
        .map_err(|_| ProbeError::Timeout(tls.handshake_timeout))?
        .map_err(|e| ProbeError::Network(format!("tls handshake failed: {e}")))?;
        timeline.tls_done = Some(Instant::now());

        let http2 = stream.get_ref().1.alpn_protocol() == Some(b"h2".as_slice());
        let parts = self.exchange(stream, http2, spec, timeline).await?;

        Ok(Exchange { connect_addr: addr, http2, parts })
    }

    /// Every address the host resolves to, in resolver order
    async fn resolve(&self, timeline: &mut Timeline) -> Result<Vec<SocketAddr>, ProbeError> {
        let (_, port) = host_and_port(&self.url)?;

        match self.url.host() {
            Some(Host::Ipv4(ip)) => Ok(vec![SocketAddr::new(IpAddr::V4(ip), port)]),
            Some(Host::Ipv6(ip)) => Ok(vec![SocketAddr::new(IpAddr::V6(ip), port)]),
            Some(Host::Domain(domain)) => {
                timeline.dns_start = Some(Instant::now());
                let addrs: Vec<SocketAddr> = tokio::net::lookup_host((domain, port))
                    .await
                    .map_err(|e| ProbeError::Network(format!("dns lookup for {domain} failed: {e}")))?
                    .collect();
                timeline.dns_done = Some(Instant::now());

                if addrs.is_empty() {
                    return Err(ProbeError::Network(format!("dns lookup for {domain} returned no addresses")));
                }
                Ok(addrs)
            }
            None => Err(ProbeError::config(format!("URL has no host: {}", self.url))),
        }
    }

    async fn exchange<S>(
        &self,
        stream: S,
        http2: bool,
        spec: &RequestSpec,
        timeline: &mut Timeline,
    ) -> Result<Parts, ProbeError>
    where
        S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
    {
        let request = self.build_request(spec, http2)?;
        let io = TokioIo::new(stream);

        let response = if http2 {
            let (mut sender, connection) = http2::handshake(TokioExecutor::new(), io)
                .await
                .map_err(|e| ProbeError::Protocol(format!("http/2 handshake failed: {e}")))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("http/2 connection closed: {e}");
                }
            });
            timeline.got_conn = Some(Instant::now());
            sender.send_request(request).await
        } else {
            let (mut sender, connection) = http1::handshake(io)
                .await
                .map_err(|e| ProbeError::Protocol(format!("http/1 handshake failed: {e}")))?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    debug!("http/1 connection closed: {e}");
                }
            });
            timeline.got_conn = Some(Instant::now());
            sender.send_request(request).await
        }
        .map_err(|e| ProbeError::Network(format!("request failed: {e}")))?;
        timeline.first_byte = Some(Instant::now());

        // Only the completion time matters, so frames are dropped as they arrive
        let (parts, mut body) = response.into_parts();
        while let Some(frame) = body.frame().await {
            frame.map_err(|e| ProbeError::Network(format!("reading response body failed: {e}")))?;
        }
        timeline.finished = Some(Instant::now());

        Ok(parts)
    }

    fn build_request(&self, spec: &RequestSpec, http2: bool) -> Result<Request<Full<Bytes>>, ProbeError> {
        // HTTP/2 carries the authority in the URI, HTTP/1.1 in the Host header
        let uri = if http2 {
            self.url[..Position::AfterQuery].to_string()
        } else {
            self.url[Position::BeforePath..Position::AfterQuery].to_string()
        };

        let method = match spec.method {
            Method::Get => hyper::Method::GET,
            Method::Post => hyper::Method::POST,
        };

        let mut request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Full::new(spec.body.clone().unwrap_or_default()))
            .map_err(|e| ProbeError::config(format!("invalid request for {}: {e}", self.url)))?;

        let headers = request.headers_mut();
        headers.insert(USER_AGENT, HeaderValue::from_static(crate::USER_AGENT));
        if !http2 {
            let authority = &self.url[Position::BeforeHost..Position::AfterPort];
            let host = HeaderValue::from_str(authority)
                .map_err(|e| ProbeError::config(format!("invalid host {authority}: {e}")))?;
            headers.insert(HOST, host);
        }
        if spec.body.is_some() {
            headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        }
        for (name, value) in &spec.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| ProbeError::config(format!("invalid header name {name}: {e}")))?;
            let value = HeaderValue::from_str(value)
                .map_err(|e| ProbeError::config(format!("invalid header value for {name}: {e}")))?;
            headers.insert(name, value);
        }

        Ok(request)
    }
}

/// Connect to the first address that accepts, falling back through the rest
async fn connect_any(addrs: &[SocketAddr]) -> Result<(TcpStream, SocketAddr), ProbeError> {
    let mut last_error = None;
    for &addr in addrs {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok((stream, addr)),
            Err(e) => {
                debug!("connect to {addr} failed: {e}");
                last_error = Some(format!("connect to {addr} failed: {e}"));
            }
        }
    }

    Err(ProbeError::Network(last_error.unwrap_or_else(|| "no address to connect to".to_string())))
}

fn webpki_root_store() -> RootCertStore {
    let mut roots = RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

/// Client TLS settings trusting `roots`, offering `h2` and `http/1.1` over ALPN
pub fn client_config(roots: RootCertStore) -> Result<Arc<ClientConfig>, ProbeError> {
    let provider = Arc::new(rustls::crypto::aws_lc_rs::default_provider());
    let mut config = ClientConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()
        .map_err(|e| ProbeError::config(format!("tls configuration failed: {e}")))?
        .with_root_certificates(roots)
        .with_no_client_auth();
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(Arc::new(config))
}
