//! LEAP client
//!
//! One TLS session per client. Requests are serialized: a request line is
//! written and lines are read until the response carrying the same
//! `ClientTag` arrives. Anything else read meanwhile is unsolicited and
//! dropped.
//!
//! A request that times out or fails on the stream may leave half a line
//! behind, so the session is marked broken and refuses further requests.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rustls::ClientConfig;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, RwLock};
use tokio::time::timeout;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::protocol::{
    DEVICE_URL, LeapRequest, LeapResponse, PING_URL, SERVER_URL, parse_devices,
};
use super::tls;
use crate::domain::{Device, DeviceDomain};
use crate::error::{BridgeError, Result};
use crate::ports::{BridgeClient, BridgeConnector, BridgeTarget};

/// Main LEAP port.
pub const LEAP_PORT: u16 = 8081;
/// Budget for TCP connect plus TLS handshake.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Budget for one request/response exchange.
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

const FULL_LEVEL: u8 = 100;

/// Open a TLS stream to `address:port`.
///
/// # Errors
///
/// Returns a connection error if TCP or TLS fails, or a timeout error if
/// either takes longer than [`CONNECT_TIMEOUT`].
pub async fn open_tls(
    address: &str,
    port: u16,
    config: ClientConfig,
) -> Result<TlsStream<TcpStream>> {
    let name = tls::server_name(address)?;
    let connector = TlsConnector::from(Arc::new(config));

    let connect = async {
        let tcp = TcpStream::connect((address, port)).await?;
        tcp.set_nodelay(true)?;
        connector.connect(name, tcp).await
    };

    timeout(CONNECT_TIMEOUT, connect)
        .await
        .map_err(|_| BridgeError::Timeout {
            seconds: CONNECT_TIMEOUT.as_secs(),
        })?
        .map_err(|e| BridgeError::Connection {
            address: format!("{address}:{port}"),
            reason: e.to_string(),
        })
}

/// A LEAP session over any byte stream.
pub struct LeapClient<S> {
    address: String,
    stream: Mutex<BufReader<S>>,
    /// Device id to zone id, filled from `/device` reads.
    zones: RwLock<HashMap<String, String>>,
    request_timeout: Duration,
    broken: AtomicBool,
}

impl<S> LeapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    #[must_use]
    pub fn new(address: impl Into<String>, stream: S) -> Self {
        Self {
            address: address.into(),
            stream: Mutex::new(BufReader::new(stream)),
            zones: RwLock::new(HashMap::new()),
            request_timeout: REQUEST_TIMEOUT,
            broken: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, request_timeout: Duration) -> Self {
        self.request_timeout = request_timeout;
        self
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Send `request` and wait for its response.
    ///
    /// # Errors
    ///
    /// Returns a timeout error if no matching response arrives in time, a
    /// bridge error if the stream closes first, and a bridge error without
    /// touching the stream once the session is broken.
    pub async fn request(&self, request: LeapRequest) -> Result<LeapResponse> {
        if self.broken.load(Ordering::SeqCst) {
            return Err(BridgeError::Bridge {
                reason: "Bridge session was interrupted and must be reopened".to_string(),
            });
        }
        let tag = request.header.client_tag.clone();
        let line = request.to_line()?;
        let mut stream = self.stream.lock().await;

        let exchange = async {
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;

            let mut buf = String::new();
            loop {
                buf.clear();
                if stream.read_line(&mut buf).await? == 0 {
                    return Err(BridgeError::Bridge {
                        reason: "Connection closed by bridge".to_string(),
                    });
                }
                if buf.trim().is_empty() {
                    continue;
                }
                let response = match LeapResponse::parse(&buf) {
                    Ok(response) => response,
                    Err(e) => {
                        warn!(error = %e, "Skipping unreadable message from bridge");
                        continue;
                    }
                };
                if response.header.client_tag.as_deref() == Some(tag.as_str()) {
                    return Ok(response);
                }
                debug!(
                    url = response.header.url.as_deref().unwrap_or(""),
                    "Skipping unsolicited message"
                );
            }
        };

        let outcome = timeout(self.request_timeout, exchange)
            .await
            .unwrap_or(Err(BridgeError::Timeout {
                seconds: self.request_timeout.as_secs(),
            }));
        if let Err(e) = &outcome {
            self.broken.store(true, Ordering::SeqCst);
            warn!(address = %self.address, error = %e, "LEAP session broken");
        }
        outcome
    }

    /// Read `url` and return the body of a successful response.
    async fn read(&self, url: &str) -> Result<Option<Value>> {
        let response = self
            .request(LeapRequest::read(url, Uuid::new_v4().to_string()))
            .await?
            .ensure_success()?;
        Ok(response.body)
    }

    /// Verify the session answers.
    ///
    /// # Errors
    ///
    /// Returns an error if the ping fails.
    pub async fn ping(&self) -> Result<()> {
        self.read(PING_URL).await.map(|_| ())
    }

    /// Protocol version reported by the bridge.
    ///
    /// # Errors
    ///
    /// Returns a bridge error if the server record has no version.
    pub async fn protocol_version(&self) -> Result<String> {
        self.read(SERVER_URL)
            .await?
            .as_ref()
            .and_then(super::protocol::protocol_version)
            .ok_or_else(|| BridgeError::Bridge {
                reason: "Bridge did not report a protocol version".to_string(),
            })
    }

    /// Read every device and refresh the zone cache.
    async fn load_devices(&self) -> Result<Option<Vec<(DeviceDomain, Device)>>> {
        let Some(body) = self.read(DEVICE_URL).await? else {
            return Ok(None);
        };
        let devices = parse_devices(&body);

        let mut zones = self.zones.write().await;
        zones.clear();
        for (_, device) in &devices {
            if let Some(zone) = &device.zone {
                zones.insert(device.device_id.clone(), zone.clone());
            }
        }
        debug!(devices = devices.len(), zones = zones.len(), "Device list loaded");
        Ok(Some(devices))
    }

    async fn zone_for(&self, device_id: &str) -> Result<String> {
        if let Some(zone) = self.zones.read().await.get(device_id) {
            return Ok(zone.clone());
        }
        self.load_devices().await?;
        self.zones
            .read()
            .await
            .get(device_id)
            .cloned()
            .ok_or_else(|| BridgeError::UnknownDevice {
                device_id: device_id.to_string(),
            })
    }

    async fn go_to_level(&self, device_id: &str, level: u8) -> Result<()> {
        let zone = self.zone_for(device_id).await?;
        self.request(LeapRequest::go_to_level(
            &zone,
            level,
            Uuid::new_v4().to_string(),
        ))
        .await?
        .ensure_success()?;
        debug!(device_id, zone = %zone, level, "Level command accepted");
        Ok(())
    }
}

#[async_trait]
impl<S> BridgeClient for LeapClient<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send,
{
    async fn devices_by_domain(&self, domain: DeviceDomain) -> Result<Option<Vec<Device>>> {
        Ok(self.load_devices().await?.map(|devices| {
            devices
                .into_iter()
                .filter(|(d, _)| *d == domain)
                .map(|(_, device)| device)
                .collect()
        }))
    }

    async fn turn_on(&self, device_id: &str) -> Result<()> {
        self.go_to_level(device_id, FULL_LEVEL).await
    }

    async fn turn_off(&self, device_id: &str) -> Result<()> {
        self.go_to_level(device_id, 0).await
    }

    async fn set_value(&self, device_id: &str, value: u8) -> Result<()> {
        self.go_to_level(device_id, value).await
    }

    async fn close(&self) -> Result<()> {
        self.stream.lock().await.get_mut().shutdown().await?;
        Ok(())
    }

    fn is_open(&self) -> bool {
        !self.broken.load(Ordering::SeqCst)
    }
}

/// Connector opening LEAP sessions with the stored credential files.
#[derive(Debug, Clone)]
pub struct LeapConnector {
    port: u16,
}

impl Default for LeapConnector {
    fn default() -> Self {
        Self::new()
    }
}

impl LeapConnector {
    #[must_use]
    pub const fn new() -> Self {
        Self { port: LEAP_PORT }
    }
}

#[async_trait]
impl BridgeConnector for LeapConnector {
    async fn connect(&self, target: &BridgeTarget) -> Result<Box<dyn BridgeClient>> {
        let creds = &target.credentials;
        let ca = tokio::fs::read(&creds.ca).await?;
        let cert = tokio::fs::read(&creds.cert).await?;
        let key = zeroize::Zeroizing::new(tokio::fs::read(&creds.key).await?);
        let config = tls::bridge_client_config(&ca, &cert, &key)?;

        let stream = open_tls(&target.address, self.port, config).await?;
        let client = LeapClient::new(target.address.clone(), stream);
        client.ping().await?;
        info!(address = %target.address, port = self.port, "LEAP session established");
        Ok(Box::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{DuplexStream, ReadHalf, WriteHalf, duplex, split};

    /// Minimal bridge answering on the other end of a duplex pipe.
    struct FakeBridge {
        reader: BufReader<ReadHalf<DuplexStream>>,
        writer: WriteHalf<DuplexStream>,
    }

    impl FakeBridge {
        async fn next_request(&mut self) -> Option<Value> {
            let mut line = String::new();
            if self.reader.read_line(&mut line).await.ok()? == 0 {
                return None;
            }
            serde_json::from_str(&line).ok()
        }

        async fn send(&mut self, message: Value) {
            let mut line = message.to_string();
            line.push('\n');
            self.writer.write_all(line.as_bytes()).await.unwrap();
        }

        async fn reply(&mut self, request: &Value, status: &str, body: Option<Value>) {
            let mut message = json!({
                "CommuniqueType": "ReadResponse",
                "Header": {
                    "StatusCode": status,
                    "Url": request["Header"]["Url"],
                    "ClientTag": request["Header"]["ClientTag"],
                }
            });
            if let Some(body) = body {
                message["Body"] = body;
            }
            self.send(message).await;
        }
    }

    fn pair() -> (LeapClient<DuplexStream>, FakeBridge) {
        let (ours, theirs) = duplex(64 * 1024);
        let (read, write) = split(theirs);
        (
            LeapClient::new("192.168.1.50", ours),
            FakeBridge {
                reader: BufReader::new(read),
                writer: write,
            },
        )
    }

    fn devices_body() -> Value {
        json!({
            "Devices": [
                {"href": "/device/1", "Name": "Smart Bridge", "DeviceType": "SmartBridge"},
                {
                    "href": "/device/3",
                    "Name": "Kitchen",
                    "DeviceType": "WallDimmer",
                    "LocalZones": [{"href": "/zone/7"}]
                },
                {
                    "href": "/device/4",
                    "Name": "Porch",
                    "DeviceType": "PlugInSwitch",
                    "LocalZones": [{"href": "/zone/8"}]
                }
            ]
        })
    }

    #[tokio::test]
    async fn test_ping_ok() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            assert_eq!(request["Header"]["Url"], PING_URL);
            bridge.reply(&request, "200 OK", None).await;
        });
        client.ping().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unsolicited_messages_are_skipped() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            bridge
                .send(json!({"CommuniqueType": "UpdateResponse", "Header": {"Url": "/zone/1/status"}}))
                .await;
            bridge.writer.write_all(b"garbage\n").await.unwrap();
            bridge
                .reply(
                    &request,
                    "200 OK",
                    Some(json!({"Server": {"ProtocolVersion": "01.123"}})),
                )
                .await;
        });
        assert_eq!(client.protocol_version().await.unwrap(), "01.123");
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_error_status_is_bridge_error() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            bridge.reply(&request, "500 ServerError", None).await;
        });
        assert!(matches!(
            client.ping().await,
            Err(BridgeError::Bridge { .. })
        ));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_request_times_out() {
        let (client, _bridge) = pair();
        let client = client.with_request_timeout(Duration::from_millis(50));
        match client.ping().await.unwrap_err() {
            BridgeError::Timeout { .. } => {}
            e => panic!("Expected Timeout, got: {e:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_breaks_session() {
        let (client, mut bridge) = pair();
        let client = client.with_request_timeout(Duration::from_millis(50));

        assert!(client.ping().await.is_err());
        assert!(!client.is_open());

        // Nothing else reaches the bridge once the session is broken.
        let first = bridge.next_request().await.unwrap();
        bridge.reply(&first, "200 OK", None).await;
        let err = client.ping().await.unwrap_err();
        assert!(err.to_string().contains("must be reopened"), "{err}");

        drop(client);
        assert!(bridge.next_request().await.is_none());
    }

    #[tokio::test]
    async fn test_error_status_keeps_session_open() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            for status in ["500 ServerError", "200 OK"] {
                let request = bridge.next_request().await.unwrap();
                bridge.reply(&request, status, None).await;
            }
        });
        assert!(client.ping().await.is_err());
        assert!(client.is_open());
        client.ping().await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_stream_is_bridge_error() {
        let (client, bridge) = pair();
        drop(bridge);
        assert!(matches!(
            client.ping().await,
            Err(BridgeError::Bridge { .. } | BridgeError::Io(_))
        ));
    }

    #[tokio::test]
    async fn test_devices_by_domain_filters() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            assert_eq!(request["Header"]["Url"], DEVICE_URL);
            bridge.reply(&request, "200 OK", Some(devices_body())).await;
        });
        let lights = client
            .devices_by_domain(DeviceDomain::Light)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].device_id, "3");
        assert_eq!(lights[0].zone.as_deref(), Some("7"));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_devices_without_body_is_none() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            bridge.reply(&request, "200 OK", None).await;
        });
        assert!(
            client
                .devices_by_domain(DeviceDomain::Fan)
                .await
                .unwrap()
                .is_none()
        );
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_turn_on_loads_zone_then_sends_full_level() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            assert_eq!(request["Header"]["Url"], DEVICE_URL);
            bridge.reply(&request, "200 OK", Some(devices_body())).await;

            let command = bridge.next_request().await.unwrap();
            assert_eq!(command["CommuniqueType"], "CreateRequest");
            assert_eq!(command["Header"]["Url"], "/zone/7/commandprocessor");
            assert_eq!(command["Body"]["Command"]["Parameter"][0]["Value"], 100);
            bridge.reply(&command, "201 Created", None).await;

            // Second command uses the cached zone.
            let command = bridge.next_request().await.unwrap();
            assert_eq!(command["Header"]["Url"], "/zone/7/commandprocessor");
            assert_eq!(command["Body"]["Command"]["Parameter"][0]["Value"], 0);
            bridge.reply(&command, "201 Created", None).await;
        });
        client.turn_on("3").await.unwrap();
        client.turn_off("3").await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_set_value_sends_level() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            bridge.reply(&request, "200 OK", Some(devices_body())).await;
            let command = bridge.next_request().await.unwrap();
            assert_eq!(command["Header"]["Url"], "/zone/8/commandprocessor");
            assert_eq!(command["Body"]["Command"]["Parameter"][0]["Value"], 35);
            bridge.reply(&command, "201 Created", None).await;
        });
        client.set_value("4", 35).await.unwrap();
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let (client, mut bridge) = pair();
        let server = tokio::spawn(async move {
            let request = bridge.next_request().await.unwrap();
            bridge.reply(&request, "200 OK", Some(devices_body())).await;
        });
        match client.turn_on("99").await.unwrap_err() {
            BridgeError::UnknownDevice { device_id } => assert_eq!(device_id, "99"),
            e => panic!("Expected UnknownDevice, got: {e:?}"),
        }
        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_close_ends_stream() {
        let (client, mut bridge) = pair();
        client.close().await.unwrap();
        assert!(bridge.next_request().await.is_none());
    }

    #[tokio::test]
    async fn test_connector_missing_files_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let target = BridgeTarget {
            address: "192.168.1.50".to_string(),
            credentials: crate::config::CredentialPaths::in_dir(dir.path()),
        };
        let result = LeapConnector::new().connect(&target).await;
        assert!(matches!(result, Err(BridgeError::Io(_))));
    }
}
