//! Typed builders for the bracketed command set.
//!
//! Every builder renders one `[COMMAND]payload` frame into a fixed-capacity
//! buffer and hands it to [`Connection::send_command`]. Structured payloads
//! (header maps, stored credentials) are rendered with `serde-json-core`;
//! request bodies are passed through as caller-supplied JSON text so the
//! engine never re-encodes them.

use core::fmt::Write as _;

use heapless::{LinearMap, String};
use serde::Serialize;

use crate::error::SendError;
use crate::link::Connection;
use crate::protocol::{MAX_HEADERS, TX_BUFFER_SIZE};
use crate::storage::StorageSink;
use crate::transport::{SerialPort, Watchdog};

/// Request headers as a fixed-capacity name/value map.
///
/// Rendered as a JSON object inside the command payload. Capacity is
/// [`MAX_HEADERS`] entries.
pub type Headers<'a> = LinearMap<&'a str, &'a str, MAX_HEADERS>;

/// Rendered-header buffer size.
const HEADERS_JSON_SIZE: usize = 256;

/// Wi-Fi credentials as stored on the companion.
#[derive(Serialize)]
struct Credentials<'a> {
    ssid: &'a str,
    password: &'a str,
}

impl<'q, P, S, W> Connection<'q, P, S, W>
where
    P: SerialPort,
    S: StorageSink,
    W: Watchdog,
{
    /// `[PING]` — liveness probe.
    ///
    /// The link is held in the unconfirmed state until the `[PONG]` reply is
    /// pumped, so a probe against a dead companion leaves the link inactive
    /// rather than optimistically idle.
    pub fn ping(&mut self) -> Result<(), SendError> {
        self.send_command("[PING]")?;
        self.mark_inactive();
        Ok(())
    }

    /// `[LIST]` — ask the companion for its supported command set.
    pub fn list_commands(&mut self) -> Result<(), SendError> {
        self.send_command("[LIST]")
    }

    /// `[LED/ON]` — enable the companion's activity LED.
    pub fn led_on(&mut self) -> Result<(), SendError> {
        self.send_command("[LED/ON]")
    }

    /// `[LED/OFF]` — disable the companion's activity LED.
    pub fn led_off(&mut self) -> Result<(), SendError> {
        self.send_command("[LED/OFF]")
    }

    /// `[IP/ADDRESS]` — fetch the device's public IP address.
    pub fn ip_address(&mut self) -> Result<(), SendError> {
        self.send_command("[IP/ADDRESS]")
    }

    /// `[WIFI/IP]` — fetch the local IP address on the joined network.
    pub fn wifi_ip(&mut self) -> Result<(), SendError> {
        self.send_command("[WIFI/IP]")
    }

    /// `[WIFI/SCAN]` — list access points in range.
    pub fn scan_wifi(&mut self) -> Result<(), SendError> {
        self.send_command("[WIFI/SCAN]")
    }

    /// `[WIFI/SAVE]` — store credentials on the companion.
    pub fn save_wifi(&mut self, ssid: &str, password: &str) -> Result<(), SendError> {
        let creds = Credentials { ssid, password };
        let json: String<TX_BUFFER_SIZE> =
            serde_json_core::to_string(&creds).map_err(|_| SendError::TooLong)?;
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(cmd, "[WIFI/SAVE]{json}").map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    /// `[WIFI/CONNECT]` — join the network using stored credentials.
    ///
    /// Permitted even while the link is unconfirmed, since bringing the
    /// network up is a precondition for most other traffic.
    pub fn connect_wifi(&mut self) -> Result<(), SendError> {
        self.send_command("[WIFI/CONNECT]")
    }

    /// `[WIFI/DISCONNECT]` — leave the current network.
    pub fn disconnect_wifi(&mut self) -> Result<(), SendError> {
        self.send_command("[WIFI/DISCONNECT]")
    }

    /// `[PARSE]` — extract one key from a JSON document on the companion.
    pub fn parse_json(&mut self, key: &str, json: &str) -> Result<(), SendError> {
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(cmd, "[PARSE]{{\"key\":\"{key}\",\"json\":{json}}}")
            .map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    /// `[PARSE/ARRAY]` — extract one element of an array value from a JSON
    /// document on the companion.
    pub fn parse_json_array(
        &mut self,
        key: &str,
        index: usize,
        json: &str,
    ) -> Result<(), SendError> {
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(
            cmd,
            "[PARSE/ARRAY]{{\"key\":\"{key}\",\"index\":\"{index}\",\"json\":{json}}}"
        )
        .map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    /// `[GET]` — plain GET with no headers.
    pub fn get(&mut self, url: &str) -> Result<(), SendError> {
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(cmd, "[GET]{url}").map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    /// `[GET/HTTP]` — GET with headers.
    pub fn get_with_headers(&mut self, url: &str, headers: &Headers) -> Result<(), SendError> {
        let json = render_headers(headers)?;
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(cmd, "[GET/HTTP]{{\"url\":\"{url}\",\"headers\":{json}}}")
            .map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    /// `[GET/BYTES]` — GET whose response body is streamed raw into `path`
    /// instead of the text buffer.
    pub fn get_bytes(
        &mut self,
        url: &str,
        headers: &Headers,
        path: &str,
    ) -> Result<(), SendError> {
        self.arm_bytes_capture(path)?;
        let result = self.build_bytes_request("[GET/BYTES]", url, headers, None);
        if result.is_err() {
            self.disarm_bytes_capture();
        }
        result
    }

    /// `[POST/HTTP]` — POST with headers and a JSON body.
    pub fn post_with_headers(
        &mut self,
        url: &str,
        headers: &Headers,
        payload: &str,
    ) -> Result<(), SendError> {
        self.build_body_request("[POST/HTTP]", url, headers, payload)
    }

    /// `[POST/BYTES]` — POST whose response body is streamed raw into
    /// `path`.
    pub fn post_bytes(
        &mut self,
        url: &str,
        headers: &Headers,
        payload: &str,
        path: &str,
    ) -> Result<(), SendError> {
        self.arm_bytes_capture(path)?;
        let result = self.build_bytes_request("[POST/BYTES]", url, headers, Some(payload));
        if result.is_err() {
            self.disarm_bytes_capture();
        }
        result
    }

    /// `[PUT/HTTP]` — PUT with headers and a JSON body.
    pub fn put_with_headers(
        &mut self,
        url: &str,
        headers: &Headers,
        payload: &str,
    ) -> Result<(), SendError> {
        self.build_body_request("[PUT/HTTP]", url, headers, payload)
    }

    /// `[DELETE/HTTP]` — DELETE with headers and a JSON body.
    pub fn delete_with_headers(
        &mut self,
        url: &str,
        headers: &Headers,
        payload: &str,
    ) -> Result<(), SendError> {
        self.build_body_request("[DELETE/HTTP]", url, headers, payload)
    }

    fn build_body_request(
        &mut self,
        prefix: &str,
        url: &str,
        headers: &Headers,
        payload: &str,
    ) -> Result<(), SendError> {
        let json = render_headers(headers)?;
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        write!(
            cmd,
            "{prefix}{{\"url\":\"{url}\",\"headers\":{json},\"payload\":{payload}}}"
        )
        .map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }

    fn build_bytes_request(
        &mut self,
        prefix: &str,
        url: &str,
        headers: &Headers,
        payload: Option<&str>,
    ) -> Result<(), SendError> {
        let json = render_headers(headers)?;
        let mut cmd: String<TX_BUFFER_SIZE> = String::new();
        match payload {
            Some(payload) => write!(
                cmd,
                "{prefix}{{\"url\":\"{url}\",\"headers\":{json},\"payload\":{payload}}}"
            ),
            None => write!(cmd, "{prefix}{{\"url\":\"{url}\",\"headers\":{json}}}"),
        }
        .map_err(|_| SendError::TooLong)?;
        self.send_command(&cmd)
    }
}

fn render_headers(headers: &Headers) -> Result<String<HEADERS_JSON_SIZE>, SendError> {
    serde_json_core::to_string(headers).map_err(|_| SendError::TooLong)
}
