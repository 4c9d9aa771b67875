//! One fetch-and-parse cycle against the price API

use core::fmt::Debug;

use embedded_io_async::{Read, Write};
use log::{error, info, warn};
use thiserror_no_std::Error;

use crate::response::{PriceReading, parse_response};

/// Plain HTTP, no TLS.
pub const HTTP_PORT: u16 = 80;

/// Request path including the query selecting the JSON format.
pub const PRICES_PATH: &str = "/metals.php?format=JSON";

/// Opens byte-stream connections to a named host.
pub trait Transport {
    type Error: Debug;
    type Connection<'a>: Read + Write
    where
        Self: 'a;

    /// Resolve `host` and open a connection to `port`.
    fn connect(
        &mut self,
        host: &str,
        port: u16,
    ) -> impl Future<Output = Result<Self::Connection<'_>, Self::Error>>;
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchError {
    #[error("No API address configured")]
    NoAddress,
    #[error("Could not connect to the API host")]
    Connect,
    #[error("Failed to send the request")]
    Request,
}

/// Blank line ending the status line and headers.
const HEADER_END: &[u8] = b"\r\n\r\n";

/// Write the GET request for the price document.
pub async fn write_request<W: Write>(writer: &mut W, host: &str) -> Result<(), W::Error> {
    writer.write_all(b"GET ").await?;
    writer.write_all(PRICES_PATH.as_bytes()).await?;
    writer.write_all(b" HTTP/1.1\r\nHost: ").await?;
    writer.write_all(host.as_bytes()).await?;
    writer.write_all(b"\r\nConnection: close\r\n\r\n").await?;
    writer.flush().await
}

/// Consume the status line and headers, stopping right after the blank line.
///
/// Bytes are taken one at a time so the first body byte stays on the stream.
/// Returns false if the stream ends or fails before the headers do.
pub async fn skip_headers<R: Read>(reader: &mut R) -> bool {
    let mut matched = 0;
    let mut byte = [0u8; 1];

    while matched < HEADER_END.len() {
        match reader.read(&mut byte).await {
            Ok(0) => return false,
            Ok(_) => {}
            Err(e) => {
                warn!("Response stream error in headers: {:?}", e);
                return false;
            }
        }

        matched = if byte[0] == HEADER_END[matched] {
            matched + 1
        } else if byte[0] == HEADER_END[0] {
            1
        } else {
            0
        };
    }

    true
}

/// Connect to `host`, request the prices and parse whatever comes back.
///
/// A connection or request failure is an `Err`: the caller keeps the prices
/// it already had. Once the request is out, the result is always `Ok`, with
/// fields the response failed to supply at [`crate::response::PRICE_UNKNOWN`].
///
/// Blocks until the server closes the stream or the object is complete.
pub async fn fetch_prices<T: Transport>(
    transport: &mut T,
    host: &str,
) -> Result<PriceReading, FetchError> {
    if host.is_empty() {
        error!("Fetch skipped: {}", FetchError::NoAddress);
        return Err(FetchError::NoAddress);
    }

    let mut connection = transport.connect(host, HTTP_PORT).await.map_err(|e| {
        error!("Failed to connect to {}:{}: {:?}", host, HTTP_PORT, e);
        FetchError::Connect
    })?;

    write_request(&mut connection, host).await.map_err(|e| {
        error!("Failed to send request to {}: {:?}", host, e);
        FetchError::Request
    })?;

    if !skip_headers(&mut connection).await {
        warn!("Response from {} ended inside the headers", host);
        return Ok(PriceReading::UNKNOWN);
    }

    let reading = parse_response(&mut connection).await;
    info!("Prices: gold={} silver={}", reading.gold, reading.silver);

    Ok(reading)
}
