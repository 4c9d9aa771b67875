//! Wi-Fi association and TCP transport over esp-radio and embassy-net

use aurum_core::{Association, Settings, Transport};
use embassy_net::dns::DnsQueryType;
use embassy_net::tcp::TcpSocket;
use embassy_net::{Runner, Stack};
use embedded_io::ErrorKind;
use esp_radio::wifi::{ClientConfig, ModeConfig, WifiController, WifiDevice, WifiError};
use log::{debug, info};
use thiserror_no_std::Error;

const RX_BUFFER_SIZE: usize = 2048;
const TX_BUFFER_SIZE: usize = 256;

#[derive(Error, Debug)]
pub enum NetError {
    #[error("DNS lookup failed: {0:?}")]
    Dns(embassy_net::dns::Error),
    #[error("Host resolved to no addresses")]
    NoAddress,
    #[error("TCP connect failed: {0:?}")]
    Connect(embassy_net::tcp::ConnectError),
}

fn io_error_kind(error: embassy_net::tcp::Error) -> ErrorKind {
    debug!("TCP I/O failed: {:?}", error);
    match error {
        embassy_net::tcp::Error::ConnectionReset => ErrorKind::ConnectionReset,
    }
}

/// Station-mode Wi-Fi plus the network stack riding on it.
pub struct WifiAssociation<'d> {
    controller: WifiController<'d>,
    stack: Stack<'d>,
}

impl<'d> WifiAssociation<'d> {
    pub fn new(controller: WifiController<'d>, stack: Stack<'d>) -> Self {
        Self { controller, stack }
    }
}

impl Association for WifiAssociation<'_> {
    type Error = WifiError;

    async fn begin(&mut self, settings: &Settings) -> Result<(), Self::Error> {
        let client_config = ModeConfig::Client(
            ClientConfig::default()
                .with_ssid(settings.ssid.as_str().into())
                .with_password(settings.password.as_str().into()),
        );
        self.controller.set_config(&client_config)?;

        if !matches!(self.controller.is_started(), Ok(true)) {
            self.controller.start_async().await?;
            info!("Wi-Fi started");
        }

        // Returns immediately, the driver joins in the background
        self.controller.connect()
    }

    fn is_associated(&mut self) -> bool {
        matches!(self.controller.is_connected(), Ok(true)) && self.stack.is_config_up()
    }
}

/// Opens TCP connections through the shared embassy-net stack.
///
/// One connection at a time: the socket buffers live here and are lent to
/// each connection.
pub struct NetTransport<'d> {
    stack: Stack<'d>,
    rx_buffer: [u8; RX_BUFFER_SIZE],
    tx_buffer: [u8; TX_BUFFER_SIZE],
}

impl<'d> NetTransport<'d> {
    pub fn new(stack: Stack<'d>) -> Self {
        Self {
            stack,
            rx_buffer: [0; RX_BUFFER_SIZE],
            tx_buffer: [0; TX_BUFFER_SIZE],
        }
    }
}

impl<'d> Transport for NetTransport<'d> {
    type Error = NetError;
    type Connection<'a>
        = TcpConnection<'a>
    where
        Self: 'a;

    async fn connect(&mut self, host: &str, port: u16) -> Result<Self::Connection<'_>, Self::Error> {
        let addresses = self
            .stack
            .dns_query(host, DnsQueryType::A)
            .await
            .map_err(NetError::Dns)?;
        let address = *addresses.first().ok_or(NetError::NoAddress)?;

        // No timeout: a stalled server stalls the fetch
        let mut socket = TcpSocket::new(self.stack, &mut self.rx_buffer, &mut self.tx_buffer);
        socket
            .connect((address, port))
            .await
            .map_err(NetError::Connect)?;

        Ok(TcpConnection { socket })
    }
}

/// An open TCP socket exposed through the `embedded-io-async` traits.
pub struct TcpConnection<'a> {
    socket: TcpSocket<'a>,
}

impl embedded_io_async::ErrorType for TcpConnection<'_> {
    type Error = ErrorKind;
}

impl embedded_io_async::Read for TcpConnection<'_> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.socket.read(buf).await.map_err(io_error_kind)
    }
}

impl embedded_io_async::Write for TcpConnection<'_> {
    async fn write(&mut self, buf: &[u8]) -> Result<usize, Self::Error> {
        self.socket.write(buf).await.map_err(io_error_kind)
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        self.socket.flush().await.map_err(io_error_kind)
    }
}

impl Drop for TcpConnection<'_> {
    fn drop(&mut self) {
        self.socket.close();
    }
}

#[embassy_executor::task]
pub async fn net_task(mut runner: Runner<'static, WifiDevice<'static>>) {
    runner.run().await
}
