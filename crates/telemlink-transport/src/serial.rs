use std::io::{Read, Write};
use std::time::Duration;

use serialport::{DataBits, FlowControl, Parity, SerialPort, SerialPortType, StopBits};
use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::{is_timeout, Transport};

/// Default line rate.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default read timeout for serial transports: 1 second.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(1);

/// Descriptor substring used to auto-detect the device's USB serial bridge.
pub const DEFAULT_PORT_PATTERN: &str = "STMicroelectronics";

/// Serial line settings. The line is always 8 data bits, no parity, one
/// stop bit, no flow control.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub baud_rate: u32,
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

/// An open serial port.
pub struct SerialTransport {
    port: Option<Box<dyn SerialPort>>,
    path: String,
    read_timeout: Duration,
}

impl SerialTransport {
    /// Open `path` with default settings.
    pub fn open(path: &str) -> Result<Self> {
        Self::open_with_config(path, &SerialConfig::default())
    }

    /// Open `path` (e.g. `/dev/ttyACM0`, `COM3`).
    pub fn open_with_config(path: &str, config: &SerialConfig) -> Result<Self> {
        let port = serialport::new(path, config.baud_rate)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(config.read_timeout)
            .open()
            .map_err(|e| TransportError::Open {
                target: path.to_string(),
                source: e.into(),
            })?;
        info!(path, baud = config.baud_rate, "serial port opened");

        Ok(Self {
            port: Some(port),
            path: path.to_string(),
            read_timeout: config.read_timeout,
        })
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    fn port(&mut self) -> Result<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(TransportError::Closed)
    }
}

impl Transport for SerialTransport {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        match Read::read(self.port()?, buf) {
            Ok(n) => Ok(n),
            Err(e) if is_timeout(e.kind()) => Ok(0),
            Err(e) => Err(TransportError::Io(e)),
        }
    }

    fn write(&mut self, data: &[u8]) -> Result<usize> {
        let port = self.port()?;
        let n = Write::write(port, data)?;
        Write::flush(port)?;
        Ok(n)
    }

    fn close(&mut self) -> Result<()> {
        if self.port.take().is_some() {
            debug!(path = %self.path, "serial port closed");
        }
        Ok(())
    }

    fn set_read_timeout(&mut self, timeout: Duration) -> Result<()> {
        self.port()?
            .set_timeout(timeout)
            .map_err(|e| TransportError::Io(e.into()))?;
        self.read_timeout = timeout;
        Ok(())
    }

    fn read_timeout(&self) -> Duration {
        self.read_timeout
    }

    fn describe(&self) -> String {
        format!("serial://{}", self.path)
    }
}

/// One enumerated serial port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub name: String,
    /// `usb`, `bluetooth`, `pci` or `unknown`.
    pub kind: &'static str,
    /// Manufacturer and product strings for USB ports.
    pub description: Option<String>,
}

impl PortInfo {
    /// True if the port name or descriptor contains `pattern`.
    pub fn matches(&self, pattern: &str) -> bool {
        self.name.contains(pattern)
            || self
                .description
                .as_deref()
                .is_some_and(|description| description.contains(pattern))
    }
}

/// Enumerate the serial ports present on this machine.
pub fn list_ports() -> Result<Vec<PortInfo>> {
    let ports = serialport::available_ports().map_err(|e| TransportError::Io(e.into()))?;
    let mut out: Vec<PortInfo> = ports
        .into_iter()
        .map(|port| {
            let (kind, description) = match port.port_type {
                SerialPortType::UsbPort(info) => {
                    let parts: Vec<String> = [info.manufacturer, info.product]
                        .into_iter()
                        .flatten()
                        .collect();
                    let description = (!parts.is_empty()).then(|| parts.join(" "));
                    ("usb", description)
                }
                SerialPortType::BluetoothPort => ("bluetooth", None),
                SerialPortType::PciPort => ("pci", None),
                SerialPortType::Unknown => ("unknown", None),
            };
            PortInfo {
                name: port.port_name,
                kind,
                description,
            }
        })
        .collect();
    out.sort_by(|a, b| a.name.cmp(&b.name));
    debug!(count = out.len(), "serial ports enumerated");
    Ok(out)
}

/// Name of the first port matching `pattern`, if any.
pub fn find_port(pattern: &str) -> Result<Option<String>> {
    Ok(select_port(&list_ports()?, pattern).map(|port| port.name.clone()))
}

/// First entry of `ports` matching `pattern`.
pub fn select_port<'a>(ports: &'a [PortInfo], pattern: &str) -> Option<&'a PortInfo> {
    ports.iter().find(|port| port.matches(pattern))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ports() -> Vec<PortInfo> {
        vec![
            PortInfo {
                name: "/dev/ttyS0".to_string(),
                kind: "unknown",
                description: None,
            },
            PortInfo {
                name: "/dev/ttyACM0".to_string(),
                kind: "usb",
                description: Some("STMicroelectronics STM32 STLink".to_string()),
            },
            PortInfo {
                name: "/dev/ttyACM1".to_string(),
                kind: "usb",
                description: Some("STMicroelectronics Virtual COM Port".to_string()),
            },
        ]
    }

    #[test]
    fn default_pattern_selects_first_matching_device() {
        let ports = ports();
        let found = select_port(&ports, DEFAULT_PORT_PATTERN).unwrap();
        assert_eq!(found.name, "/dev/ttyACM0");
    }

    #[test]
    fn pattern_can_match_port_name() {
        let ports = ports();
        assert_eq!(
            select_port(&ports, "ttyS").map(|p| p.name.as_str()),
            Some("/dev/ttyS0")
        );
        assert!(select_port(&ports, "FTDI").is_none());
    }

    #[test]
    fn opening_missing_port_fails_with_open_error() {
        let err = SerialTransport::open("/dev/telemlink-does-not-exist")
            .err()
            .unwrap();
        assert!(matches!(err, TransportError::Open { ref target, .. } if target.contains("does-not-exist")));
    }

    #[test]
    fn default_config() {
        let config = SerialConfig::default();
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_secs(1));
    }
}
