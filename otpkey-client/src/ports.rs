//! Serial port discovery.

use crate::error::ClientError;

/// A serial port the operator can pick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Port name (e.g., "/dev/ttyACM0", "COM3").
    pub name: String,
    /// Human-readable description.
    pub description: String,
}

/// Lists the serial ports present on this machine.
///
/// Returns [`ClientError::NoPortsAvailable`] when there are none, since
/// nothing else can proceed without a device.
pub fn list_ports() -> Result<Vec<PortInfo>, ClientError> {
    let ports = serialport::available_ports().map_err(|e| {
        tracing::error!("Failed to enumerate serial ports: {}", e);
        ClientError::Io(e.into())
    })?;

    let ports: Vec<PortInfo> = ports
        .into_iter()
        .map(|port| PortInfo {
            description: describe(&port.port_type),
            name: port.port_name,
        })
        .collect();

    tracing::debug!("found {} serial port(s)", ports.len());
    if ports.is_empty() {
        return Err(ClientError::NoPortsAvailable);
    }
    Ok(ports)
}

fn describe(port_type: &serialport::SerialPortType) -> String {
    match port_type {
        serialport::SerialPortType::UsbPort(usb) => format!(
            "USB {} {} ({:04x}:{:04x})",
            usb.manufacturer.as_deref().unwrap_or("Device"),
            usb.product.as_deref().unwrap_or("Serial Port"),
            usb.vid,
            usb.pid
        ),
        serialport::SerialPortType::BluetoothPort => "Bluetooth Serial".to_string(),
        serialport::SerialPortType::PciPort => "PCI Serial".to_string(),
        serialport::SerialPortType::Unknown => "Serial Port".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serialport::{SerialPortType, UsbPortInfo};

    #[test]
    fn test_describe_usb() {
        let usb = SerialPortType::UsbPort(UsbPortInfo {
            vid: 0x2e8a,
            pid: 0x000a,
            serial_number: None,
            manufacturer: Some("Raspberry Pi".to_string()),
            product: Some("Pico".to_string()),
        });
        assert_eq!(describe(&usb), "USB Raspberry Pi Pico (2e8a:000a)");
    }

    #[test]
    fn test_describe_other() {
        assert_eq!(describe(&SerialPortType::PciPort), "PCI Serial");
        assert_eq!(describe(&SerialPortType::Unknown), "Serial Port");
    }

    #[test]
    fn test_list_ports_does_not_panic() {
        // Build machines rarely have serial hardware; either outcome is fine.
        match list_ports() {
            Ok(ports) => assert!(!ports.is_empty()),
            Err(e) => assert!(matches!(
                e,
                ClientError::NoPortsAvailable | ClientError::Io(_)
            )),
        }
    }
}
