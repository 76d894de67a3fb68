use super::{class_name, emit, function_block, function_length, Descriptor};
use crate::allocate::{Allocation, EndpointKey};
use crate::config::{Configuration, Device, Endpoint, TransferType};
use crate::error::ValidationError;
use crate::strings::{StringTable, MANUFACTURER_INDEX, PRODUCT_INDEX, SERIAL_INDEX};
use crate::table::Table;

/// Turn a dotted release such as "1.00" into packed BCD (0x0100). A single
/// minor digit is a tenth: "2.1" is 0x0210.
pub fn parse_bcd(version: &str) -> Result<u16, ValidationError> {
    let invalid = || ValidationError::InvalidBcdVersion(version.to_owned());
    let mut parts = version.trim().splitn(2, '.');
    let major = parts.next().unwrap_or("");
    let minor = parts.next().unwrap_or("");
    if major.is_empty()
        || major.len() > 2
        || minor.len() > 2
        || !major.chars().chain(minor.chars()).all(|c| c.is_ascii_digit())
    {
        return Err(invalid());
    }
    let major = u16::from_str_radix(major, 16).map_err(|_| invalid())?;
    let minor = match minor.len() {
        0 => 0,
        _ => u16::from_str_radix(&format!("{:0<2}", minor), 16).map_err(|_| invalid())?,
    };
    Ok((major << 8) | minor)
}

pub struct DeviceDescriptor<'a> {
    device: &'a Device,
    bcd_device: u16,
}

impl<'a> DeviceDescriptor<'a> {
    pub const LENGTH: usize = 18;

    pub fn new(device: &'a Device) -> Result<Self, ValidationError> {
        Ok(DeviceDescriptor { device, bcd_device: parse_bcd(&device.bcd_device)? })
    }
}

impl Descriptor for DeviceDescriptor<'_> {
    fn name(&self) -> String { "Device Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let device = self.device;
        let mut written = 0;
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (18 bytes)");
        written += out.byte(super::DEVICE, "bDescriptorType: Device");
        written += out.word(0x0200, "bcdUSB: USB specification version (2.00)");
        written += out.byte(device.class, format!("bDeviceClass: {}", class_name(device.class)));
        written += out.byte(device.subclass, format!("bDeviceSubClass: Subclass code (0x{:02X})", device.subclass));
        written += out.byte(device.protocol, format!("bDeviceProtocol: Protocol code (0x{:02X})", device.protocol));
        written += out.byte(
            device.max_packet_size0,
            format!("bMaxPacketSize0: Maximum packet size for EP0 ({} bytes)", device.max_packet_size0),
        );
        written += out.word(device.vid, format!("idVendor: Vendor ID (0x{:04X})", device.vid));
        written += out.word(device.pid, format!("idProduct: Product ID (0x{:04X})", device.pid));
        written += out.word(self.bcd_device, format!("bcdDevice: Device release number (0x{:04X})", self.bcd_device));
        written += out.byte(
            MANUFACTURER_INDEX,
            format!("iManufacturer: String index for manufacturer ({})", device.manufacturer),
        );
        written += out.byte(PRODUCT_INDEX, format!("iProduct: String index for product ({})", device.product));
        written +=
            out.byte(SERIAL_INDEX, format!("iSerialNumber: String index for serial number ({})", device.serial));
        written += out.byte(1, "bNumConfigurations: Number of configurations (1)");
        Ok(written)
    }
}

/// The configuration descriptor together with every interface, functional
/// and endpoint descriptor nested under it.
pub struct ConfigurationDescriptor<'a> {
    configuration: &'a Configuration,
    max_power: u16,
    functions: Vec<Box<dyn Descriptor + 'a>>,
}

impl<'a> ConfigurationDescriptor<'a> {
    pub const HEADER_LENGTH: usize = 9;

    pub fn new(
        configuration: &'a Configuration,
        device: &Device,
        allocation: &Allocation,
        strings: &StringTable,
    ) -> Result<Self, ValidationError> {
        let functions = configuration
            .interfaces
            .iter()
            .enumerate()
            .map(|(index, interface)| function_block(index, interface, allocation, strings))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(ConfigurationDescriptor { configuration, max_power: device.max_power, functions })
    }

    /// `wTotalLength`, summed from the interface kinds rather than measured.
    pub fn total_length(configuration: &Configuration) -> usize {
        Self::HEADER_LENGTH + configuration.interfaces.iter().map(function_length).sum::<usize>()
    }

    pub fn interface_count(configuration: &Configuration) -> usize {
        configuration.interfaces.iter().map(|i| i.interface_count()).sum()
    }
}

impl Descriptor for ConfigurationDescriptor<'_> {
    fn name(&self) -> String { "Configuration Descriptor".to_owned() }

    fn length(&self) -> usize { Self::total_length(self.configuration) }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let total_length = self.length();
        let interface_count = Self::interface_count(self.configuration);
        let attributes = self.configuration.attributes_byte();
        let max_power = (self.max_power / 2) as u8;

        let mut written = 0;
        out.heading("Configuration Descriptor");
        written += out.byte(Self::HEADER_LENGTH as u8, "bLength: Size of descriptor (9 bytes)");
        written += out.byte(super::CONFIGURATION, "bDescriptorType: Configuration");
        written += out.word(
            total_length as u16,
            format!("wTotalLength: Total length of configuration ({} bytes)", total_length),
        );
        written += out.byte(
            interface_count as u8,
            format!("bNumInterfaces: Number of interfaces ({})", interface_count),
        );
        written += out.byte(1, "bConfigurationValue: Configuration ID (1)");
        written += out.byte(0, "iConfiguration: Index of string descriptor (0 = none)");
        let powered = if attributes & 0x40 != 0 { "Self-powered" } else { "Bus-powered" };
        let wakeup = if attributes & 0x20 != 0 { ", remote wakeup" } else { "" };
        written += out.byte(attributes, format!("bmAttributes: {} device{}", powered, wakeup));
        written += out.byte(
            max_power,
            format!("bMaxPower: Maximum power consumption ({} mA)", max_power as u16 * 2),
        );
        for function in &self.functions {
            out.blank();
            written += emit(function.as_ref(), out)?;
        }
        Ok(written)
    }
}

pub struct InterfaceDescriptor {
    pub number: u8,
    pub num_endpoints: u8,
    pub class: u8,
    pub subclass: u8,
    pub protocol: u8,
    pub string_index: u8,
    pub label: String,
}

impl InterfaceDescriptor {
    pub const LENGTH: usize = 9;
}

impl Descriptor for InterfaceDescriptor {
    fn name(&self) -> String { format!("Interface {}", self.number) }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (9 bytes)");
        written += out.byte(super::INTERFACE, "bDescriptorType: Interface");
        written += out.byte(self.number, format!("bInterfaceNumber: Interface {}", self.number));
        written += out.byte(0, "bAlternateSetting: Alternate setting (0)");
        written += out.byte(
            self.num_endpoints,
            format!("bNumEndpoints: Number of endpoints ({})", self.num_endpoints),
        );
        written += out.byte(self.class, format!("bInterfaceClass: {}", class_name(self.class)));
        written += out.byte(self.subclass, format!("bInterfaceSubClass: Subclass code (0x{:02X})", self.subclass));
        written += out.byte(self.protocol, format!("bInterfaceProtocol: Protocol code (0x{:02X})", self.protocol));
        let label = if self.string_index == 0 { "none" } else { self.label.as_str() };
        written += out.byte(self.string_index, format!("iInterface: String index for interface ({})", label));
        Ok(written)
    }
}

pub struct EndpointDescriptor<'a> {
    number: u8,
    endpoint: &'a Endpoint,
}

impl<'a> EndpointDescriptor<'a> {
    pub const LENGTH: usize = 7;

    /// Look up the number allocated to `key`. An endpoint without one cannot
    /// be described.
    pub fn new(allocation: &Allocation, key: EndpointKey, endpoint: &'a Endpoint) -> Result<Self, ValidationError> {
        let number = allocation.endpoint_number(&key).ok_or(ValidationError::UnassignedEndpoint {
            interface: key.interface,
            role: key.role,
            index: key.index,
        })?;
        Ok(EndpointDescriptor { number, endpoint })
    }

    /// `bEndpointAddress`
    pub fn address(&self) -> u8 { self.number | self.endpoint.direction.mask() }
}

impl Descriptor for EndpointDescriptor<'_> {
    fn name(&self) -> String {
        format!("Endpoint {}: {} {}", self.number, self.endpoint.transfer, self.endpoint.direction)
    }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let ep = self.endpoint;
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (7 bytes)");
        written += out.byte(super::ENDPOINT, "bDescriptorType: Endpoint");
        written += out.byte(
            self.address(),
            format!("bEndpointAddress: Endpoint {} {}", self.number, ep.direction),
        );
        written += out.byte(ep.transfer.attributes(), format!("bmAttributes: {} transfer type", ep.transfer));
        written += out.word(ep.max_packet_size, format!("wMaxPacketSize: {} bytes", ep.max_packet_size));
        let interval = match ep.transfer {
            TransferType::Interrupt => format!("bInterval: Polling interval ({} ms)", ep.interval),
            TransferType::Bulk => format!("bInterval: {} (ignored for Bulk)", ep.interval),
        };
        written += out.byte(ep.interval, interval);
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allocate::allocate;
    use crate::config::{load_str, Direction, SubRole};

    #[test]
    fn bcd_versions() {
        assert_eq!(parse_bcd("1.00"), Ok(0x0100));
        assert_eq!(parse_bcd("2.1"), Ok(0x0210));
        assert_eq!(parse_bcd("12.34"), Ok(0x1234));
        assert_eq!(parse_bcd("3"), Ok(0x0300));
        assert!(parse_bcd("1.0a").is_err());
        assert!(parse_bcd("1.2.3").is_err());
        assert!(parse_bcd("123.0").is_err());
        assert!(parse_bcd("").is_err());
    }

    #[test]
    fn device_descriptor_layout() {
        let config = load_str(
            r#"{ "device": { "vid": "0x0416", "pid": "0x5020", "bcd_device": "1.10",
                 "max_packet_size0": 64, "class": "0xEF", "subclass": 2, "protocol": 1,
                 "manufacturer": "Nuvoton", "product": "Adapter", "serial": "1" } }"#,
        )
        .unwrap();
        let descriptor = DeviceDescriptor::new(config.device().unwrap()).unwrap();
        let mut out = Table::new();
        assert_eq!(emit(&descriptor, &mut out), Ok(18));
        assert_eq!(
            out.bytes(),
            vec![
                0x12, 0x01, 0x00, 0x02, 0xEF, 0x02, 0x01, 0x40, 0x16, 0x04, 0x20, 0x50, 0x10, 0x01, 0x01, 0x02,
                0x03, 0x01
            ]
        );
    }

    fn allocated(doc: &str) -> (crate::config::UsbConfig, Allocation) {
        let config = load_str(doc).unwrap();
        let allocation = allocate(&config).unwrap();
        (config, allocation)
    }

    const CUSTOM_ONLY: &str = r#"{
        "device": { "endpoints": { "max_count": 4 } },
        "configuration": { "interfaces": [ { "class": "custom", "string": "Vendor",
            "endpoints": [
                { "direction": "out", "type": "bulk", "max_packet_size": 512 },
                { "direction": "in", "type": "interrupt", "max_packet_size": 16, "interval": 4 }
            ] } ] }
    }"#;

    #[test]
    fn endpoint_descriptor_bytes() {
        let (config, allocation) = allocated(CUSTOM_ONLY);
        let crate::config::Interface::Custom(custom) = &config.interfaces().unwrap()[0] else {
            panic!("expected custom")
        };

        let out_ep = EndpointDescriptor::new(&allocation, EndpointKey::new(0, None, 0), &custom.endpoints[0]).unwrap();
        let mut out = Table::new();
        emit(&out_ep, &mut out).unwrap();
        assert_eq!(out.bytes(), vec![0x07, 0x05, 0x01, 0x02, 0x00, 0x02, 0x00]);

        let in_ep = EndpointDescriptor::new(&allocation, EndpointKey::new(0, None, 1), &custom.endpoints[1]).unwrap();
        assert_eq!(custom.endpoints[1].direction, Direction::In);
        assert_eq!(in_ep.address(), 0x82);
        let mut out = Table::new();
        emit(&in_ep, &mut out).unwrap();
        assert_eq!(out.bytes(), vec![0x07, 0x05, 0x82, 0x03, 0x10, 0x00, 0x04]);
    }

    #[test]
    fn endpoint_without_number_is_refused() {
        let (config, allocation) = allocated(CUSTOM_ONLY);
        let crate::config::Interface::Custom(custom) = &config.interfaces().unwrap()[0] else {
            panic!("expected custom")
        };
        let key = EndpointKey::new(3, Some(SubRole::Data), 1);
        assert!(matches!(
            EndpointDescriptor::new(&allocation, key, &custom.endpoints[0]),
            Err(ValidationError::UnassignedEndpoint { interface: 3, role: Some(SubRole::Data), index: 1 })
        ));
    }

    #[test]
    fn configuration_header() {
        let (config, allocation) = allocated(CUSTOM_ONLY);
        let device = config.device().unwrap();
        let configuration = config.configuration.as_ref().unwrap();
        let strings = StringTable::derive(device, &configuration.interfaces);
        let descriptor = ConfigurationDescriptor::new(configuration, device, &allocation, &strings).unwrap();
        let mut out = Table::new();
        assert_eq!(emit(&descriptor, &mut out), Ok(9 + 23));
        let bytes = out.bytes();
        assert_eq!(&bytes[..9], &[0x09, 0x02, 32, 0x00, 0x01, 0x01, 0x00, 0x80, 50]);
        // Interface descriptor follows the header directly.
        assert_eq!(&bytes[9..18], &[0x09, 0x04, 0x00, 0x00, 0x02, 0xFF, 0x00, 0x00, 0x04]);
    }
}
