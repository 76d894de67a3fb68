use std::fmt;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use serde::de::{self, Deserializer, Visitor};
use serde::Deserialize;

use crate::error::{ConfigError, ValidationError};

/// Priority given to interfaces that don't declare one.
pub const DEFAULT_PRIORITY: u32 = 999;

pub fn get_base(value: &str) -> (&str, u32) {
    if value.starts_with("0x") {
        (value.trim_start_matches("0x"), 16)
    } else if value.starts_with("0X") {
        (value.trim_start_matches("0X"), 16)
    } else if value.starts_with("0b") {
        (value.trim_start_matches("0b"), 2)
    } else if value.starts_with("0B") {
        (value.trim_start_matches("0B"), 2)
    } else if value.starts_with('0') && value != "0" {
        match value.trim_start_matches('0') {
            "" => ("0", 8),
            digits => (digits, 8),
        }
    } else {
        (value, 10)
    }
}

pub fn parse_u64(value: &str) -> Result<u64, std::num::ParseIntError> {
    let (value, base) = get_base(value.trim());
    u64::from_str_radix(value, base)
}

/// Accepts either a JSON integer or a string such as `"0x1209"`.
struct NumberVisitor;

impl<'de> Visitor<'de> for NumberVisitor {
    type Value = u64;

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "an unsigned integer or a string such as \"0x1209\"")
    }

    fn visit_u64<E: de::Error>(self, value: u64) -> Result<u64, E> { Ok(value) }

    fn visit_i64<E: de::Error>(self, value: i64) -> Result<u64, E> {
        u64::try_from(value).map_err(|_| E::custom(format!("negative value {}", value)))
    }

    fn visit_str<E: de::Error>(self, value: &str) -> Result<u64, E> {
        parse_u64(value).map_err(|e| E::custom(format!("unable to parse \"{}\": {}", value, e)))
    }
}

fn number<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    let value = deserializer.deserialize_any(NumberVisitor)?;
    T::try_from(value).map_err(|_| de::Error::custom(format!("value {:#x} is out of range", value)))
}

fn option_number<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
where
    D: Deserializer<'de>,
    T: TryFrom<u64>,
{
    number(deserializer).map(Some)
}

/// An interface number (or a reference to one) that is either pinned in the
/// document or left for the allocator to pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum InterfaceNumber {
    #[default]
    Auto,
    Fixed(u8),
}

impl InterfaceNumber {
    pub fn fixed(&self) -> Option<u8> {
        match *self {
            InterfaceNumber::Auto => None,
            InterfaceNumber::Fixed(n) => Some(n),
        }
    }
}

impl fmt::Display for InterfaceNumber {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            InterfaceNumber::Auto => write!(f, "auto"),
            InterfaceNumber::Fixed(n) => write!(f, "{}", n),
        }
    }
}

impl<'de> Deserialize<'de> for InterfaceNumber {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct InterfaceNumberVisitor;

        impl<'de> Visitor<'de> for InterfaceNumberVisitor {
            type Value = InterfaceNumber;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                write!(f, "\"auto\" or an interface number")
            }

            fn visit_u64<E: de::Error>(self, value: u64) -> Result<InterfaceNumber, E> {
                u8::try_from(value)
                    .map(InterfaceNumber::Fixed)
                    .map_err(|_| E::custom(format!("interface number {} is out of range", value)))
            }

            fn visit_i64<E: de::Error>(self, value: i64) -> Result<InterfaceNumber, E> {
                u64::try_from(value)
                    .map_err(|_| E::custom(format!("negative interface number {}", value)))
                    .and_then(|v| self.visit_u64(v))
            }

            fn visit_str<E: de::Error>(self, value: &str) -> Result<InterfaceNumber, E> {
                if value.eq_ignore_ascii_case("auto") {
                    return Ok(InterfaceNumber::Auto);
                }
                let parsed = NumberVisitor.visit_str::<E>(value)?;
                self.visit_u64(parsed)
            }
        }

        deserializer.deserialize_any(InterfaceNumberVisitor)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Speed {
    Low,
    #[default]
    Full,
    High,
    /// Any other speed name. Only full speed limits EP0.
    #[serde(other)]
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerSource {
    #[default]
    BusPowered,
    #[serde(other)]
    SelfPowered,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl Direction {
    /// Bit 7 of `bEndpointAddress`.
    pub fn mask(&self) -> u8 {
        match self {
            Direction::In => 0x80,
            Direction::Out => 0x00,
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Direction::In => write!(f, "IN"),
            Direction::Out => write!(f, "OUT"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferType {
    Interrupt,
    #[default]
    #[serde(other)]
    Bulk,
}

impl TransferType {
    /// `bmAttributes` of the endpoint descriptor.
    pub fn attributes(&self) -> u8 {
        match self {
            TransferType::Interrupt => 0x03,
            TransferType::Bulk => 0x02,
        }
    }
}

impl fmt::Display for TransferType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            TransferType::Interrupt => write!(f, "Interrupt"),
            TransferType::Bulk => write!(f, "Bulk"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum InterfaceClass {
    Cdc,
    Custom,
}

impl fmt::Display for InterfaceClass {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            InterfaceClass::Cdc => write!(f, "cdc"),
            InterfaceClass::Custom => write!(f, "custom"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SubRole {
    Communication,
    Data,
}

impl fmt::Display for SubRole {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SubRole::Communication => write!(f, "communication"),
            SubRole::Data => write!(f, "data"),
        }
    }
}

fn default_bcd_device() -> String { "1.00".to_owned() }
fn default_max_power() -> u16 { 100 }
fn default_max_packet_size0() -> u8 { 8 }
fn default_buffer_size() -> u16 { 64 }
fn default_priority() -> u32 { DEFAULT_PRIORITY }
fn default_max_packet_size() -> u16 { 64 }
fn default_cdc_class() -> u8 { 0x02 }
fn default_cdc_subclass() -> u8 { 0x02 }
fn default_cdc_protocol() -> u8 { 0x01 }
fn default_custom_class() -> u8 { 0xFF }

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EndpointPool {
    /// Number of non-control endpoints the device controller provides
    #[serde(default, deserialize_with = "number")]
    pub max_count: u8,

    /// Buffer size for endpoints that don't override it
    #[serde(default = "default_buffer_size", deserialize_with = "number")]
    pub buffer_size: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(default, deserialize_with = "number")]
    pub vid: u16,
    #[serde(default, deserialize_with = "number")]
    pub pid: u16,
    /// Device release as a dotted version, e.g. "1.00"
    #[serde(default = "default_bcd_device")]
    pub bcd_device: String,
    /// Maximum current draw, in mA
    #[serde(default = "default_max_power", deserialize_with = "number")]
    pub max_power: u16,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub product: String,
    #[serde(default)]
    pub serial: String,
    #[serde(default, deserialize_with = "number")]
    pub class: u8,
    #[serde(default, deserialize_with = "number")]
    pub subclass: u8,
    #[serde(default, deserialize_with = "number")]
    pub protocol: u8,
    #[serde(default = "default_max_packet_size0", deserialize_with = "number")]
    pub max_packet_size0: u8,
    #[serde(default)]
    pub speed: Speed,
    #[serde(default)]
    pub endpoints: EndpointPool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    pub direction: Direction,
    #[serde(rename = "type", default)]
    pub transfer: TransferType,
    #[serde(default = "default_max_packet_size", deserialize_with = "number")]
    pub max_packet_size: u16,
    /// Polling interval in frames; only interrupt endpoints use it
    #[serde(default, deserialize_with = "number")]
    pub interval: u8,
    #[serde(default, deserialize_with = "option_number")]
    pub buffer_size: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FunctionalDescriptor {
    Header {},
    CallManagement {
        #[serde(default, deserialize_with = "number")]
        capabilities: u8,
        #[serde(default)]
        data_interface: InterfaceNumber,
    },
    #[serde(alias = "abstract_control_management")]
    Acm {
        #[serde(default, deserialize_with = "number")]
        capabilities: u8,
    },
    Union {
        #[serde(default)]
        master_interface: InterfaceNumber,
        #[serde(default)]
        slave_interface: InterfaceNumber,
    },
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdcCommunication {
    #[serde(default)]
    pub interface_number: InterfaceNumber,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub functional_descriptors: Vec<FunctionalDescriptor>,
    #[serde(default)]
    pub string: String,
    #[serde(default = "default_cdc_class", deserialize_with = "number")]
    pub class: u8,
    #[serde(default = "default_cdc_subclass", deserialize_with = "number")]
    pub subclass: u8,
    #[serde(default = "default_cdc_protocol", deserialize_with = "number")]
    pub protocol: u8,
}

impl CdcCommunication {
    pub fn call_management(&self) -> Option<(u8, InterfaceNumber)> {
        self.functional_descriptors.iter().find_map(|fd| match *fd {
            FunctionalDescriptor::CallManagement { capabilities, data_interface } => {
                Some((capabilities, data_interface))
            }
            _ => None,
        })
    }

    pub fn acm_capabilities(&self) -> Option<u8> {
        self.functional_descriptors.iter().find_map(|fd| match *fd {
            FunctionalDescriptor::Acm { capabilities } => Some(capabilities),
            _ => None,
        })
    }

    pub fn union(&self) -> Option<(InterfaceNumber, InterfaceNumber)> {
        self.functional_descriptors.iter().find_map(|fd| match *fd {
            FunctionalDescriptor::Union { master_interface, slave_interface } => {
                Some((master_interface, slave_interface))
            }
            _ => None,
        })
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdcData {
    #[serde(default)]
    pub interface_number: InterfaceNumber,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default)]
    pub string: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CdcInterface {
    #[serde(default = "default_priority", deserialize_with = "number")]
    pub priority: u32,
    #[serde(default)]
    pub communication: Option<CdcCommunication>,
    #[serde(default)]
    pub data: Option<CdcData>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MsOs {
    pub guid: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomInterface {
    #[serde(default = "default_priority", deserialize_with = "number")]
    pub priority: u32,
    #[serde(default)]
    pub interface_number: InterfaceNumber,
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,
    #[serde(default = "default_custom_class", deserialize_with = "number")]
    pub class_code: u8,
    #[serde(default, deserialize_with = "number")]
    pub subclass_code: u8,
    #[serde(default, deserialize_with = "number")]
    pub protocol_code: u8,
    #[serde(default)]
    pub string: String,
    #[serde(default)]
    pub ms_os: Option<MsOs>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "class", rename_all = "lowercase")]
pub enum Interface {
    Cdc(CdcInterface),
    Custom(CustomInterface),
}

impl Interface {
    pub fn class(&self) -> InterfaceClass {
        match self {
            Interface::Cdc(_) => InterfaceClass::Cdc,
            Interface::Custom(_) => InterfaceClass::Custom,
        }
    }

    pub fn priority(&self) -> u32 {
        match self {
            Interface::Cdc(cdc) => cdc.priority,
            Interface::Custom(custom) => custom.priority,
        }
    }

    /// Number of interface descriptors this entry expands to.
    pub fn interface_count(&self) -> usize {
        match self {
            Interface::Cdc(_) => 2,
            Interface::Custom(_) => 1,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Configuration {
    #[serde(default)]
    pub attributes: PowerSource,
    #[serde(default)]
    pub remote_wakeup: bool,
    #[serde(default)]
    pub interfaces: Vec<Interface>,
}

impl Configuration {
    /// `bmAttributes` of the configuration descriptor.
    pub fn attributes_byte(&self) -> u8 {
        let mut attributes = match self.attributes {
            PowerSource::BusPowered => 0x80,
            PowerSource::SelfPowered => 0xC0,
        };
        if self.remote_wakeup {
            attributes |= 0x20;
        }
        attributes
    }
}

/// The whole device description, as handed over by the loader.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UsbConfig {
    #[serde(default)]
    pub device: Option<Device>,
    #[serde(default)]
    pub configuration: Option<Configuration>,
}

impl UsbConfig {
    pub fn device(&self) -> Result<&Device, ValidationError> {
        self.device.as_ref().ok_or(ValidationError::MissingDevice)
    }

    pub fn configuration(&self) -> Result<&Configuration, ValidationError> {
        match self.configuration.as_ref() {
            Some(configuration) if !configuration.interfaces.is_empty() => Ok(configuration),
            _ => Err(ValidationError::MissingInterfaces),
        }
    }

    pub fn interfaces(&self) -> Result<&[Interface], ValidationError> {
        Ok(&self.configuration()?.interfaces)
    }
}

/// Syntax of the device description.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
}

impl Format {
    /// `.yaml` and `.yml` files are YAML, anything else is JSON.
    pub fn from_path<P: AsRef<Path>>(path: P) -> Format {
        match path.as_ref().extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml") => Format::Yaml,
            _ => Format::Json,
        }
    }
}

impl FromStr for Format {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Format, ConfigError> {
        match value.to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            _ => Err(ConfigError::UnknownFormat(value.to_owned())),
        }
    }
}

pub fn load<T: Read>(src: T, format: Format) -> Result<UsbConfig, ConfigError> {
    Ok(match format {
        Format::Json => serde_json::from_reader(src)?,
        Format::Yaml => serde_yaml::from_reader(src)?,
    })
}

pub fn load_str(src: &str) -> serde_json::Result<UsbConfig> { serde_json::from_str(src) }

pub fn load_yaml_str(src: &str) -> Result<UsbConfig, serde_yaml::Error> { serde_yaml::from_str(src) }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn radix_prefixes() {
        assert_eq!(parse_u64("0x1209").unwrap(), 0x1209);
        assert_eq!(parse_u64("0b101").unwrap(), 5);
        assert_eq!(parse_u64("017").unwrap(), 0o17);
        assert_eq!(parse_u64("0").unwrap(), 0);
        assert_eq!(parse_u64("00").unwrap(), 0);
        assert_eq!(parse_u64("000").unwrap(), 0);
        assert_eq!(parse_u64("42").unwrap(), 42);
        assert!(parse_u64("0xZZ").is_err());
    }

    #[test]
    fn load_device_defaults() {
        let config = load_str(
            r#"{
                "device": { "vid": "0x1209", "pid": 4660, "endpoints": { "max_count": 4 } },
                "configuration": { "interfaces": [] }
            }"#,
        )
        .unwrap();
        let device = config.device().unwrap();
        assert_eq!(device.vid, 0x1209);
        assert_eq!(device.pid, 4660);
        assert_eq!(device.bcd_device, "1.00");
        assert_eq!(device.max_power, 100);
        assert_eq!(device.max_packet_size0, 8);
        assert_eq!(device.speed, Speed::Full);
        assert_eq!(device.endpoints.max_count, 4);
        assert_eq!(device.endpoints.buffer_size, 64);
        assert!(matches!(config.interfaces(), Err(ValidationError::MissingInterfaces)));
    }

    #[test]
    fn missing_sections_load_as_absent() {
        let config = load_str("{}").unwrap();
        assert!(matches!(config.device(), Err(ValidationError::MissingDevice)));
        assert!(matches!(config.interfaces(), Err(ValidationError::MissingInterfaces)));
    }

    #[test]
    fn out_of_range_byte_is_rejected() {
        let result = load_str(r#"{ "device": { "class": 256 } }"#);
        assert!(result.is_err());
    }

    #[test]
    fn cdc_interface_with_functional_descriptors() {
        let config = load_str(
            r#"{
                "configuration": { "interfaces": [ {
                    "class": "cdc",
                    "priority": 1,
                    "communication": {
                        "interface_number": "auto",
                        "string": "Serial Control",
                        "endpoints": [ { "direction": "in", "type": "interrupt", "max_packet_size": 8, "interval": 10 } ],
                        "functional_descriptors": [
                            { "type": "header" },
                            { "type": "call_management", "data_interface": "auto" },
                            { "type": "acm", "capabilities": "0x02" },
                            { "type": "union", "master_interface": 0, "slave_interface": "auto" }
                        ]
                    },
                    "data": {
                        "interface_number": 1,
                        "string": "Serial Data",
                        "endpoints": [
                            { "direction": "out", "type": "bulk" },
                            { "direction": "in", "type": "bulk", "buffer_size": 128 }
                        ]
                    }
                } ] }
            }"#,
        )
        .unwrap();
        let interfaces = config.interfaces().unwrap();
        let Interface::Cdc(cdc) = &interfaces[0] else { panic!("expected a CDC interface") };
        assert_eq!(cdc.priority, 1);
        let comm = cdc.communication.as_ref().unwrap();
        assert_eq!(comm.interface_number, InterfaceNumber::Auto);
        assert_eq!(comm.acm_capabilities(), Some(0x02));
        assert_eq!(comm.call_management(), Some((0, InterfaceNumber::Auto)));
        assert_eq!(comm.union(), Some((InterfaceNumber::Fixed(0), InterfaceNumber::Auto)));
        assert_eq!((comm.class, comm.subclass, comm.protocol), (0x02, 0x02, 0x01));
        let data = cdc.data.as_ref().unwrap();
        assert_eq!(data.interface_number, InterfaceNumber::Fixed(1));
        assert_eq!(data.endpoints[0].max_packet_size, 64);
        assert_eq!(data.endpoints[1].buffer_size, Some(128));
    }

    #[test]
    fn unknown_transfer_type_is_bulk() {
        let config = load_str(
            r#"{ "configuration": { "interfaces": [ {
                "class": "custom",
                "endpoints": [
                    { "direction": "out", "type": "isochronous" },
                    { "direction": "in", "type": "interrupt" }
                ]
            } ] } }"#,
        )
        .unwrap();
        let Interface::Custom(custom) = &config.interfaces().unwrap()[0] else {
            panic!("expected a custom interface")
        };
        assert_eq!(custom.endpoints[0].transfer, TransferType::Bulk);
        assert_eq!(custom.endpoints[1].transfer, TransferType::Interrupt);
        assert_eq!(custom.priority, DEFAULT_PRIORITY);
        assert_eq!(custom.class_code, 0xFF);
        assert_eq!(custom.interface_number, InterfaceNumber::Auto);
    }

    #[test]
    fn leading_zero_octal_zero_loads() {
        let config = load_str(r#"{ "device": { "subclass": "00", "protocol": "010" } }"#).unwrap();
        let device = config.device().unwrap();
        assert_eq!(device.subclass, 0);
        assert_eq!(device.protocol, 8);
    }

    #[test]
    fn unrecognised_speed_loads() {
        let config = load_str(r#"{ "device": { "speed": "super", "max_packet_size0": 128 } }"#).unwrap();
        assert_eq!(config.device().unwrap().speed, Speed::Other);
        let config = load_str(r#"{ "device": { "speed": "high" } }"#).unwrap();
        assert_eq!(config.device().unwrap().speed, Speed::High);
    }

    #[test]
    fn radix_strings_everywhere() {
        let config = load_str(
            r#"{ "configuration": { "interfaces": [ {
                "class": "custom",
                "priority": "0x10",
                "endpoints": [
                    { "direction": "out", "buffer_size": "0x200" },
                    { "direction": "in", "buffer_size": 256 }
                ]
            } ] } }"#,
        )
        .unwrap();
        let Interface::Custom(custom) = &config.interfaces().unwrap()[0] else {
            panic!("expected a custom interface")
        };
        assert_eq!(custom.priority, 16);
        assert_eq!(custom.endpoints[0].buffer_size, Some(0x200));
        assert_eq!(custom.endpoints[1].buffer_size, Some(256));
        assert!(load_str(r#"{ "configuration": { "interfaces": [ { "class": "custom",
            "endpoints": [ { "direction": "in", "buffer_size": "0x10000" } ] } ] } }"#)
        .is_err());
    }

    #[test]
    fn yaml_documents() {
        let config = load_yaml_str(
            r#"
device:
  vid: "0x1209"
  pid: 1
  subclass: "00"
  endpoints:
    max_count: 4
configuration:
  interfaces:
    - class: custom
      interface_number: auto
      string: Vendor
      endpoints:
        - { direction: out, type: bulk, buffer_size: "0x200" }
        - { direction: in, type: interrupt, interval: 4 }
"#,
        )
        .unwrap();
        let device = config.device().unwrap();
        assert_eq!(device.vid, 0x1209);
        assert_eq!(device.pid, 1);
        assert_eq!(device.endpoints.max_count, 4);
        let Interface::Custom(custom) = &config.interfaces().unwrap()[0] else {
            panic!("expected a custom interface")
        };
        assert_eq!(custom.interface_number, InterfaceNumber::Auto);
        assert_eq!(custom.endpoints[0].buffer_size, Some(0x200));
        assert_eq!(custom.endpoints[1].transfer, TransferType::Interrupt);
        assert_eq!(custom.endpoints[1].interval, 4);
    }

    #[test]
    fn format_selection() {
        assert_eq!(Format::from_path("usb_desc.yaml"), Format::Yaml);
        assert_eq!(Format::from_path("board/usb_desc.YML"), Format::Yaml);
        assert_eq!(Format::from_path("usb_desc.json"), Format::Json);
        assert_eq!(Format::from_path("usb_desc"), Format::Json);
        assert_eq!("yaml".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("JSON".parse::<Format>().unwrap(), Format::Json);
        assert!("toml".parse::<Format>().is_err());
    }

    #[test]
    fn configuration_attributes() {
        let mut configuration = Configuration::default();
        assert_eq!(configuration.attributes_byte(), 0x80);
        configuration.attributes = PowerSource::SelfPowered;
        assert_eq!(configuration.attributes_byte(), 0xC0);
        configuration.remote_wakeup = true;
        assert_eq!(configuration.attributes_byte(), 0xE0);
    }
}
