use crate::config::{InterfaceClass, SubRole};

/// Everything that can stop the generator. There is no recoverable class:
/// any of these aborts the run before either artifact is produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    MissingDevice,
    MissingInterfaces,
    InvalidEndpointPool(u8),
    ControlPacketTooLarge(u8),
    PowerOutOfRange(u16),
    MissingCdcSection { interface: usize, role: SubRole },
    CdcEndpointCount { interface: usize, role: SubRole, expected: usize, found: usize },
    CustomEndpointCount { interface: usize, found: usize },
    TooManyEndpoints { needed: usize, available: u8 },
    EndpointExhausted { interface: usize, class: InterfaceClass },
    DuplicateInterfaceNumber { interface: usize, number: u8 },
    MissingFunctionalDescriptor { interface: usize, kind: &'static str },
    UnassignedEndpoint { interface: usize, role: Option<SubRole>, index: usize },
    UnassignedInterface { interface: usize, role: Option<SubRole> },
    BufferTooSmall { endpoint: u8, buffer_size: u16, max_packet_size: u16 },
    InvalidBcdVersion(String),
    InvalidGuid(String),
    UnencodableString(String),
    LengthMismatch { descriptor: String, advertised: usize, written: usize },
    WriteError,
}

fn role_suffix(role: &Option<SubRole>) -> String {
    match role {
        Some(role) => format!(" {}", role),
        None => String::new(),
    }
}

impl core::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        use ValidationError::*;
        match self {
            MissingDevice => write!(f, "missing 'device' section"),
            MissingInterfaces => write!(f, "missing 'interfaces' section in configuration"),
            InvalidEndpointPool(count) => {
                write!(f, "invalid 'max_count' ({}) in device.endpoints, must be between 1 and 15", count)
            }
            ControlPacketTooLarge(size) => {
                write!(f, "control endpoint max_packet_size0 ({}) must be <= 64 for Full Speed", size)
            }
            PowerOutOfRange(ma) => write!(f, "max_power ({} mA) does not fit bMaxPower, must be <= 510", ma),
            MissingCdcSection { interface, role } => {
                write!(f, "CDC interface #{} is missing its '{}' section", interface, role)
            }
            CdcEndpointCount { interface, role, expected, found } => write!(
                f,
                "CDC {} interface of interface #{} must have exactly {} endpoint(s), found {}",
                role, interface, expected, found
            ),
            CustomEndpointCount { interface, found } => {
                write!(f, "custom interface #{} must have exactly 2 endpoints, found {}", interface, found)
            }
            TooManyEndpoints { needed, available } => {
                write!(f, "too many endpoints ({}) for max_count ({})", needed, available)
            }
            EndpointExhausted { interface, class } => {
                write!(f, "no available endpoint for {} interface #{}", class, interface)
            }
            DuplicateInterfaceNumber { interface, number } => {
                write!(f, "interface number {} of interface #{} is already in use", number, interface)
            }
            MissingFunctionalDescriptor { interface, kind } => {
                write!(f, "CDC interface #{} has no '{}' functional descriptor", interface, kind)
            }
            UnassignedEndpoint { interface, role, index } => write!(
                f,
                "endpoint {} of interface #{}{} has no endpoint number assigned",
                index,
                interface,
                role_suffix(role)
            ),
            UnassignedInterface { interface, role } => {
                write!(f, "interface #{}{} has no interface number assigned", interface, role_suffix(role))
            }
            BufferTooSmall { endpoint, buffer_size, max_packet_size } => write!(
                f,
                "buffer size ({}) too small for endpoint {} (max_packet_size: {})",
                buffer_size, endpoint, max_packet_size
            ),
            InvalidBcdVersion(version) => write!(f, "unable to parse bcd_device \"{}\"", version),
            InvalidGuid(guid) => write!(f, "malformed ms_os guid \"{}\"", guid),
            UnencodableString(s) => {
                write!(f, "string \"{}\" contains characters that need a UTF-16 surrogate pair", s)
            }
            LengthMismatch { descriptor, advertised, written } => write!(
                f,
                "{} advertised it would write {} bytes, but it wrote {} bytes",
                descriptor, advertised, written
            ),
            WriteError => write!(f, "unable to write generated output"),
        }
    }
}

impl std::error::Error for ValidationError {}

impl From<core::fmt::Error> for ValidationError {
    fn from(_: core::fmt::Error) -> Self { ValidationError::WriteError }
}

/// Failure to read the device description.
#[derive(Debug)]
pub enum ConfigError {
    UnknownFormat(String),
    Json(serde_json::Error),
    Yaml(serde_yaml::Error),
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter) -> core::fmt::Result {
        match self {
            ConfigError::UnknownFormat(format) => write!(f, "unknown input format \"{}\" (expected json or yaml)", format),
            ConfigError::Json(e) => write!(f, "invalid JSON: {}", e),
            ConfigError::Yaml(e) => write!(f, "invalid YAML: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::UnknownFormat(_) => None,
            ConfigError::Json(e) => Some(e),
            ConfigError::Yaml(e) => Some(e),
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(e: serde_json::Error) -> Self { ConfigError::Json(e) }
}

impl From<serde_yaml::Error> for ConfigError {
    fn from(e: serde_yaml::Error) -> Self { ConfigError::Yaml(e) }
}
