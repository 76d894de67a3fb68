use std::fmt;

use log::warn;

use super::{Descriptor, STRING};
use crate::allocate::Allocation;
use crate::config::Interface;
use crate::error::ValidationError;
use crate::table::Table;

/// `bMS_VendorCode` the host uses to request the feature descriptors.
pub const MS_VENDOR_CODE: u8 = 0x01;

/// `wIndex` of the Extended Compat ID request.
const EXTENDED_COMPAT_ID: u16 = 0x0004;

/// A GUID held in the mixed-endian order the Windows registry uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Guid([u8; 16]);

impl Guid {
    /// Parse `12345678-1234-5678-AABB-CCDDEEFF0011`, with or without braces.
    /// Data1, Data2 and Data3 are stored little-endian; the eight Data4 bytes
    /// are kept in the order written.
    pub fn parse(text: &str) -> Result<Guid, ValidationError> {
        let invalid = || ValidationError::InvalidGuid(text.to_owned());
        let trimmed = text.trim();
        let trimmed = trimmed.strip_prefix('{').unwrap_or(trimmed);
        let trimmed = trimmed.strip_suffix('}').unwrap_or(trimmed);

        let groups: Vec<&str> = trimmed.split('-').collect();
        let widths: Vec<usize> = groups.iter().map(|g| g.len()).collect();
        if widths != [8, 4, 4, 4, 12] || !groups.iter().all(|g| g.chars().all(|c| c.is_ascii_hexdigit())) {
            return Err(invalid());
        }

        let hex = groups.concat();
        let mut bytes = [0u8; 16];
        for (i, byte) in bytes.iter_mut().enumerate() {
            *byte = u8::from_str_radix(&hex[i * 2..i * 2 + 2], 16).map_err(|_| invalid())?;
        }
        bytes[0..4].reverse();
        bytes[4..6].reverse();
        bytes[6..8].reverse();
        Ok(Guid(bytes))
    }

    pub fn bytes(&self) -> &[u8; 16] { &self.0 }
}

impl fmt::Display for Guid {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let b = &self.0;
        write!(
            f,
            "{{{:02X}{:02X}{:02X}{:02X}-{:02X}{:02X}-{:02X}{:02X}-",
            b[3], b[2], b[1], b[0], b[5], b[4], b[7], b[6]
        )?;
        write!(f, "{:02X}{:02X}-", b[8], b[9])?;
        for byte in &b[10..] {
            write!(f, "{:02X}", byte)?;
        }
        write!(f, "}}")
    }
}

/// The "MSFT100" string descriptor (string index 0xEE).
pub struct MsOsStringDescriptor;

impl MsOsStringDescriptor {
    pub const LENGTH: usize = 18;
}

impl Descriptor for MsOsStringDescriptor {
    fn name(&self) -> String { "Microsoft OS String Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let signature: Vec<u8> = "MSFT100".encode_utf16().flat_map(|u| u.to_le_bytes()).collect();
        let mut written = 0;
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (18 bytes)");
        written += out.byte(STRING, "bDescriptorType: String");
        written += out.field(&signature, "qwSignature: MSFT100");
        written += out.byte(MS_VENDOR_CODE, "bMS_VendorCode: Vendor code for MS OS descriptors");
        written += out.byte(0, "bPad: Padding");
        Ok(written)
    }
}

/// The interface WinUSB binds to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WinUsbFunction {
    pub first_interface: u8,
    pub label: String,
    pub guid: Option<Guid>,
}

impl WinUsbFunction {
    /// Pick the interface to advertise: the first Custom interface with an
    /// `ms_os` section, else the first Custom interface at all.
    pub fn select(interfaces: &[Interface], allocation: &Allocation) -> Result<Option<WinUsbFunction>, ValidationError> {
        let customs: Vec<_> = interfaces
            .iter()
            .enumerate()
            .filter_map(|(index, interface)| match interface {
                Interface::Custom(custom) => Some((index, custom)),
                _ => None,
            })
            .collect();

        let (index, custom) = match customs.iter().find(|(_, custom)| custom.ms_os.is_some()) {
            Some(declared) => *declared,
            None => match customs.first() {
                Some(first) => {
                    warn!(
                        "no custom interface declares ms_os; advertising WinUSB for interface #{} ({})",
                        first.0, first.1.string
                    );
                    *first
                }
                None => {
                    warn!("no custom interface to advertise WinUSB for; Extended Compat ID has no functions");
                    return Ok(None);
                }
            },
        };

        let first_interface = allocation
            .interface_number(index, None)
            .ok_or(ValidationError::UnassignedInterface { interface: index, role: None })?;
        let guid = custom.ms_os.as_ref().map(|ms_os| Guid::parse(&ms_os.guid)).transpose()?;
        Ok(Some(WinUsbFunction { first_interface, label: custom.string.clone(), guid }))
    }
}

/// Extended Compat ID feature descriptor, optionally followed by the
/// interface GUID.
pub struct ExtendedCompatId {
    pub function: Option<WinUsbFunction>,
}

impl ExtendedCompatId {
    pub const HEADER_LENGTH: usize = 16;
    pub const FUNCTION_LENGTH: usize = 24;
    pub const GUID_LENGTH: usize = 16;
}

impl Descriptor for ExtendedCompatId {
    fn name(&self) -> String { "Extended Compat ID Descriptor".to_owned() }

    fn length(&self) -> usize {
        match &self.function {
            None => Self::HEADER_LENGTH,
            Some(function) => {
                Self::HEADER_LENGTH
                    + Self::FUNCTION_LENGTH
                    + if function.guid.is_some() { Self::GUID_LENGTH } else { 0 }
            }
        }
    }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let length = self.length();
        let count = if self.function.is_some() { 1 } else { 0 };
        let mut written = 0;
        out.heading(self.name());
        written += out.dword(length as u32, format!("dwLength: Size of descriptor ({} bytes)", length));
        written += out.word(0x0100, "bcdVersion: Version (1.0)");
        written += out.word(EXTENDED_COMPAT_ID, "wIndex: Extended Compat ID descriptor");
        written += out.byte(count, format!("bCount: Number of function sections ({})", count));
        written += out.field(&[0; 7], "Reserved");

        if let Some(function) = &self.function {
            out.heading(format!("Function Section for {}", function.label));
            written += out.byte(
                function.first_interface,
                format!("bFirstInterfaceNumber: Interface {}", function.first_interface),
            );
            written += out.byte(0x01, "Reserved");
            written += out.field(b"WINUSB\0\0", "CompatibleID: WinUSB");
            written += out.field(&[0; 8], "SubCompatibleID: None");
            written += out.field(&[0; 6], "Reserved");
            if let Some(guid) = &function.guid {
                written += out.field(guid.bytes(), format!("GUID: {}", guid));
            }
        }
        Ok(written)
    }
}
