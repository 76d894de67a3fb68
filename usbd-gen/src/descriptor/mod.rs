pub mod cdc;
pub mod custom;
pub mod msos;
pub mod standard;
pub mod string;

use crate::allocate::Allocation;
use crate::config::Interface;
use crate::error::ValidationError;
use crate::strings::StringTable;
use crate::table::Table;

pub const DEVICE: u8 = 0x01;
pub const CONFIGURATION: u8 = 0x02;
pub const STRING: u8 = 0x03;
pub const INTERFACE: u8 = 0x04;
pub const ENDPOINT: u8 = 0x05;
pub const CS_INTERFACE: u8 = 0x24;

pub trait Descriptor {
    /// Label used in generated comments and in error messages
    fn name(&self) -> String;

    /// The total size of this descriptor, including anything nested in it.
    fn length(&self) -> usize;

    /// Append the contents of this descriptor to `out`.
    /// Return the number of bytes written.
    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError>;
}

/// Serialize `descriptor` into `out`, refusing to emit it if it wrote a
/// different number of bytes than it advertised.
pub fn emit(descriptor: &dyn Descriptor, out: &mut Table) -> Result<usize, ValidationError> {
    let advertised = descriptor.length();
    let mut data = Table::new();
    let written = descriptor.serialize(&mut data)?;
    if advertised != written || data.len() != written {
        return Err(ValidationError::LengthMismatch {
            descriptor: descriptor.name(),
            advertised,
            written: data.len(),
        });
    }
    out.append(data);
    Ok(written)
}

/// Bytes a single interface entry contributes to the configuration
/// descriptor.
pub fn function_length(interface: &Interface) -> usize {
    match interface {
        Interface::Cdc(_) => cdc::CdcFunction::LENGTH,
        Interface::Custom(_) => custom::CustomFunction::LENGTH,
    }
}

/// Build the descriptor block for the interface declared at `index`.
pub fn function_block<'a>(
    index: usize,
    interface: &'a Interface,
    allocation: &Allocation,
    strings: &StringTable,
) -> Result<Box<dyn Descriptor + 'a>, ValidationError> {
    Ok(match interface {
        Interface::Cdc(cdc) => Box::new(cdc::CdcFunction::new(index, cdc, allocation, strings)?),
        Interface::Custom(custom) => Box::new(custom::CustomFunction::new(index, custom, allocation, strings)?),
    })
}

fn class_name(class: u8) -> &'static str {
    match class {
        0x00 => "Defined by interface",
        0x02 => "Communications (CDC)",
        0x0A => "CDC Data",
        0xEF => "Miscellaneous",
        0xFF => "Vendor-specific",
        _ => "Class",
    }
}
