use crate::config::{Device, Interface};

pub const MANUFACTURER_INDEX: u8 = 1;
pub const PRODUCT_INDEX: u8 = 2;
pub const SERIAL_INDEX: u8 = 3;

/// String descriptor indices. Index 0 is the language table; 1-3 are always
/// manufacturer, product and serial; interface labels follow in declaration
/// order. A label that is already present reuses the existing index.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StringTable {
    /// `entries[n]` holds string index `n + 1`
    entries: Vec<String>,
}

impl StringTable {
    pub fn derive(device: &Device, interfaces: &[Interface]) -> StringTable {
        let mut table = StringTable {
            entries: vec![device.manufacturer.clone(), device.product.clone(), device.serial.clone()],
        };
        for interface in interfaces {
            match interface {
                Interface::Cdc(cdc) => {
                    if let Some(comm) = &cdc.communication {
                        table.intern(&comm.string);
                    }
                    if let Some(data) = &cdc.data {
                        table.intern(&data.string);
                    }
                }
                Interface::Custom(custom) => {
                    table.intern(&custom.string);
                }
            }
        }
        table
    }

    fn intern(&mut self, value: &str) {
        if value.is_empty() || self.entries.iter().any(|s| s == value) {
            return;
        }
        self.entries.push(value.to_owned());
    }

    /// The `iInterface` value for a label; empty labels get no string.
    pub fn index_of(&self, value: &str) -> u8 {
        if value.is_empty() {
            return 0;
        }
        self.entries.iter().position(|s| s == value).map(|p| (p + 1) as u8).unwrap_or(0)
    }

    /// Number of string descriptors after the language table.
    pub fn len(&self) -> usize { self.entries.len() }

    pub fn is_empty(&self) -> bool { self.entries.is_empty() }

    pub fn iter(&self) -> impl Iterator<Item = (u8, &str)> {
        self.entries.iter().enumerate().map(|(i, s)| ((i + 1) as u8, s.as_str()))
    }
}
