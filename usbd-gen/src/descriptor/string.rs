use super::{Descriptor, STRING};
use crate::error::ValidationError;
use crate::table::Table;

/// English (United States)
pub const LANGID_US_ENGLISH: u16 = 0x0409;

/// String descriptor zero: the list of supported language IDs.
pub struct LanguageDescriptor;

impl LanguageDescriptor {
    pub const LENGTH: usize = 4;
}

impl Descriptor for LanguageDescriptor {
    fn name(&self) -> String { "Language ID String Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (4 bytes)");
        written += out.byte(STRING, "bDescriptorType: String");
        written += out.word(LANGID_US_ENGLISH, "wLANGID: English (United States)");
        Ok(written)
    }
}

/// Encode `value` as UTF-16 code units, without the terminator. Only
/// characters that fit in a single unit are accepted.
pub fn utf16_units(value: &str) -> Result<Vec<u16>, ValidationError> {
    let units: Vec<u16> = value.encode_utf16().collect();
    if units.len() != value.chars().count() {
        return Err(ValidationError::UnencodableString(value.to_owned()));
    }
    Ok(units)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::emit;

    #[test]
    fn language_table() {
        let mut out = Table::new();
        emit(&LanguageDescriptor, &mut out).unwrap();
        assert_eq!(out.bytes(), vec![0x04, 0x03, 0x09, 0x04]);
    }

    #[test]
    fn only_single_unit_characters() {
        assert_eq!(utf16_units("Aé"), Ok(vec![0x41, 0xE9]));
        assert_eq!(utf16_units(""), Ok(vec![]));
        assert_eq!(utf16_units("a\u{1F600}"), Err(ValidationError::UnencodableString("a\u{1F600}".to_owned())));
    }
}
