use std::collections::BTreeSet;
use std::fmt::Write;

use convert_case::{Case, Casing};
use log::{debug, info};

use crate::allocate::{allocate, Allocation, EndpointKey};
use crate::config::{Endpoint, Interface, SubRole, UsbConfig};
use crate::descriptor::msos::{ExtendedCompatId, MsOsStringDescriptor, WinUsbFunction};
use crate::descriptor::standard::{ConfigurationDescriptor, DeviceDescriptor};
use crate::descriptor::string::{utf16_units, LanguageDescriptor};
use crate::descriptor::{emit, Descriptor};
use crate::error::ValidationError;
use crate::strings::{StringTable, MANUFACTURER_INDEX, PRODUCT_INDEX, SERIAL_INDEX};
use crate::table::{comment_text, Table};

/// Name the implementation body uses to include the header.
pub const HEADER_NAME: &str = "usb_desc.h";

/// The two generated text files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifacts {
    /// C implementation body, normally `usb_desc.c`
    pub source: String,
    /// C header declaring everything in `source`
    pub header: String,
}

struct StringArray {
    index: u8,
    label: String,
    units: Vec<u16>,
}

struct EndpointBuffer<'a> {
    number: u8,
    address: u8,
    size: u16,
    endpoint: &'a Endpoint,
}

/// Everything the two artifacts are printed from. Both are rendered from the
/// same instance so the header can never disagree with the body.
struct Output<'a> {
    header_name: &'a str,
    device: Table,
    configuration: Table,
    msos: Table,
    feature: Table,
    language: Table,
    strings: Vec<StringArray>,
    buffers: Vec<EndpointBuffer<'a>>,
    interfaces: Vec<(String, u8)>,
}

fn declared_endpoint<'a>(interfaces: &'a [Interface], key: &EndpointKey) -> Option<&'a Endpoint> {
    match (interfaces.get(key.interface)?, key.role) {
        (Interface::Cdc(cdc), Some(SubRole::Communication)) => cdc.communication.as_ref()?.endpoints.get(key.index),
        (Interface::Cdc(cdc), Some(SubRole::Data)) => cdc.data.as_ref()?.endpoints.get(key.index),
        (Interface::Custom(custom), None) => custom.endpoints.get(key.index),
        _ => None,
    }
}

fn interface_label(interface: &Interface, role: Option<SubRole>) -> &str {
    match (interface, role) {
        (Interface::Cdc(cdc), Some(SubRole::Communication)) => {
            cdc.communication.as_ref().map(|c| c.string.as_str()).unwrap_or("")
        }
        (Interface::Cdc(cdc), Some(SubRole::Data)) => cdc.data.as_ref().map(|d| d.string.as_str()).unwrap_or(""),
        (Interface::Custom(custom), _) => custom.string.as_str(),
        _ => "",
    }
}

/// C identifier suffix for an interface, derived from its label.
fn define_name(label: &str, fallback: String, taken: &mut BTreeSet<String>) -> String {
    let name: String = label
        .to_case(Case::UpperSnake)
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect();
    let name = name.trim_matches('_').to_owned();
    let mut name = if name.is_empty() { fallback } else { name };
    if name.starts_with(|c: char| c.is_ascii_digit()) {
        name.insert(0, '_');
    }
    let mut unique = name.clone();
    let mut suffix = 2;
    while taken.contains(&unique) {
        unique = format!("{}_{}", name, suffix);
        suffix += 1;
    }
    taken.insert(unique.clone());
    unique
}

fn serialize(descriptor: &dyn Descriptor) -> Result<Table, ValidationError> {
    let mut table = Table::new();
    emit(descriptor, &mut table)?;
    debug!("{}: {} bytes", descriptor.name(), table.len());
    Ok(table)
}

impl<'a> Output<'a> {
    fn build(config: &'a UsbConfig, allocation: &Allocation, header_name: &'a str) -> Result<Self, ValidationError> {
        let device = config.device()?;
        let configuration = config.configuration()?;
        let interfaces = &configuration.interfaces;
        let table = StringTable::derive(device, interfaces);

        let device_table = serialize(&DeviceDescriptor::new(device)?)?;
        let configuration_table =
            serialize(&ConfigurationDescriptor::new(configuration, device, allocation, &table)?)?;
        let msos = serialize(&MsOsStringDescriptor)?;
        let feature = serialize(&ExtendedCompatId { function: WinUsbFunction::select(interfaces, allocation)? })?;
        let language = serialize(&LanguageDescriptor)?;

        let strings = table
            .iter()
            .map(|(index, value)| {
                let label = match index {
                    MANUFACTURER_INDEX => format!("Manufacturer: {}", value),
                    PRODUCT_INDEX => format!("Product: {}", value),
                    SERIAL_INDEX => format!("Serial Number: {}", value),
                    _ => value.to_owned(),
                };
                Ok(StringArray { index, label, units: utf16_units(value)? })
            })
            .collect::<Result<Vec<_>, ValidationError>>()?;

        let mut buffers = vec![];
        for assignment in &allocation.endpoints {
            let key = &assignment.key;
            let endpoint = declared_endpoint(interfaces, key).ok_or(ValidationError::UnassignedEndpoint {
                interface: key.interface,
                role: key.role,
                index: key.index,
            })?;
            let size = endpoint.buffer_size.unwrap_or(device.endpoints.buffer_size);
            if size < endpoint.max_packet_size {
                return Err(ValidationError::BufferTooSmall {
                    endpoint: assignment.number,
                    buffer_size: size,
                    max_packet_size: endpoint.max_packet_size,
                });
            }
            buffers.push(EndpointBuffer {
                number: assignment.number,
                address: assignment.number | endpoint.direction.mask(),
                size,
                endpoint,
            });
        }

        let mut taken = BTreeSet::new();
        let interfaces = allocation
            .interfaces
            .iter()
            .filter_map(|slot| {
                let interface = interfaces.get(slot.interface)?;
                let fallback = match slot.role {
                    Some(role) => format!("{}{}_{}", slot.class, slot.interface, role),
                    None => format!("{}{}", slot.class, slot.interface),
                }
                .to_case(Case::UpperSnake);
                Some((define_name(interface_label(interface, slot.role), fallback, &mut taken), slot.number))
            })
            .collect();

        Ok(Output {
            header_name,
            device: device_table,
            configuration: configuration_table,
            msos,
            feature,
            language,
            strings,
            buffers,
            interfaces,
        })
    }
}

fn print_array<U: Write>(name: &str, table: &Table, out: &mut U) -> std::fmt::Result {
    writeln!(out, "const uint8_t {}[] = {{", name)?;
    table.render(out)?;
    writeln!(out, "}};")
}

fn print_descriptors<U: Write>(output: &Output, out: &mut U) -> std::fmt::Result {
    writeln!(out, "// Generated by usbd-gen {}. Do not edit.", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "#include \"{}\"", output.header_name)?;
    writeln!(out)?;
    writeln!(out, "// Device Descriptor")?;
    print_array("usbd_device_descriptor", &output.device, out)?;
    writeln!(out)?;
    print_array("usbd_config_descriptor", &output.configuration, out)?;
    writeln!(out)?;
    writeln!(out, "// Microsoft OS Descriptors")?;
    print_array("usbd_msos_descriptor", &output.msos, out)?;
    writeln!(out)?;
    print_array("usbd_msos_feature_descriptor", &output.feature, out)?;
    writeln!(out)
}

fn print_strings<U: Write>(output: &Output, out: &mut U) -> std::fmt::Result {
    writeln!(out, "// String Descriptors")?;
    print_array("usbd_string0", &output.language, out)?;
    for string in &output.strings {
        let units = string
            .units
            .iter()
            .chain(std::iter::once(&0))
            .map(|u| format!("0x{:04X}", u))
            .collect::<Vec<_>>()
            .join(", ");
        writeln!(out, "// {}", comment_text(&string.label))?;
        writeln!(out, "const uint16_t usbd_string{}[] = {{ {} }};", string.index, units)?;
    }
    writeln!(out)
}

fn print_buffers<U: Write>(output: &Output, out: &mut U) -> std::fmt::Result {
    writeln!(out, "// Endpoint Buffer Configuration")?;
    for buffer in &output.buffers {
        writeln!(
            out,
            "// Endpoint {} ({} {}) Buffer Size: {} bytes",
            buffer.number, buffer.endpoint.transfer, buffer.endpoint.direction, buffer.size
        )?;
        writeln!(out, "uint8_t ep{}_buffer[{}] __attribute__((aligned(4)));", buffer.number, buffer.size)?;
    }
    Ok(())
}

fn print_define<U: Write>(name: &str, value: &str, out: &mut U) -> std::fmt::Result {
    writeln!(out, "#define {:<40} {}", name, value)
}

/// Include guard for a header file name: `usb_desc.h` becomes `__USB_DESC_H__`.
fn include_guard(header_name: &str) -> String {
    let name: String = header_name.chars().map(|c| if c.is_ascii_alphanumeric() { c } else { '_' }).collect();
    match name.to_case(Case::UpperSnake) {
        guard if guard.trim_matches('_').is_empty() => "__USB_DESC_H__".to_string(),
        guard => format!("__{}__", guard.trim_matches('_')),
    }
}

fn print_header<U: Write>(output: &Output, out: &mut U) -> std::fmt::Result {
    let guard = include_guard(output.header_name);
    writeln!(out, "// Generated by usbd-gen {}. Do not edit.", env!("CARGO_PKG_VERSION"))?;
    writeln!(out, "#ifndef {}", guard)?;
    writeln!(out, "#define {}", guard)?;
    writeln!(out)?;
    writeln!(out, "#include <stdint.h>")?;
    writeln!(out)?;

    print_define("USBD_DEVICE_DESCRIPTOR_SIZE", &output.device.len().to_string(), out)?;
    print_define("USBD_CONFIG_DESCRIPTOR_SIZE", &output.configuration.len().to_string(), out)?;
    print_define("USBD_MSOS_DESCRIPTOR_SIZE", &output.msos.len().to_string(), out)?;
    print_define("USBD_MSOS_FEATURE_DESCRIPTOR_SIZE", &output.feature.len().to_string(), out)?;
    print_define("USBD_STRING_COUNT", &(output.strings.len() + 1).to_string(), out)?;
    writeln!(out)?;
    for (name, number) in &output.interfaces {
        print_define(&format!("USBD_ITF_{}", name), &number.to_string(), out)?;
    }
    for buffer in &output.buffers {
        print_define(&format!("USBD_EP{}_ADDR", buffer.number), &format!("0x{:02X}", buffer.address), out)?;
    }
    writeln!(out)?;

    writeln!(out, "extern const uint8_t usbd_device_descriptor[];")?;
    writeln!(out, "extern const uint8_t usbd_config_descriptor[];")?;
    writeln!(out, "extern const uint8_t usbd_msos_descriptor[];")?;
    writeln!(out, "extern const uint8_t usbd_msos_feature_descriptor[];")?;
    writeln!(out, "extern const uint8_t usbd_string0[];")?;
    for string in &output.strings {
        writeln!(out, "extern const uint16_t usbd_string{}[];", string.index)?;
    }
    for buffer in &output.buffers {
        writeln!(out, "extern uint8_t ep{}_buffer[];", buffer.number)?;
    }
    writeln!(out)?;
    writeln!(out, "#endif // {}", guard)
}

/// Render both artifacts from an existing allocation. `header_name` is what
/// the body `#include`s.
pub fn emit_artifacts(
    config: &UsbConfig,
    allocation: &Allocation,
    header_name: &str,
) -> Result<Artifacts, ValidationError> {
    let output = Output::build(config, allocation, header_name)?;

    let mut source = String::new();
    print_descriptors(&output, &mut source).or(Err(ValidationError::WriteError))?;
    print_strings(&output, &mut source).or(Err(ValidationError::WriteError))?;
    print_buffers(&output, &mut source).or(Err(ValidationError::WriteError))?;

    let mut header = String::new();
    print_header(&output, &mut header).or(Err(ValidationError::WriteError))?;

    info!(
        "generated {}-byte configuration descriptor, {} string(s), {} endpoint buffer(s)",
        output.configuration.len(),
        output.strings.len() + 1,
        output.buffers.len()
    );
    Ok(Artifacts { source, header })
}

/// Allocate and emit in one go. Either both artifacts are produced or an
/// error is returned.
pub fn generate(config: &UsbConfig) -> Result<Artifacts, ValidationError> {
    let allocation = allocate(config)?;
    emit_artifacts(config, &allocation, HEADER_NAME)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::load_str;

    const CDC: &str = r#"{
        "class": "cdc",
        "communication": {
            "string": "CDC Control",
            "endpoints": [ { "direction": "in", "type": "interrupt", "max_packet_size": 8, "interval": 10 } ],
            "functional_descriptors": [
                { "type": "header" },
                { "type": "call_management" },
                { "type": "acm", "capabilities": 2 },
                { "type": "union" }
            ]
        },
        "data": {
            "string": "CDC Data",
            "endpoints": [ { "direction": "out", "type": "bulk" }, { "direction": "in", "type": "bulk" } ]
        }
    }"#;

    const CUSTOM: &str = r#"{
        "class": "custom",
        "string": "CMSIS-DAP v2",
        "ms_os": { "guid": "{CDB3B5AD-293B-4663-AA36-1AAE46463776}" },
        "endpoints": [ { "direction": "out", "type": "bulk" }, { "direction": "in", "type": "bulk" } ]
    }"#;

    fn document(max_count: u8, interfaces: &[&str]) -> UsbConfig {
        load_str(&format!(
            r#"{{ "device": {{ "vid": "0x1209", "pid": "0x0001", "manufacturer": "Acme", "product": "Adapter",
                   "serial": "0001", "endpoints": {{ "max_count": {}, "buffer_size": 64 }} }},
                 "configuration": {{ "interfaces": [ {} ] }} }}"#,
            max_count,
            interfaces.join(",")
        ))
        .unwrap()
    }

    fn config_total(config: &UsbConfig) -> (usize, usize) {
        let allocation = allocate(config).unwrap();
        let output = Output::build(config, &allocation, HEADER_NAME).unwrap();
        let bytes = output.configuration.bytes();
        (u16::from_le_bytes([bytes[2], bytes[3]]) as usize, bytes.len())
    }

    #[test]
    fn total_length_matches_emitted_bytes() {
        for (interfaces, expected) in [
            (vec![CDC], 9 + 58),
            (vec![CUSTOM], 9 + 23),
            (vec![CDC, CUSTOM], 9 + 58 + 23),
            (vec![CUSTOM, CDC, CUSTOM], 9 + 23 + 58 + 23),
        ] {
            let config = document(15, &interfaces);
            assert_eq!(config_total(&config), (expected, expected));
        }
    }

    #[test]
    fn undersized_buffer_is_refused() {
        let custom = CUSTOM.replace(
            r#"{ "direction": "out", "type": "bulk" }"#,
            r#"{ "direction": "out", "type": "bulk", "max_packet_size": 64, "buffer_size": 32 }"#,
        );
        assert_eq!(
            generate(&document(4, &[&custom])),
            Err(ValidationError::BufferTooSmall { endpoint: 1, buffer_size: 32, max_packet_size: 64 })
        );
    }

    #[test]
    fn buffer_override_is_used() {
        let custom = CUSTOM.replace(
            r#"{ "direction": "in", "type": "bulk" }"#,
            r#"{ "direction": "in", "type": "bulk", "buffer_size": 512 }"#,
        );
        let artifacts = generate(&document(4, &[&custom])).unwrap();
        assert!(artifacts.source.contains(
            "// Endpoint 2 (Bulk IN) Buffer Size: 512 bytes\nuint8_t ep2_buffer[512] __attribute__((aligned(4)));\n"
        ));
        assert!(artifacts.source.contains("uint8_t ep1_buffer[64] __attribute__((aligned(4)));"));
    }

    #[test]
    fn string_arrays_carry_labels() {
        let artifacts = generate(&document(8, &[CDC, CUSTOM])).unwrap();
        assert!(artifacts
            .source
            .contains("// Manufacturer: Acme\nconst uint16_t usbd_string1[] = { 0x0041, 0x0063, 0x006D, 0x0065, 0x0000 };\n"));
        assert!(artifacts.source.contains("// CDC Data\nconst uint16_t usbd_string5[] = {"));
        assert!(artifacts.source.contains("// CMSIS-DAP v2\nconst uint16_t usbd_string6[] = {"));
        assert!(!artifacts.source.contains("usbd_string7"));
    }

    #[test]
    fn header_declares_what_the_body_defines() {
        let artifacts = generate(&document(8, &[CDC, CUSTOM])).unwrap();
        let header = &artifacts.header;
        assert!(artifacts.source.starts_with("// Generated by usbd-gen"));
        assert!(artifacts.source.contains("#include \"usb_desc.h\"\n"));
        assert!(header.contains("#ifndef __USB_DESC_H__\n#define __USB_DESC_H__\n"));
        assert!(header.contains("#include <stdint.h>\n"));

        for symbol in ["usbd_device_descriptor", "usbd_config_descriptor", "usbd_msos_descriptor", "usbd_msos_feature_descriptor", "usbd_string0"] {
            assert!(artifacts.source.contains(&format!("const uint8_t {}[] = {{", symbol)));
            assert!(header.contains(&format!("extern const uint8_t {}[];", symbol)));
        }
        for index in 1..=6 {
            assert!(artifacts.source.contains(&format!("const uint16_t usbd_string{}[]", index)));
            assert!(header.contains(&format!("extern const uint16_t usbd_string{}[];", index)));
        }
        for number in 1..=5 {
            assert!(artifacts.source.contains(&format!("uint8_t ep{}_buffer[", number)));
            assert!(header.contains(&format!("extern uint8_t ep{}_buffer[];", number)));
        }
        assert!(!header.contains("ep6_buffer"));
        assert!(!header.contains("usbd_string7"));
    }

    #[test]
    fn header_defines() {
        let artifacts = generate(&document(8, &[CDC, CUSTOM])).unwrap();
        let header = &artifacts.header;
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_CONFIG_DESCRIPTOR_SIZE", 9 + 58 + 23)));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_MSOS_FEATURE_DESCRIPTOR_SIZE", 56)));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_STRING_COUNT", 7)));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_ITF_CDC_CONTROL", 0)));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_ITF_CDC_DATA", 1)));
        assert!(header.lines().any(|l| l.starts_with("#define USBD_ITF_CMSIS_DAP") && l.ends_with(" 2")));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_EP1_ADDR", "0x81")));
        assert!(header.contains(&format!("#define {:<40} {}\n", "USBD_EP2_ADDR", "0x02")));
    }

    #[test]
    fn interface_define_names() {
        let mut taken = BTreeSet::new();
        assert_eq!(define_name("CDC Control", "X".into(), &mut taken), "CDC_CONTROL");
        assert_eq!(define_name("CDC Control", "X".into(), &mut taken), "CDC_CONTROL_2");
        assert_eq!(define_name("", "CUSTOM1".into(), &mut taken), "CUSTOM1");
        assert_eq!(define_name("2 port", "X".into(), &mut taken), "_2_PORT");
    }

    #[test]
    fn nothing_is_produced_on_failure() {
        let custom = CUSTOM.replace("CDB3B5AD-293B", "CDB3B5AD-29");
        assert_eq!(
            generate(&document(4, &[&custom])),
            Err(ValidationError::InvalidGuid("{CDB3B5AD-29-4663-AA36-1AAE46463776}".to_owned()))
        );
        let wide = CUSTOM.replace("CMSIS-DAP v2", "\u{1F600}");
        assert_eq!(generate(&document(4, &[&wide])), Err(ValidationError::UnencodableString("\u{1F600}".to_owned())));
    }

    #[test]
    fn include_guard_follows_header_name() {
        assert_eq!(include_guard("usb_desc.h"), "__USB_DESC_H__");
        assert_eq!(include_guard("board-desc.h"), "__BOARD_DESC_H__");
        assert_eq!(include_guard(".h"), "__H__");
        assert_eq!(include_guard(""), "__USB_DESC_H__");

        let config = document(8, &[CDC, CUSTOM]);
        let allocation = allocate(&config).unwrap();
        let artifacts = emit_artifacts(&config, &allocation, "board-desc.h").unwrap();
        assert!(artifacts.source.contains("#include \"board-desc.h\"\n"));
        assert!(artifacts.header.contains("#ifndef __BOARD_DESC_H__\n#define __BOARD_DESC_H__\n"));
        assert!(artifacts.header.trim_end().ends_with("#endif // __BOARD_DESC_H__"));
        assert!(!artifacts.header.contains("__USB_DESC_H__"));
    }

    #[test]
    fn labels_cannot_break_out_of_comments() {
        let custom = CUSTOM.replace("CMSIS-DAP v2", r"CMSIS-DAP\nv2");
        let artifacts = generate(&document(4, &[&custom])).unwrap();
        assert!(artifacts.source.contains("// CMSIS-DAP\\nv2\nconst uint16_t usbd_string4[] = {"));
        assert!(!artifacts.source.lines().any(|line| line.trim_start().starts_with("v2")));
    }
}
