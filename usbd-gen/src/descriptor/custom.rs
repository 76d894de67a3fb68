use super::standard::{EndpointDescriptor, InterfaceDescriptor};
use super::{emit, Descriptor};
use crate::allocate::{Allocation, EndpointKey};
use crate::config::CustomInterface;
use crate::error::ValidationError;
use crate::strings::StringTable;
use crate::table::Table;

/// A vendor interface with exactly two endpoints.
pub struct CustomFunction<'a> {
    interface: InterfaceDescriptor,
    endpoints: [EndpointDescriptor<'a>; 2],
}

impl<'a> CustomFunction<'a> {
    pub const LENGTH: usize = InterfaceDescriptor::LENGTH + 2 * EndpointDescriptor::LENGTH;

    pub fn new(
        index: usize,
        custom: &'a CustomInterface,
        allocation: &Allocation,
        strings: &StringTable,
    ) -> Result<Self, ValidationError> {
        if custom.endpoints.len() != 2 {
            return Err(ValidationError::CustomEndpointCount { interface: index, found: custom.endpoints.len() });
        }
        let number = allocation
            .interface_number(index, None)
            .ok_or(ValidationError::UnassignedInterface { interface: index, role: None })?;
        let endpoint = |ep_index: usize| {
            EndpointDescriptor::new(allocation, EndpointKey::new(index, None, ep_index), &custom.endpoints[ep_index])
        };
        Ok(CustomFunction {
            interface: InterfaceDescriptor {
                number,
                num_endpoints: 2,
                class: custom.class_code,
                subclass: custom.subclass_code,
                protocol: custom.protocol_code,
                string_index: strings.index_of(&custom.string),
                label: custom.string.clone(),
            },
            endpoints: [endpoint(0)?, endpoint(1)?],
        })
    }
}

impl Descriptor for CustomFunction<'_> {
    fn name(&self) -> String { format!("Custom Interface (Interface {})", self.interface.number) }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += emit(&self.interface, out)?;
        for endpoint in &self.endpoints {
            written += emit(endpoint, out)?;
        }
        Ok(written)
    }
}
