use super::standard::{EndpointDescriptor, InterfaceDescriptor};
use super::{emit, Descriptor, CS_INTERFACE};
use crate::allocate::{Allocation, EndpointKey};
use crate::config::{CdcInterface, SubRole};
use crate::error::ValidationError;
use crate::strings::StringTable;
use crate::table::Table;

pub const CDC_DATA_CLASS: u8 = 0x0A;

const HEADER: u8 = 0x00;
const CALL_MANAGEMENT: u8 = 0x01;
const ACM: u8 = 0x02;
const UNION: u8 = 0x06;

/// bcdCDC 1.10
const CDC_VERSION: u16 = 0x0110;

pub struct HeaderFunctional;

impl HeaderFunctional {
    pub const LENGTH: usize = 5;
}

impl Descriptor for HeaderFunctional {
    fn name(&self) -> String { "Header Functional Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (5 bytes)");
        written += out.byte(CS_INTERFACE, "bDescriptorType: CS_INTERFACE");
        written += out.byte(HEADER, "bDescriptorSubType: Header Functional Descriptor");
        written += out.word(CDC_VERSION, "bcdCDC: CDC specification version (1.10)");
        Ok(written)
    }
}

pub struct CallManagementFunctional {
    pub capabilities: u8,
    pub data_interface: u8,
}

impl CallManagementFunctional {
    pub const LENGTH: usize = 5;
}

impl Descriptor for CallManagementFunctional {
    fn name(&self) -> String { "Call Management Functional Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (5 bytes)");
        written += out.byte(CS_INTERFACE, "bDescriptorType: CS_INTERFACE");
        written += out.byte(CALL_MANAGEMENT, "bDescriptorSubType: Call Management Functional Descriptor");
        written += out.byte(self.capabilities, "bmCapabilities: Call management capabilities");
        written += out.byte(
            self.data_interface,
            format!("bDataInterface: Data interface ({})", self.data_interface),
        );
        Ok(written)
    }
}

pub struct AcmFunctional {
    pub capabilities: u8,
}

impl AcmFunctional {
    pub const LENGTH: usize = 4;
}

impl Descriptor for AcmFunctional {
    fn name(&self) -> String { "Abstract Control Management (ACM) Functional Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (4 bytes)");
        written += out.byte(CS_INTERFACE, "bDescriptorType: CS_INTERFACE");
        written += out.byte(ACM, "bDescriptorSubType: Abstract Control Management (ACM)");
        written += out.byte(self.capabilities, "bmCapabilities: ACM capabilities");
        Ok(written)
    }
}

pub struct UnionFunctional {
    pub master: u8,
    pub slave: u8,
}

impl UnionFunctional {
    pub const LENGTH: usize = 5;
}

impl Descriptor for UnionFunctional {
    fn name(&self) -> String { "Union Functional Descriptor".to_owned() }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(self.name());
        written += out.byte(Self::LENGTH as u8, "bLength: Size of descriptor (5 bytes)");
        written += out.byte(CS_INTERFACE, "bDescriptorType: CS_INTERFACE");
        written += out.byte(UNION, "bDescriptorSubType: Union Functional Descriptor");
        written += out.byte(self.master, format!("bMasterInterface: Communication interface ({})", self.master));
        written += out.byte(self.slave, format!("bSlaveInterface: Data interface ({})", self.slave));
        Ok(written)
    }
}

/// A complete CDC-ACM function: communication interface, its functional
/// descriptors and notification endpoint, then the data interface and its
/// two bulk endpoints.
pub struct CdcFunction<'a> {
    communication: InterfaceDescriptor,
    header: HeaderFunctional,
    call_management: CallManagementFunctional,
    acm: AcmFunctional,
    union: UnionFunctional,
    notification: EndpointDescriptor<'a>,
    data: InterfaceDescriptor,
    data_endpoints: [EndpointDescriptor<'a>; 2],
}

impl<'a> CdcFunction<'a> {
    pub const LENGTH: usize = InterfaceDescriptor::LENGTH
        + HeaderFunctional::LENGTH
        + CallManagementFunctional::LENGTH
        + AcmFunctional::LENGTH
        + UnionFunctional::LENGTH
        + EndpointDescriptor::LENGTH
        + InterfaceDescriptor::LENGTH
        + 2 * EndpointDescriptor::LENGTH;

    pub fn new(
        index: usize,
        cdc: &'a CdcInterface,
        allocation: &Allocation,
        strings: &StringTable,
    ) -> Result<Self, ValidationError> {
        let comm = cdc
            .communication
            .as_ref()
            .ok_or(ValidationError::MissingCdcSection { interface: index, role: SubRole::Communication })?;
        let data =
            cdc.data.as_ref().ok_or(ValidationError::MissingCdcSection { interface: index, role: SubRole::Data })?;
        let comm_number = allocation
            .interface_number(index, Some(SubRole::Communication))
            .ok_or(ValidationError::UnassignedInterface { interface: index, role: Some(SubRole::Communication) })?;
        let data_number = allocation
            .interface_number(index, Some(SubRole::Data))
            .ok_or(ValidationError::UnassignedInterface { interface: index, role: Some(SubRole::Data) })?;
        let links = allocation
            .cdc_links(index)
            .ok_or(ValidationError::UnassignedInterface { interface: index, role: Some(SubRole::Communication) })?;
        let acm_capabilities = comm
            .acm_capabilities()
            .ok_or(ValidationError::MissingFunctionalDescriptor { interface: index, kind: "acm" })?;
        let call_management_capabilities = comm.call_management().map(|(caps, _)| caps).unwrap_or(0);

        let endpoint = move |role: SubRole, ep_index: usize| -> Result<EndpointDescriptor<'a>, ValidationError> {
            let endpoints = match role {
                SubRole::Communication => &comm.endpoints,
                SubRole::Data => &data.endpoints,
            };
            let key = EndpointKey::new(index, Some(role), ep_index);
            let declared = endpoints.get(ep_index).ok_or(ValidationError::UnassignedEndpoint {
                interface: index,
                role: Some(role),
                index: ep_index,
            })?;
            EndpointDescriptor::new(allocation, key, declared)
        };

        Ok(CdcFunction {
            communication: InterfaceDescriptor {
                number: comm_number,
                num_endpoints: 1,
                class: comm.class,
                subclass: comm.subclass,
                protocol: comm.protocol,
                string_index: strings.index_of(&comm.string),
                label: comm.string.clone(),
            },
            header: HeaderFunctional,
            call_management: CallManagementFunctional {
                capabilities: call_management_capabilities,
                data_interface: links.call_management_data,
            },
            acm: AcmFunctional { capabilities: acm_capabilities },
            union: UnionFunctional { master: links.union_master, slave: links.union_slave },
            notification: endpoint(SubRole::Communication, 0)?,
            data: InterfaceDescriptor {
                number: data_number,
                num_endpoints: 2,
                class: CDC_DATA_CLASS,
                subclass: 0,
                protocol: 0,
                string_index: strings.index_of(&data.string),
                label: data.string.clone(),
            },
            data_endpoints: [endpoint(SubRole::Data, 0)?, endpoint(SubRole::Data, 1)?],
        })
    }
}

impl Descriptor for CdcFunction<'_> {
    fn name(&self) -> String {
        format!("CDC function (Interfaces {} and {})", self.communication.number, self.data.number)
    }

    fn length(&self) -> usize { Self::LENGTH }

    fn serialize(&self, out: &mut Table) -> Result<usize, ValidationError> {
        let mut written = 0;
        out.heading(format!("CDC Communication Interface (Interface {})", self.communication.number));
        written += emit(&self.communication, out)?;
        out.heading("CDC Functional Descriptors");
        written += emit(&self.header, out)?;
        written += emit(&self.call_management, out)?;
        written += emit(&self.acm, out)?;
        written += emit(&self.union, out)?;
        written += emit(&self.notification, out)?;
        out.blank();
        out.heading(format!("CDC Data Interface (Interface {})", self.data.number));
        written += emit(&self.data, out)?;
        for endpoint in &self.data_endpoints {
            written += emit(endpoint, out)?;
        }
        Ok(written)
    }
}
