use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use log::{debug, info};

use crate::config::{
    CdcInterface, Device, FunctionalDescriptor, Interface, InterfaceClass, InterfaceNumber, Speed, SubRole,
    UsbConfig,
};
use crate::error::ValidationError;

/// The endpoint number field of `bEndpointAddress` is four bits wide.
pub const MAX_ENDPOINT_NUMBER: u8 = 15;

/// `bMaxPower` is a single byte counted in 2 mA units.
pub const MAX_POWER_MA: u16 = 510;

/// Identifies one declared endpoint without touching the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EndpointKey {
    /// Declaration index of the owning interface
    pub interface: usize,
    /// Sub-interface for CDC, `None` for custom interfaces
    pub role: Option<SubRole>,
    /// Position within the sub-interface's endpoint list
    pub index: usize,
}

impl EndpointKey {
    pub fn new(interface: usize, role: Option<SubRole>, index: usize) -> EndpointKey {
        EndpointKey { interface, role, index }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EndpointAssignment {
    pub key: EndpointKey,
    pub class: InterfaceClass,
    pub number: u8,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InterfaceSlot {
    pub interface: usize,
    pub class: InterfaceClass,
    pub role: Option<SubRole>,
    pub number: u8,
}

/// Interface numbers cited by a CDC interface's functional descriptors,
/// after any "auto" references have been resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CdcLinks {
    pub call_management_data: u8,
    pub union_master: u8,
    pub union_slave: u8,
}

/// The allocation record: every number the descriptors refer to, keyed by
/// where it came from in the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Size of the endpoint pool
    pub max_count: u8,

    /// Endpoint numbers, in allocation (priority) order
    pub endpoints: Vec<EndpointAssignment>,

    /// Interface numbers, in declaration order
    pub interfaces: Vec<InterfaceSlot>,

    links: BTreeMap<usize, CdcLinks>,
}

impl fmt::Display for Allocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "USB allocation: {} of {} endpoint(s), {} interface(s)",
            self.endpoints.len(),
            self.max_count,
            self.interfaces.len()
        )?;
        writeln!(f, "    interfaces:")?;
        for slot in &self.interfaces {
            write!(f, "        {:2}: {} #{}", slot.number, slot.class, slot.interface)?;
            if let Some(role) = slot.role {
                write!(f, " {}", role)?;
            }
            writeln!(f)?;
        }
        writeln!(f, "    endpoints:")?;
        for assignment in &self.endpoints {
            write!(f, "        EP{:<2} {} #{}", assignment.number, assignment.class, assignment.key.interface)?;
            if let Some(role) = assignment.key.role {
                write!(f, " {}", role)?;
            }
            writeln!(f, " [{}]", assignment.key.index)?;
        }
        Ok(())
    }
}

impl Allocation {
    pub fn endpoint_number(&self, key: &EndpointKey) -> Option<u8> {
        self.endpoints.iter().find(|a| a.key == *key).map(|a| a.number)
    }

    pub fn interface_number(&self, interface: usize, role: Option<SubRole>) -> Option<u8> {
        self.interfaces
            .iter()
            .find(|slot| slot.interface == interface && slot.role == role)
            .map(|slot| slot.number)
    }

    /// Look a number up by `(class, sub-role)`. When several interfaces share a
    /// class, the first declared one wins.
    pub fn lookup(&self, class: InterfaceClass, role: Option<SubRole>) -> Option<u8> {
        self.interfaces
            .iter()
            .find(|slot| slot.class == class && slot.role == role)
            .map(|slot| slot.number)
    }

    pub fn cdc_links(&self, interface: usize) -> Option<&CdcLinks> { self.links.get(&interface) }

    /// Return a copy of `config` with every "auto" interface number and
    /// functional-descriptor reference replaced by what was allocated.
    pub fn pin(&self, config: &UsbConfig) -> UsbConfig {
        let mut pinned = config.clone();
        if let Some(configuration) = pinned.configuration.as_mut() {
            for (index, interface) in configuration.interfaces.iter_mut().enumerate() {
                match interface {
                    Interface::Cdc(cdc) => self.pin_cdc(index, cdc),
                    Interface::Custom(custom) => {
                        if let Some(number) = self.interface_number(index, None) {
                            custom.interface_number = InterfaceNumber::Fixed(number);
                        }
                    }
                }
            }
        }
        pinned
    }

    fn pin_cdc(&self, index: usize, cdc: &mut CdcInterface) {
        if let Some(data) = cdc.data.as_mut() {
            if let Some(number) = self.interface_number(index, Some(SubRole::Data)) {
                data.interface_number = InterfaceNumber::Fixed(number);
            }
        }
        let Some(comm) = cdc.communication.as_mut() else { return };
        if let Some(number) = self.interface_number(index, Some(SubRole::Communication)) {
            comm.interface_number = InterfaceNumber::Fixed(number);
        }
        let Some(links) = self.links.get(&index) else { return };
        for fd in comm.functional_descriptors.iter_mut() {
            match fd {
                FunctionalDescriptor::CallManagement { data_interface, .. } => {
                    *data_interface = InterfaceNumber::Fixed(links.call_management_data);
                }
                FunctionalDescriptor::Union { master_interface, slave_interface } => {
                    *master_interface = InterfaceNumber::Fixed(links.union_master);
                    *slave_interface = InterfaceNumber::Fixed(links.union_slave);
                }
                _ => (),
            }
        }
    }
}

fn check_device(device: &Device) -> Result<(), ValidationError> {
    let max_count = device.endpoints.max_count;
    if max_count < 1 || max_count > MAX_ENDPOINT_NUMBER {
        return Err(ValidationError::InvalidEndpointPool(max_count));
    }
    if device.speed == Speed::Full && device.max_packet_size0 > 64 {
        return Err(ValidationError::ControlPacketTooLarge(device.max_packet_size0));
    }
    if device.max_power > MAX_POWER_MA {
        return Err(ValidationError::PowerOutOfRange(device.max_power));
    }
    Ok(())
}

/// Check each interface's shape and flatten the endpoints into allocation
/// order: ascending priority, ties in declaration order.
fn endpoints_needed(interfaces: &[Interface]) -> Result<Vec<(EndpointKey, InterfaceClass)>, ValidationError> {
    let mut order: Vec<usize> = (0..interfaces.len()).collect();
    order.sort_by_key(|&index| interfaces[index].priority());

    let mut needed = vec![];
    for index in order {
        match &interfaces[index] {
            Interface::Cdc(cdc) => {
                let comm = cdc.communication.as_ref().ok_or(ValidationError::MissingCdcSection {
                    interface: index,
                    role: SubRole::Communication,
                })?;
                let data = cdc
                    .data
                    .as_ref()
                    .ok_or(ValidationError::MissingCdcSection { interface: index, role: SubRole::Data })?;
                if comm.endpoints.len() != 1 {
                    return Err(ValidationError::CdcEndpointCount {
                        interface: index,
                        role: SubRole::Communication,
                        expected: 1,
                        found: comm.endpoints.len(),
                    });
                }
                if data.endpoints.len() != 2 {
                    return Err(ValidationError::CdcEndpointCount {
                        interface: index,
                        role: SubRole::Data,
                        expected: 2,
                        found: data.endpoints.len(),
                    });
                }
                needed.push((EndpointKey::new(index, Some(SubRole::Communication), 0), InterfaceClass::Cdc));
                needed.push((EndpointKey::new(index, Some(SubRole::Data), 0), InterfaceClass::Cdc));
                needed.push((EndpointKey::new(index, Some(SubRole::Data), 1), InterfaceClass::Cdc));
            }
            Interface::Custom(custom) => {
                if custom.endpoints.len() != 2 {
                    return Err(ValidationError::CustomEndpointCount {
                        interface: index,
                        found: custom.endpoints.len(),
                    });
                }
                for ep_index in 0..custom.endpoints.len() {
                    needed.push((EndpointKey::new(index, None, ep_index), InterfaceClass::Custom));
                }
            }
        }
    }
    Ok(needed)
}

/// First-fit: every entry takes the lowest number in `1..=max_count` not
/// already handed out.
pub(crate) fn assign_endpoint_numbers(
    needed: &[(EndpointKey, InterfaceClass)],
    max_count: u8,
) -> Result<Vec<EndpointAssignment>, ValidationError> {
    let mut used = BTreeSet::new();
    let mut assignments = Vec::with_capacity(needed.len());
    for &(key, class) in needed {
        let number = (1..=max_count)
            .find(|n| !used.contains(n))
            .ok_or(ValidationError::EndpointExhausted { interface: key.interface, class })?;
        used.insert(number);
        debug!("endpoint {} -> {} #{} {:?}[{}]", number, class, key.interface, key.role, key.index);
        assignments.push(EndpointAssignment { key, class, number });
    }
    Ok(assignments)
}

struct InterfaceCounter {
    next: u8,
    used: BTreeSet<u8>,
    slots: Vec<InterfaceSlot>,
}

impl InterfaceCounter {
    fn settle(
        &mut self,
        interface: usize,
        class: InterfaceClass,
        role: Option<SubRole>,
        requested: InterfaceNumber,
    ) -> Result<u8, ValidationError> {
        let number = match requested {
            InterfaceNumber::Fixed(number) => number,
            InterfaceNumber::Auto => {
                let number = self.next;
                self.next = self.next.wrapping_add(1);
                number
            }
        };
        if !self.used.insert(number) {
            return Err(ValidationError::DuplicateInterfaceNumber { interface, number });
        }
        debug!("interface {} -> {} #{} {:?}", number, class, interface, role);
        self.slots.push(InterfaceSlot { interface, class, role, number });
        Ok(number)
    }
}

/// Number interfaces in declaration order. Explicit numbers are kept and do
/// not advance the counter.
fn assign_interface_numbers(
    interfaces: &[Interface],
) -> Result<(Vec<InterfaceSlot>, BTreeMap<usize, CdcLinks>), ValidationError> {
    let mut counter = InterfaceCounter { next: 0, used: BTreeSet::new(), slots: vec![] };
    let mut links = BTreeMap::new();

    for (index, interface) in interfaces.iter().enumerate() {
        match interface {
            Interface::Cdc(cdc) => {
                let comm = cdc.communication.as_ref().ok_or(ValidationError::MissingCdcSection {
                    interface: index,
                    role: SubRole::Communication,
                })?;
                let data = cdc
                    .data
                    .as_ref()
                    .ok_or(ValidationError::MissingCdcSection { interface: index, role: SubRole::Data })?;
                let comm_number = counter.settle(
                    index,
                    InterfaceClass::Cdc,
                    Some(SubRole::Communication),
                    comm.interface_number,
                )?;
                let data_number =
                    counter.settle(index, InterfaceClass::Cdc, Some(SubRole::Data), data.interface_number)?;

                let call_management_data = comm
                    .call_management()
                    .and_then(|(_, data_interface)| data_interface.fixed())
                    .unwrap_or(data_number);
                let (master, slave) = comm.union().unwrap_or_default();
                links.insert(index, CdcLinks {
                    call_management_data,
                    union_master: master.fixed().unwrap_or(comm_number),
                    union_slave: slave.fixed().unwrap_or(data_number),
                });
            }
            Interface::Custom(custom) => {
                counter.settle(index, InterfaceClass::Custom, None, custom.interface_number)?;
            }
        }
    }
    Ok((counter.slots, links))
}

/// Validate the document and work out every endpoint and interface number.
pub fn allocate(config: &UsbConfig) -> Result<Allocation, ValidationError> {
    let device = config.device()?;
    check_device(device)?;
    let interfaces = config.interfaces()?;
    let max_count = device.endpoints.max_count;

    let needed = endpoints_needed(interfaces)?;
    if needed.len() > max_count as usize {
        return Err(ValidationError::TooManyEndpoints { needed: needed.len(), available: max_count });
    }
    let endpoints = assign_endpoint_numbers(&needed, max_count)?;
    let (slots, links) = assign_interface_numbers(interfaces)?;

    info!(
        "allocated {} endpoint(s) of {} and {} interface number(s)",
        endpoints.len(),
        max_count,
        slots.len()
    );
    Ok(Allocation { max_count, endpoints, interfaces: slots, links })
}
