use crate::backend::reorder_buffer::ROBSlotState;
use crate::instructions::instructions::{AddressType, Opcode, RegisterType, Tag, UnitClass, WordType};

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct RSSnapshot {
    pub(crate) class: UnitClass,
    pub(crate) index: u16,
    pub(crate) opcode: Option<Opcode>,
    pub(crate) source_tags: [Tag; 2],
    pub(crate) source_values: [WordType; 2],
    pub(crate) rob_tag: Tag,
    pub(crate) cycles_remaining: u32,
    pub(crate) effective_address: AddressType,
}

#[derive(Clone, PartialEq, Debug)]
pub(crate) struct ROBSnapshot {
    pub(crate) tag: Tag,
    pub(crate) opcode: Option<Opcode>,
    pub(crate) state: ROBSlotState,
    pub(crate) target: Option<RegisterType>,
    pub(crate) value: WordType,
    pub(crate) address: Option<AddressType>,
}

/// The state of the backend at the end of a cycle: busy stations, occupied
/// reorder buffer slots (head first) and the registers with a pending writer.
#[derive(Clone, PartialEq, Debug)]
pub(crate) struct CycleSnapshot {
    pub(crate) cycle: u64,
    pub(crate) stations: Vec<RSSnapshot>,
    pub(crate) rob: Vec<ROBSnapshot>,
    pub(crate) rat: Vec<(RegisterType, Tag)>,
}
