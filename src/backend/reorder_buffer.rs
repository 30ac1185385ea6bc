use std::rc::Rc;

use crate::instructions::instructions::{AddressType, Instr, NO_TAG, Opcode, RegisterType, Tag, WordType};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub(crate) enum ROBSlotState {
    ISSUED,
    EXECUTING,
    // the result (or for a store: address and value) is known
    EXECUTED,
    RETIRED,
}

#[derive(Clone, Debug)]
pub(crate) struct ROBSlot {
    pub(crate) instr: Option<Rc<Instr>>,
    pub(crate) occupied: bool,
    pub(crate) state: ROBSlotState,
    // the destination register; for a store the register holding the stored value
    pub(crate) target: Option<RegisterType>,
    pub(crate) result: WordType,
    pub(crate) address_resolved: bool,
    pub(crate) address: AddressType,
}

impl ROBSlot {
    fn new() -> Self {
        Self {
            instr: None,
            occupied: false,
            state: ROBSlotState::ISSUED,
            target: None,
            result: 0.0,
            address_resolved: false,
            address: 0,
        }
    }

    pub(crate) fn opcode(&self) -> Option<Opcode> {
        self.instr.as_ref().map(|instr| instr.opcode)
    }

    pub(crate) fn seq(&self) -> usize {
        self.instr.as_ref().map_or(0, |instr| instr.seq)
    }
}

/// The reorder buffer: a fixed size circular buffer that retires instructions in
/// program order. Slot `p` (0-based) is known to the rest of the backend as tag `p + 1`.
pub(crate) struct ROB {
    capacity: u16,
    head: u16,
    tail: u16,
    slots: Vec<ROBSlot>,
}

impl ROB {
    pub(crate) fn new(capacity: u16) -> Self {
        assert!(capacity > 0, "ROB: capacity must be larger than 0");

        let mut slots = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            slots.push(ROBSlot::new());
        }

        Self { capacity, head: 0, tail: 0, slots }
    }

    fn to_index(&self, tag: Tag) -> usize {
        debug_assert!(tag != NO_TAG, "ROB: the empty tag doesn't refer to a slot");
        ((tag - 1) % self.capacity) as usize
    }

    fn to_tag(index: u16) -> Tag {
        index + 1
    }

    pub(crate) fn is_full(&self) -> bool {
        self.slots[self.tail as usize].occupied
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head == self.tail && !self.slots[self.head as usize].occupied
    }

    pub(crate) fn size(&self) -> u16 {
        if self.is_full() {
            self.capacity
        } else {
            ((self.tail as u32 + self.capacity as u32 - self.head as u32) % self.capacity as u32) as u16
        }
    }

    /// Claims the tail slot for the instruction. Returns its tag, or None when
    /// the buffer is full.
    pub(crate) fn allocate(&mut self, instr: &Rc<Instr>) -> Option<Tag> {
        if self.is_full() {
            return None;
        }

        let index = self.tail;
        let slot = &mut self.slots[index as usize];
        *slot = ROBSlot::new();
        slot.occupied = true;
        slot.state = ROBSlotState::ISSUED;
        slot.target = instr.dest_reg;
        slot.instr = Some(Rc::clone(instr));

        self.tail = (self.tail + 1) % self.capacity;
        Some(Self::to_tag(index))
    }

    pub(crate) fn get(&self, tag: Tag) -> &ROBSlot {
        let slot = &self.slots[self.to_index(tag)];
        debug_assert!(slot.occupied, "ROB: tag {} refers to an unoccupied slot", tag);
        slot
    }

    pub(crate) fn get_mut(&mut self, tag: Tag) -> &mut ROBSlot {
        let index = self.to_index(tag);
        let slot = &mut self.slots[index];
        debug_assert!(slot.occupied, "ROB: tag {} refers to an unoccupied slot", tag);
        slot
    }

    pub(crate) fn head_tag(&self) -> Tag {
        Self::to_tag(self.head)
    }

    pub(crate) fn head(&self) -> &ROBSlot {
        &self.slots[self.head as usize]
    }

    pub(crate) fn head_has_executed(&self) -> bool {
        let slot = self.head();
        slot.occupied && slot.state == ROBSlotState::EXECUTED
    }

    /// Retires the head slot and frees it for reuse. Returns the retired contents.
    pub(crate) fn advance_head(&mut self) -> ROBSlot {
        assert!(self.head_has_executed(), "ROB: can't retire the head because it hasn't executed");

        let index = self.head as usize;
        let mut retired = std::mem::replace(&mut self.slots[index], ROBSlot::new());
        retired.state = ROBSlotState::RETIRED;
        self.head = (self.head + 1) % self.capacity;
        retired
    }

    /// The occupied slots from head to tail (program order), with their tags.
    pub(crate) fn iter(&self) -> impl Iterator<Item = (Tag, &ROBSlot)> + '_ {
        let size = self.size();
        (0..size).map(move |k| {
            let index = ((self.head as u32 + k as u32) % self.capacity as u32) as u16;
            (Self::to_tag(index), &self.slots[index as usize])
        })
    }
}
