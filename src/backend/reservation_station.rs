use std::fmt;
use std::fmt::Display;

use crate::instructions::instructions::{AddressType, mnemonic, NO_TAG, Opcode, Tag, UNIT_CLASSES, UnitClass, WordType};

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum RSState {
    IDLE,
    BUSY,
}

/// A source operand of a reservation station: either the value itself or the
/// tag of the reorder buffer slot that is going to produce it.
#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum SourceOperand {
    Value(WordType),
    Pending(Tag),
}

impl SourceOperand {
    pub(crate) fn is_ready(&self) -> bool {
        matches!(self, SourceOperand::Value(_))
    }

    pub(crate) fn tag(&self) -> Tag {
        match self {
            SourceOperand::Value(_) => NO_TAG,
            SourceOperand::Pending(tag) => *tag,
        }
    }

    // a pending operand has no value yet; it reads as 0 like a cleared station
    pub(crate) fn value(&self) -> WordType {
        match self {
            SourceOperand::Value(value) => *value,
            SourceOperand::Pending(_) => 0.0,
        }
    }

    /// Replaces a pending tag by the broadcast value. Returns true if it matched.
    pub(crate) fn resolve(&mut self, tag: Tag, value: WordType) -> bool {
        match self {
            SourceOperand::Pending(pending) if *pending == tag => {
                *self = SourceOperand::Value(value);
                true
            }
            _ => false,
        }
    }
}

impl Display for SourceOperand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceOperand::Value(value) => write!(f, "{:.2}", value),
            SourceOperand::Pending(tag) => write!(f, "#{}", tag),
        }
    }
}

// A single reservation station
pub(crate) struct RS {
    pub(crate) index: u16,
    pub(crate) state: RSState,
    pub(crate) opcode: Option<Opcode>,
    // [0] is the first source or the base address, [1] the second source or the stored value
    pub(crate) source: [SourceOperand; 2],
    pub(crate) rob_tag: Tag,
    // program position of the occupying instruction
    pub(crate) seq: usize,
    pub(crate) offset: i64,
    pub(crate) effective_address: AddressType,
    pub(crate) cycles_remaining: u32,
    // set once execution finished; cleared when the station is released
    pub(crate) result: Option<WordType>,
}

impl RS {
    fn new(index: u16) -> Self {
        Self {
            index,
            state: RSState::IDLE,
            opcode: None,
            source: [SourceOperand::Value(0.0), SourceOperand::Value(0.0)],
            rob_tag: NO_TAG,
            seq: 0,
            offset: 0,
            effective_address: 0,
            cycles_remaining: 0,
            result: None,
        }
    }

    fn reset(&mut self) {
        *self = RS::new(self.index);
    }

    pub(crate) fn is_busy(&self) -> bool {
        self.state == RSState::BUSY
    }

    pub(crate) fn operands_ready(&self) -> bool {
        self.source.iter().all(SourceOperand::is_ready)
    }
}

impl Display for RS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RS ")?;
        match self.opcode {
            Some(opcode) => write!(f, "{}", mnemonic(opcode))?,
            None => write!(f, "-")?,
        }

        for source in &self.source {
            write!(f, " {}", source)?;
        }

        write!(f, " -> #{}", self.rob_tag)
    }
}

/// A pool of reservation stations serving one unit class.
pub(crate) struct RSTable {
    pub(crate) class: UnitClass,
    array: Vec<RS>,
}

impl RSTable {
    pub(crate) fn new(class: UnitClass, capacity: u16) -> Self {
        let mut array = Vec::with_capacity(capacity as usize);
        for i in 0..capacity {
            array.push(RS::new(i));
        }

        RSTable { class, array }
    }

    pub(crate) fn get(&self, rs_index: u16) -> &RS {
        &self.array[rs_index as usize]
    }

    pub(crate) fn get_mut(&mut self, rs_index: u16) -> &mut RS {
        &mut self.array[rs_index as usize]
    }

    pub(crate) fn has_idle(&self) -> bool {
        self.array.iter().any(|rs| !rs.is_busy())
    }

    pub(crate) fn busy_count(&self) -> usize {
        self.array.iter().filter(|rs| rs.is_busy()).count()
    }

    /// Claims the lowest indexed idle station. None means a structural hazard.
    pub(crate) fn allocate(&mut self) -> Option<u16> {
        let rs = self.array.iter_mut().find(|rs| !rs.is_busy())?;
        debug_assert!(rs.rob_tag == NO_TAG && rs.result.is_none());
        rs.state = RSState::BUSY;
        Some(rs.index)
    }

    pub(crate) fn deallocate(&mut self, rs_index: u16) {
        let rs = &mut self.array[rs_index as usize];
        debug_assert!(rs.is_busy(), "RSTable: can't deallocate idle station {}{}", self.class.prefix(), rs_index + 1);
        rs.reset();
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &RS> {
        self.array.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RS> {
        self.array.iter_mut()
    }
}

/// The four independent pools: Add/Sub, Mul/Div, Load and Store.
pub(crate) struct RSPools {
    tables: Vec<RSTable>,
}

impl RSPools {
    pub(crate) fn new(counts: impl Fn(UnitClass) -> u16) -> Self {
        let tables = UNIT_CLASSES.iter().map(|class| RSTable::new(*class, counts(*class))).collect();
        Self { tables }
    }

    pub(crate) fn pool(&self, class: UnitClass) -> &RSTable {
        &self.tables[class.index()]
    }

    pub(crate) fn pool_mut(&mut self, class: UnitClass) -> &mut RSTable {
        &mut self.tables[class.index()]
    }

    // pools in Add/Sub, Mul/Div, Load, Store order
    pub(crate) fn iter(&self) -> impl Iterator<Item = &RSTable> {
        self.tables.iter()
    }

    pub(crate) fn iter_mut(&mut self) -> impl Iterator<Item = &mut RSTable> {
        self.tables.iter_mut()
    }

    pub(crate) fn busy_count(&self) -> usize {
        self.tables.iter().map(RSTable::busy_count).sum()
    }
}
