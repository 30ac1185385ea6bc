use std::fmt;
use std::fmt::Display;
use std::rc::Rc;

use crate::instructions::instructions::{AddressType, Instr, mnemonic, Opcode, RegisterType, Tag, UnitClass, WordType};

#[derive(Clone, Copy, PartialEq, Debug)]
pub(crate) enum StallCause {
    ROBFull,
    NoFreeStation(UnitClass),
}

/// Something observable the backend did during a cycle. `seq` is the program
/// position of the instruction involved.
#[derive(Clone, PartialEq, Debug)]
pub(crate) enum Event {
    Issued { tag: Tag, instr: Rc<Instr> },
    Stalled { seq: usize, cause: StallCause },
    ExecutionStarted { tag: Tag, seq: usize, opcode: Opcode },
    ExecutionCompleted { tag: Tag, seq: usize, opcode: Opcode, value: WordType },
    AddressResolved { tag: Tag, seq: usize, address: AddressType },
    Broadcast { tag: Tag, seq: usize, value: WordType },
    StoreReady { tag: Tag, seq: usize, address: AddressType, value: WordType },
    Committed { tag: Tag, seq: usize, opcode: Opcode, reg: RegisterType, value: WordType },
    CommittedStore { tag: Tag, seq: usize, address: AddressType, value: WordType },
}

impl Event {
    /// The program position of the instruction the event is about.
    pub(crate) fn seq(&self) -> usize {
        match self {
            Event::Issued { instr, .. } => instr.seq,
            Event::Stalled { seq, .. }
            | Event::ExecutionStarted { seq, .. }
            | Event::ExecutionCompleted { seq, .. }
            | Event::AddressResolved { seq, .. }
            | Event::Broadcast { seq, .. }
            | Event::StoreReady { seq, .. }
            | Event::Committed { seq, .. }
            | Event::CommittedStore { seq, .. } => *seq,
        }
    }

    pub(crate) fn is_commit(&self) -> bool {
        matches!(self, Event::Committed { .. } | Event::CommittedStore { .. })
    }
}

impl Display for StallCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StallCause::ROBFull => write!(f, "reorder buffer full"),
            StallCause::NoFreeStation(class) => write!(f, "no free {} station", class),
        }
    }
}

impl Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Event::Issued { tag, instr } => write!(f, "ISSUED: {} (Dest ROB Tag: {})", instr, tag),
            Event::Stalled { seq, cause } => write!(f, "STALLED: instruction {} ({})", seq, cause),
            Event::ExecutionStarted { tag, opcode, .. } => write!(f, "EXECUTING: {} (Tag: {})", mnemonic(*opcode), tag),
            Event::ExecutionCompleted { tag, opcode, value, .. } => {
                write!(f, "EXECUTED: {} (Tag: {}) - result ({:.2}) ready", mnemonic(*opcode), tag, value)
            }
            Event::AddressResolved { tag, address, .. } => write!(f, "ADDRESS: Tag {} -> Mem[{}]", tag, address),
            Event::Broadcast { tag, value, .. } => write!(f, "WRITE RESULT: Tag {} value ({:.2}) on the CDB", tag, value),
            Event::StoreReady { tag, address, value, .. } => {
                write!(f, "WRITE RESULT (STORE): Tag {} Mem[{}] = {:.2} ready to commit", tag, address, value)
            }
            Event::Committed { opcode, reg, value, .. } => write!(f, "COMMITTED: {} -> F{} = {:.2}", mnemonic(*opcode), reg, value),
            Event::CommittedStore { address, value, .. } => write!(f, "COMMITTED (MEM): SD -> Mem[{}] = {:.2}", address, value),
        }
    }
}
