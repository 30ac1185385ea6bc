use std::collections::VecDeque;
use std::fmt;
use std::fmt::Display;
use std::rc::Rc;

pub(crate) type RegisterType = u16;
pub(crate) type WordType = f64;
pub(crate) type AddressType = i64;

/// Identifies a reorder buffer slot (1-based). 0 means there is no pending producer.
pub(crate) type Tag = u16;

pub(crate) const NO_TAG: Tag = 0;

#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum Opcode {
    ADDD,
    SUBD,
    MULTD,
    DIVD,
    LD,
    SD,
}

/// The reservation station pool an opcode is serviced by.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub enum UnitClass {
    AddSub,
    MulDiv,
    Load,
    Store,
}

pub(crate) const UNIT_CLASSES: [UnitClass; 4] = [UnitClass::AddSub, UnitClass::MulDiv, UnitClass::Load, UnitClass::Store];

impl Opcode {
    pub(crate) fn unit_class(self) -> UnitClass {
        match self {
            Opcode::ADDD | Opcode::SUBD => UnitClass::AddSub,
            Opcode::MULTD | Opcode::DIVD => UnitClass::MulDiv,
            Opcode::LD => UnitClass::Load,
            Opcode::SD => UnitClass::Store,
        }
    }
}

impl UnitClass {
    pub(crate) fn index(self) -> usize {
        match self {
            UnitClass::AddSub => 0,
            UnitClass::MulDiv => 1,
            UnitClass::Load => 2,
            UnitClass::Store => 3,
        }
    }

    // prefix used when printing station names (A1, M2, ...)
    pub(crate) fn prefix(self) -> &'static str {
        match self {
            UnitClass::AddSub => "A",
            UnitClass::MulDiv => "M",
            UnitClass::Load => "L",
            UnitClass::Store => "S",
        }
    }
}

impl Display for UnitClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            UnitClass::AddSub => "Add/Sub",
            UnitClass::MulDiv => "Mul/Div",
            UnitClass::Load => "Load",
            UnitClass::Store => "Store",
        };
        write!(f, "{}", name)
    }
}

pub(crate) fn mnemonic(opcode: Opcode) -> &'static str {
    match opcode {
        Opcode::ADDD => "ADDD",
        Opcode::SUBD => "SUBD",
        Opcode::MULTD => "MULTD",
        Opcode::DIVD => "DIVD",
        Opcode::LD => "LD",
        Opcode::SD => "SD",
    }
}

pub(crate) fn get_opcode(mnemonic: &str) -> Option<Opcode> {
    let string = mnemonic.to_uppercase();

    match string.as_str() {
        "ADDD" => Some(Opcode::ADDD),
        "SUBD" => Some(Opcode::SUBD),
        "MULTD" => Some(Opcode::MULTD),
        "DIVD" => Some(Opcode::DIVD),
        "LD" => Some(Opcode::LD),
        "SD" => Some(Opcode::SD),
        _ => None,
    }
}

/// Extracts the index of a register token like `F4` or `r12`. The letter prefix
/// is ignored; all registers live in a single register file.
pub(crate) fn get_register(name: &str, arch_reg_count: u16) -> Option<RegisterType> {
    let mut chars = name.chars();
    let prefix = chars.next()?;
    if !prefix.is_ascii_alphabetic() {
        return None;
    }

    let digits = chars.as_str();
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return None;
    }

    let reg: RegisterType = digits.parse().ok()?;
    if reg >= arch_reg_count {
        return None;
    }
    Some(reg)
}

/// A decoded instruction. For SD the `dest_reg` holds the register whose value is
/// stored; for LD/SD `src1_reg` is the base register and `immediate` the offset.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Instr {
    pub(crate) opcode: Opcode,
    pub(crate) dest_reg: Option<RegisterType>,
    pub(crate) src1_reg: Option<RegisterType>,
    pub(crate) src2_reg: Option<RegisterType>,
    pub(crate) immediate: i64,
    // position in the program
    pub(crate) seq: usize,
    // line in the source file (1-based)
    pub(crate) line: usize,
}

impl Instr {
    /// The architectural register this instruction writes on commit, if any.
    pub(crate) fn sink_reg(&self) -> Option<RegisterType> {
        if self.opcode == Opcode::SD {
            None
        } else {
            self.dest_reg
        }
    }

    /// The register read as the second operand: src2 for arithmetic, the stored
    /// value for SD, none for LD.
    pub(crate) fn second_source_reg(&self) -> Option<RegisterType> {
        match self.opcode {
            Opcode::SD => self.dest_reg,
            Opcode::LD => None,
            _ => self.src2_reg,
        }
    }
}

fn fmt_reg(reg: Option<RegisterType>) -> String {
    match reg {
        Some(reg) => format!("F{}", reg),
        None => String::from("-"),
    }
}

impl Display for Instr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode {
            Opcode::LD | Opcode::SD => write!(
                f,
                "{} {}, {}({})",
                mnemonic(self.opcode),
                fmt_reg(self.dest_reg),
                self.immediate,
                fmt_reg(self.src1_reg)
            ),
            _ => write!(
                f,
                "{} {}, {}, {}",
                mnemonic(self.opcode),
                fmt_reg(self.dest_reg),
                fmt_reg(self.src1_reg),
                fmt_reg(self.src2_reg)
            ),
        }
    }
}

pub(crate) struct Program {
    pub(crate) code: Vec<Rc<Instr>>,
}

impl Program {
    pub(crate) fn new(code: Vec<Rc<Instr>>) -> Self {
        Self { code }
    }

    pub(crate) fn len(&self) -> usize {
        self.code.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.code.is_empty()
    }

    pub(crate) fn get_instr(&self, pos: usize) -> Rc<Instr> {
        Rc::clone(&self.code[pos])
    }
}

/// The decoded instructions that have not been issued yet, oldest first.
pub(crate) struct InstrQueue {
    instrs: VecDeque<Rc<Instr>>,
}

impl InstrQueue {
    pub(crate) fn new() -> Self {
        Self { instrs: VecDeque::new() }
    }

    pub(crate) fn enqueue(&mut self, instr: Rc<Instr>) {
        self.instrs.push_back(instr);
    }

    pub(crate) fn peek(&self) -> Option<&Rc<Instr>> {
        self.instrs.front()
    }

    pub(crate) fn head_bump(&mut self) {
        let popped = self.instrs.pop_front();
        debug_assert!(popped.is_some(), "InstrQueue: can't bump the head of an empty queue");
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.instrs.is_empty()
    }

    pub(crate) fn size(&self) -> usize {
        self.instrs.len()
    }
}
