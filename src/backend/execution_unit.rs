use crate::backend::reorder_buffer::{ROBSlot, ROBSlotState};
use crate::backend::reservation_station::RS;
use crate::cpu::FUConfig;
use crate::instructions::instructions::{AddressType, Opcode, WordType};

/// What happened to a reservation station during one execute phase.
#[derive(Clone, Copy, Default, PartialEq, Debug)]
pub(crate) struct EUCycle {
    pub(crate) started: bool,
    pub(crate) completed: Option<WordType>,
    pub(crate) address: Option<AddressType>,
}

/// The functional units behind the reservation stations. A unit is not a
/// separate resource: each busy station computes on its own, paced by the
/// configured latency of its opcode.
pub(crate) struct ExecutionUnits {
    fu_config: FUConfig,
    // the value every load produces; there is no memory to read from
    load_value: WordType,
}

#[allow(non_snake_case)]
impl ExecutionUnits {
    pub(crate) fn new(fu_config: &FUConfig, load_value: WordType) -> Self {
        Self { fu_config: fu_config.clone(), load_value }
    }

    pub(crate) fn latency(&self, opcode: Opcode) -> u32 {
        self.fu_config.latency(opcode)
    }

    pub(crate) fn cycle(&self, rs: &mut RS, rob_slot: &mut ROBSlot) -> EUCycle {
        let mut outcome = EUCycle::default();

        let opcode = match rs.opcode {
            Some(opcode) => opcode,
            None => return outcome,
        };

        // a station that finished waits for write-result to release it
        if rs.result.is_some() {
            return outcome;
        }

        match opcode {
            Opcode::ADDD | Opcode::SUBD | Opcode::MULTD | Opcode::DIVD => {
                if !rs.operands_ready() {
                    return outcome;
                }

                if self.count_down(opcode, rs, rob_slot, &mut outcome) {
                    let result = match opcode {
                        Opcode::ADDD => Self::execute_ADDD(rs),
                        Opcode::SUBD => Self::execute_SUBD(rs),
                        Opcode::MULTD => Self::execute_MULTD(rs),
                        _ => Self::execute_DIVD(rs),
                    };
                    Self::complete(rs, rob_slot, result, &mut outcome);
                }
            }
            Opcode::LD => {
                if !rs.source[0].is_ready() {
                    return outcome;
                }

                if self.count_down(opcode, rs, rob_slot, &mut outcome) {
                    let address = Self::effective_address(rs);
                    rs.effective_address = address;
                    rob_slot.address = address;
                    rob_slot.address_resolved = true;
                    outcome.address = Some(address);
                    Self::complete(rs, rob_slot, self.load_value, &mut outcome);
                }
            }
            Opcode::SD => {
                // only the address is computed here; the value arrives through the CDB
                if rs.source[0].is_ready() && !rob_slot.address_resolved {
                    let address = Self::effective_address(rs);
                    rs.effective_address = address;
                    rob_slot.address = address;
                    rob_slot.address_resolved = true;
                    rob_slot.state = ROBSlotState::EXECUTING;
                    outcome.started = true;
                    outcome.address = Some(address);
                }
            }
        }

        outcome
    }

    // Returns true in the cycle the countdown reaches 0. The first eligible cycle
    // counts as the first cycle of execution.
    fn count_down(&self, opcode: Opcode, rs: &mut RS, rob_slot: &mut ROBSlot, outcome: &mut EUCycle) -> bool {
        match rob_slot.state {
            ROBSlotState::ISSUED => {
                rs.cycles_remaining = self.latency(opcode) - 1;
                rob_slot.state = ROBSlotState::EXECUTING;
                outcome.started = true;
            }
            ROBSlotState::EXECUTING => {
                if rs.cycles_remaining > 0 {
                    rs.cycles_remaining -= 1;
                }
            }
            ROBSlotState::EXECUTED | ROBSlotState::RETIRED => return false,
        }

        rs.cycles_remaining == 0
    }

    fn complete(rs: &mut RS, rob_slot: &mut ROBSlot, result: WordType, outcome: &mut EUCycle) {
        rob_slot.result = result;
        rob_slot.state = ROBSlotState::EXECUTED;
        rs.result = Some(result);
        outcome.completed = Some(result);
    }

    // Wraps like a real address adder; the base cast saturates for huge values.
    fn effective_address(rs: &RS) -> AddressType {
        (rs.source[0].value() as AddressType).wrapping_add(rs.offset)
    }

    fn execute_ADDD(rs: &RS) -> WordType {
        rs.source[0].value() + rs.source[1].value()
    }

    fn execute_SUBD(rs: &RS) -> WordType {
        rs.source[0].value() - rs.source[1].value()
    }

    fn execute_MULTD(rs: &RS) -> WordType {
        rs.source[0].value() * rs.source[1].value()
    }

    fn execute_DIVD(rs: &RS) -> WordType {
        let divisor = rs.source[1].value();
        if divisor == 0.0 {
            0.0
        } else {
            rs.source[0].value() / divisor
        }
    }
}
