use std::cell::RefCell;
use std::rc::Rc;

use log::debug;

use crate::backend::common_data_bus::CDB;
use crate::backend::event::{Event, StallCause};
use crate::backend::execution_unit::ExecutionUnits;
use crate::backend::register_alias_table::RAT;
use crate::backend::reorder_buffer::{ROB, ROBSlotState};
use crate::backend::reservation_station::{RSPools, SourceOperand};
use crate::backend::snapshot::{CycleSnapshot, ROBSnapshot, RSSnapshot};
use crate::cpu::{ArgRegFile, CPUConfig, FUConfig, PerfCounters};
use crate::instructions::instructions::{InstrQueue, NO_TAG, Opcode, RegisterType, UnitClass};

pub(crate) struct Backend {
    instr_queue: Rc<RefCell<InstrQueue>>,
    arch_reg_file: Rc<RefCell<ArgRegFile>>,
    perf_counters: Rc<RefCell<PerfCounters>>,
    pub(crate) rs_pools: RSPools,
    pub(crate) rat: RAT,
    pub(crate) rob: ROB,
    eu: ExecutionUnits,
    cdb: CDB,
    events: Vec<Event>,
}

impl Backend {
    pub(crate) fn new(cpu_config: &CPUConfig,
                      fu_config: &FUConfig,
                      instr_queue: Rc<RefCell<InstrQueue>>,
                      arch_reg_file: Rc<RefCell<ArgRegFile>>,
                      perf_counters: Rc<RefCell<PerfCounters>>) -> Backend {
        Backend {
            instr_queue,
            arch_reg_file,
            perf_counters,
            rs_pools: RSPools::new(|class| fu_config.station_count(class)),
            rat: RAT::new(cpu_config.arch_reg_count),
            rob: ROB::new(cpu_config.rob_capacity),
            eu: ExecutionUnits::new(fu_config, cpu_config.load_value),
            cdb: CDB::new(),
            events: Vec::new(),
        }
    }

    // The phases run in reverse pipeline order: a tag freed by retire can't be
    // confused with a new allocation, and a value on the CDB is seen by
    // execute before issue allocates a new consumer.
    pub(crate) fn do_cycle(&mut self) {
        self.cycle_retire();
        self.cycle_write_result();
        self.cycle_execute();
        self.cycle_issue();
    }

    /// The events of the cycles since the last call, oldest first.
    pub(crate) fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.rob.is_empty() && self.rs_pools.busy_count() == 0
    }

    fn emit(&mut self, event: Event) {
        debug!("{}", event);
        self.events.push(event);
    }

    // Issues the oldest pending instruction, if the ROB and its station pool have room.
    pub(crate) fn cycle_issue(&mut self) {
        let instr = match self.instr_queue.borrow().peek() {
            Some(instr) => Rc::clone(instr),
            None => return,
        };

        let class = instr.opcode.unit_class();
        let stall = if self.rob.is_full() {
            Some(StallCause::ROBFull)
        } else if !self.rs_pools.pool(class).has_idle() {
            Some(StallCause::NoFreeStation(class))
        } else {
            None
        };

        if let Some(cause) = stall {
            self.perf_counters.borrow_mut().stall_cnt += 1;
            self.emit(Event::Stalled { seq: instr.seq, cause });
            return;
        }

        let (tag, rs_index) = match (self.rob.allocate(&instr), self.rs_pools.pool_mut(class).allocate()) {
            (Some(tag), Some(rs_index)) => (tag, rs_index),
            _ => unreachable!("Backend: resources were checked before allocation"),
        };

        // Register renaming of the source operands
        let source = [
            self.rename_source(instr.src1_reg),
            self.rename_source(instr.second_source_reg()),
        ];

        let rs = self.rs_pools.pool_mut(class).get_mut(rs_index);
        rs.opcode = Some(instr.opcode);
        rs.rob_tag = tag;
        rs.seq = instr.seq;
        rs.offset = instr.immediate;
        rs.source = source;
        debug!("{} station {}: {}", class, rs_index, rs);

        // Register renaming of the sink; a store writes memory, not a register.
        if let Some(sink) = instr.sink_reg() {
            self.rat.set(sink, tag);
        }

        self.instr_queue.borrow_mut().head_bump();
        self.perf_counters.borrow_mut().issue_cnt += 1;
        self.emit(Event::Issued { tag, instr });
    }

    fn rename_source(&self, arch_reg: Option<RegisterType>) -> SourceOperand {
        let arch_reg = match arch_reg {
            Some(arch_reg) => arch_reg,
            None => return SourceOperand::Value(0.0),
        };

        let tag = self.rat.get(arch_reg);
        if tag == NO_TAG {
            return SourceOperand::Value(self.arch_reg_file.borrow().get_value(arch_reg));
        }

        // The producer may have finished (and even broadcast) already; its
        // value then sits in the rob until it retires.
        let rob_slot = self.rob.get(tag);
        if rob_slot.state == ROBSlotState::EXECUTED {
            SourceOperand::Value(rob_slot.result)
        } else {
            SourceOperand::Pending(tag)
        }
    }

    // Advances every busy station; pools are visited Add/Sub, Mul/Div, Load, Store.
    pub(crate) fn cycle_execute(&mut self) {
        let mut events = Vec::new();

        for pool in self.rs_pools.iter_mut() {
            for rs in pool.iter_mut() {
                if !rs.is_busy() {
                    continue;
                }

                let opcode = match rs.opcode {
                    Some(opcode) => opcode,
                    None => continue,
                };

                let rob_slot = self.rob.get_mut(rs.rob_tag);
                let outcome = self.eu.cycle(rs, rob_slot);

                if outcome.started && opcode != Opcode::SD {
                    events.push(Event::ExecutionStarted { tag: rs.rob_tag, seq: rs.seq, opcode });
                }
                if let Some(address) = outcome.address {
                    events.push(Event::AddressResolved { tag: rs.rob_tag, seq: rs.seq, address });
                }
                if let Some(value) = outcome.completed {
                    events.push(Event::ExecutionCompleted { tag: rs.rob_tag, seq: rs.seq, opcode, value });
                }
            }
        }

        let completed = events.iter().filter(|e| matches!(e, Event::ExecutionCompleted { .. })).count();
        self.perf_counters.borrow_mut().execute_cnt += completed as u64;

        for event in events {
            self.emit(event);
        }
    }

    pub(crate) fn cycle_write_result(&mut self) {
        self.cdb.clear();
        let mut released: Vec<(UnitClass, u16)> = Vec::new();
        let mut events = Vec::new();

        // 1. collect the finished register producers; the order is Add/Sub, Mul/Div, Load
        for class in [UnitClass::AddSub, UnitClass::MulDiv, UnitClass::Load] {
            for rs in self.rs_pools.pool(class).iter() {
                if !rs.is_busy() {
                    continue;
                }

                if let Some(value) = rs.result {
                    if self.cdb.publish(rs.rob_tag, value) {
                        released.push((class, rs.index));
                        events.push(Event::Broadcast { tag: rs.rob_tag, seq: rs.seq, value });
                    }
                }
            }
        }

        // 2. forward the broadcast values to every waiting station, stores included
        if !self.cdb.is_empty() {
            for pool in self.rs_pools.iter_mut() {
                for rs in pool.iter_mut() {
                    if rs.is_busy() {
                        self.cdb.forward(rs);
                    }
                }
            }
        }

        // 3. a store is complete once its address is known and its value arrived
        for rs in self.rs_pools.pool(UnitClass::Store).iter() {
            if !rs.is_busy() || !rs.operands_ready() {
                continue;
            }

            let rob_slot = self.rob.get_mut(rs.rob_tag);
            if rob_slot.address_resolved && rob_slot.state == ROBSlotState::EXECUTING {
                let value = rs.source[1].value();
                rob_slot.result = value;
                rob_slot.state = ROBSlotState::EXECUTED;
                released.push((UnitClass::Store, rs.index));
                events.push(Event::StoreReady { tag: rs.rob_tag, seq: rs.seq, address: rob_slot.address, value });
            }
        }

        // 4. release the stations that are done
        for (class, rs_index) in released {
            self.rs_pools.pool_mut(class).deallocate(rs_index);
        }

        self.perf_counters.borrow_mut().broadcast_cnt += self.cdb.iter().count() as u64;
        for event in events {
            self.emit(event);
        }
    }

    // Retires the head of the rob when it has executed; at most one per cycle.
    pub(crate) fn cycle_retire(&mut self) {
        if !self.rob.head_has_executed() {
            return;
        }

        let tag = self.rob.head_tag();
        let rob_slot = self.rob.advance_head();
        let seq = rob_slot.seq();

        let event = match rob_slot.opcode() {
            Some(Opcode::SD) => {
                // there is no memory subsystem; the write only shows up as an event
                Event::CommittedStore { tag, seq, address: rob_slot.address, value: rob_slot.result }
            }
            Some(opcode) => {
                let reg = match rob_slot.target {
                    Some(reg) => reg,
                    None => unreachable!("Backend: a register writing instruction without a target retired"),
                };

                self.arch_reg_file.borrow_mut().set_value(reg, rob_slot.result);
                // only when the rat still points to this instruction may the entry be cleared
                self.rat.clear(reg, tag);
                Event::Committed { tag, seq, opcode, reg, value: rob_slot.result }
            }
            None => unreachable!("Backend: retired an empty rob slot"),
        };

        self.perf_counters.borrow_mut().retire_cnt += 1;
        self.emit(event);
    }

    pub(crate) fn snapshot(&self, cycle: u64) -> CycleSnapshot {
        let mut stations = Vec::new();
        for pool in self.rs_pools.iter() {
            for rs in pool.iter().filter(|rs| rs.is_busy()) {
                stations.push(RSSnapshot {
                    class: pool.class,
                    index: rs.index,
                    opcode: rs.opcode,
                    source_tags: [rs.source[0].tag(), rs.source[1].tag()],
                    source_values: [rs.source[0].value(), rs.source[1].value()],
                    rob_tag: rs.rob_tag,
                    cycles_remaining: rs.cycles_remaining,
                    effective_address: rs.effective_address,
                });
            }
        }

        let rob = self
            .rob
            .iter()
            .map(|(tag, slot)| ROBSnapshot {
                tag,
                opcode: slot.opcode(),
                state: slot.state,
                target: slot.target,
                value: slot.result,
                address: if slot.address_resolved { Some(slot.address) } else { None },
            })
            .collect();

        CycleSnapshot { cycle, stations, rob, rat: self.rat.pending().collect() }
    }
}
