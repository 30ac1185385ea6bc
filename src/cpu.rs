use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::error::Error;
use std::fmt;
use std::fs::File;
use std::rc::Rc;

use log::{debug, error, info};
use serde::Deserialize;
use thiserror::Error;

use crate::backend::backend::Backend;
use crate::backend::event::Event;
use crate::instructions::instructions::{InstrQueue, Opcode, Program, RegisterType, UnitClass, WordType};
use crate::report::Reporter;

pub(crate) struct PerfCounters {
    pub issue_cnt: u64,
    pub stall_cnt: u64,
    pub execute_cnt: u64,
    pub broadcast_cnt: u64,
    pub retire_cnt: u64,
    pub cycle_cnt: u64,
}

impl PerfCounters {
    pub fn new() -> Self {
        Self { issue_cnt: 0, stall_cnt: 0, execute_cnt: 0, broadcast_cnt: 0, retire_cnt: 0, cycle_cnt: 0 }
    }
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub(crate) struct Trace {
    pub issue: bool,
    pub execute: bool,
    pub write_result: bool,
    pub retire: bool,
    pub stall: bool,
    // print the backend tables and the counters at the end of every cycle
    pub cycle: bool,
}

impl Default for Trace {
    fn default() -> Self {
        Self { issue: true, execute: true, write_result: true, retire: true, stall: true, cycle: true }
    }
}

impl Trace {
    #[cfg(test)]
    pub fn silent() -> Self {
        Self { issue: false, execute: false, write_result: false, retire: false, stall: false, cycle: false }
    }
}

#[derive(Clone, Deserialize, Debug)]
#[serde(default)]
pub(crate) struct CPUConfig {
    // the number of architectural floating point registers
    pub(crate) arch_reg_count: u16,
    // the capacity of the reorder buffer
    pub(crate) rob_capacity: u16,
    // a run that needs more cycles than this is considered deadlocked
    pub(crate) max_cycles: u64,
    // the value every load produces
    pub(crate) load_value: WordType,
    // the initial value of a register not listed in initial_regs
    pub(crate) default_reg_value: WordType,
    pub(crate) initial_regs: BTreeMap<RegisterType, WordType>,
    // if processing of a single instruction should be traced (printed)
    pub(crate) trace: Trace,
}

impl Default for CPUConfig {
    fn default() -> Self {
        let initial_regs = BTreeMap::from([(1, 1000.0), (2, 2000.0), (4, 2.0), (6, 10.0), (8, 5.0)]);
        Self {
            arch_reg_count: 32,
            rob_capacity: 16,
            max_cycles: 500,
            load_value: 99.0,
            default_reg_value: 1.0,
            initial_regs,
            trace: Trace::default(),
        }
    }
}

#[derive(Error, Debug, PartialEq)]
pub(crate) enum ConfigError {
    #[error("rob_capacity must be larger than 0")]
    ZeroROBCapacity,
    #[error("arch_reg_count must be larger than 0")]
    ZeroRegisters,
    #[error("max_cycles must be larger than 0")]
    ZeroMaxCycles,
    #[error("initial_regs: F{reg} is out of range, there are {count} registers")]
    RegisterOutOfRange { reg: RegisterType, count: u16 },
}

impl CPUConfig {
    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.rob_capacity == 0 {
            return Err(ConfigError::ZeroROBCapacity);
        }
        if self.arch_reg_count == 0 {
            return Err(ConfigError::ZeroRegisters);
        }
        if self.max_cycles == 0 {
            return Err(ConfigError::ZeroMaxCycles);
        }
        if let Some(&reg) = self.initial_regs.keys().find(|&&reg| reg >= self.arch_reg_count) {
            return Err(ConfigError::RegisterOutOfRange { reg, count: self.arch_reg_count });
        }
        Ok(())
    }
}

pub(crate) fn load_cpu_config(file_path: &str) -> Result<CPUConfig, Box<dyn Error>> {
    let file = File::open(file_path)?;
    let config: CPUConfig = serde_yaml::from_reader(file)?;
    config.validate()?;
    Ok(config)
}

/// Latencies and pool sizes, as configured by the program file.
#[derive(Clone, Default, Debug)]
pub(crate) struct FUConfig {
    pub(crate) latencies: HashMap<Opcode, u32>,
    pub(crate) station_counts: HashMap<UnitClass, u16>,
}

impl FUConfig {
    // An opcode without a configured latency, or with latency 0, takes 1 cycle.
    pub(crate) fn latency(&self, opcode: Opcode) -> u32 {
        self.latencies.get(&opcode).copied().unwrap_or(1).max(1)
    }

    pub(crate) fn station_count(&self, class: UnitClass) -> u16 {
        self.station_counts.get(&class).copied().unwrap_or(0)
    }
}

/// Where a run ended: after the last retirement, or at the cycle ceiling.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct RunSummary {
    pub(crate) cycles: u64,
    pub(crate) retired: usize,
    pub(crate) registers: Vec<WordType>,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} retired after {} cycles", self.retired, self.cycles)
    }
}

#[derive(Error, Debug, PartialEq)]
pub(crate) enum SimError {
    // the partial summary still carries the register file at the ceiling
    #[error("deadlock: {summary} of {total} instructions")]
    Deadlock { summary: RunSummary, total: usize },
}

pub(crate) struct CPU {
    pub(crate) backend: Backend,
    pub(crate) instr_queue: Rc<RefCell<InstrQueue>>,
    pub(crate) arch_reg_file: Rc<RefCell<ArgRegFile>>,
    pub(crate) perf_counters: Rc<RefCell<PerfCounters>>,
    // every event of the run, with the cycle it happened in
    pub(crate) event_log: Vec<(u64, Event)>,
    max_cycles: u64,
    trace: Trace,
    reporter: Reporter,
}

impl CPU {
    pub(crate) fn new(cpu_config: &CPUConfig, fu_config: &FUConfig) -> CPU {
        let instr_queue = Rc::new(RefCell::new(InstrQueue::new()));

        let perf_counters = Rc::new(RefCell::new(PerfCounters::new()));

        let arch_reg_file = Rc::new(RefCell::new(ArgRegFile::new(cpu_config)));

        let backend = Backend::new(
            cpu_config,
            fu_config,
            Rc::clone(&instr_queue),
            Rc::clone(&arch_reg_file),
            Rc::clone(&perf_counters),
        );

        CPU {
            backend,
            instr_queue,
            arch_reg_file,
            perf_counters,
            event_log: Vec::new(),
            max_cycles: cpu_config.max_cycles,
            trace: cpu_config.trace.clone(),
            reporter: Reporter::new(cpu_config.trace.clone()),
        }
    }

    /// Queues the program for issue, in program order.
    pub(crate) fn init(&mut self, program: &Program) {
        let mut instr_queue = self.instr_queue.borrow_mut();
        for pos in 0..program.len() {
            let instr = program.get_instr(pos);
            debug!("Queued line {}: {}", instr.line, instr);
            instr_queue.enqueue(instr);
        }
    }

    pub(crate) fn do_cycle(&mut self) {
        let cycle = {
            let mut perf_counters = self.perf_counters.borrow_mut();
            perf_counters.cycle_cnt += 1;
            perf_counters.cycle_cnt
        };

        self.reporter.cycle_begin(cycle);
        self.backend.do_cycle();

        for event in self.backend.drain_events() {
            self.reporter.event(&event);
            self.event_log.push((cycle, event));
        }

        if self.trace.cycle {
            self.reporter.snapshot(&self.backend.snapshot(cycle));
            self.reporter.perf_counters(&self.perf_counters.borrow());
        }
    }

    pub(crate) fn run(&mut self, program: &Rc<Program>) -> Result<RunSummary, SimError> {
        self.init(program);
        info!("Running {} instructions", program.len());

        loop {
            let summary = self.summary();

            if summary.retired == program.len() {
                info!("Program complete after {} cycles", summary.cycles);
                self.reporter.summary(&summary);
                return Ok(summary);
            }

            // the ceiling cycle itself still runs
            if summary.cycles > self.max_cycles {
                self.reporter.summary(&summary);
                let err = SimError::Deadlock { summary, total: program.len() };
                error!("{}", err);
                return Err(err);
            }

            self.do_cycle();
        }
    }

    /// Elapsed cycles, retired instructions and the register file as they are now.
    pub(crate) fn summary(&self) -> RunSummary {
        let perf_counters = self.perf_counters.borrow();
        RunSummary {
            cycles: perf_counters.cycle_cnt,
            retired: perf_counters.retire_cnt as usize,
            registers: self.arch_reg_file.borrow().values(),
        }
    }
}

struct ArgRegEntry {
    pub(crate) value: WordType,
}

pub struct ArgRegFile {
    entries: Vec<ArgRegEntry>,
}

impl ArgRegFile {
    pub(crate) fn new(cpu_config: &CPUConfig) -> ArgRegFile {
        let mut array = Vec::with_capacity(cpu_config.arch_reg_count as usize);
        for reg in 0..cpu_config.arch_reg_count {
            let value = cpu_config.initial_regs.get(&reg).copied().unwrap_or(cpu_config.default_reg_value);
            array.push(ArgRegEntry { value });
        }

        ArgRegFile { entries: array }
    }

    pub fn get_value(&self, reg: RegisterType) -> WordType {
        self.entries[reg as usize].value
    }

    pub fn set_value(&mut self, reg: RegisterType, value: WordType) {
        self.entries[reg as usize].value = value;
    }

    pub fn values(&self) -> Vec<WordType> {
        self.entries.iter().map(|entry| entry.value).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    #[test]
    fn test_default_register_file() {
        let reg_file = ArgRegFile::new(&CPUConfig::default());
        assert_eq!(reg_file.values().len(), 32);
        assert_eq!(reg_file.get_value(0), 1.0);
        assert_eq!(reg_file.get_value(1), 1000.0);
        assert_eq!(reg_file.get_value(2), 2000.0);
        assert_eq!(reg_file.get_value(4), 2.0);
        assert_eq!(reg_file.get_value(6), 10.0);
        assert_eq!(reg_file.get_value(8), 5.0);
        assert_eq!(reg_file.get_value(31), 1.0);
    }

    #[test]
    fn test_validate() {
        assert_eq!(CPUConfig::default().validate(), Ok(()));

        let mut config = CPUConfig::default();
        config.rob_capacity = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroROBCapacity));

        let mut config = CPUConfig::default();
        config.max_cycles = 0;
        assert_eq!(config.validate(), Err(ConfigError::ZeroMaxCycles));

        let mut config = CPUConfig::default();
        config.arch_reg_count = 8;
        assert_eq!(config.validate(), Err(ConfigError::RegisterOutOfRange { reg: 8, count: 8 }));
    }

    #[test]
    fn test_fu_config_latency() {
        let mut fu_config = FUConfig::default();
        fu_config.latencies.insert(Opcode::MULTD, 10);
        fu_config.latencies.insert(Opcode::ADDD, 0);
        assert_eq!(fu_config.latency(Opcode::MULTD), 10);
        assert_eq!(fu_config.latency(Opcode::ADDD), 1);
        assert_eq!(fu_config.latency(Opcode::LD), 1);
        assert_eq!(fu_config.station_count(UnitClass::Store), 0);
    }

    #[test]
    fn test_load_cpu_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rob_capacity: 4").unwrap();
        writeln!(file, "max_cycles: 50").unwrap();
        writeln!(file, "initial_regs:").unwrap();
        writeln!(file, "  3: 7.5").unwrap();
        writeln!(file, "trace:").unwrap();
        writeln!(file, "  cycle: false").unwrap();

        let config = load_cpu_config(file.path().to_str().unwrap()).unwrap();
        assert_eq!(config.rob_capacity, 4);
        assert_eq!(config.max_cycles, 50);
        assert_eq!(config.arch_reg_count, 32);
        assert_eq!(config.initial_regs.get(&3), Some(&7.5));
        assert!(!config.trace.cycle);
        assert!(config.trace.issue);
    }

    #[test]
    fn test_load_cpu_config_rejects_invalid() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rob_capacity: 0").unwrap();
        assert!(load_cpu_config(file.path().to_str().unwrap()).is_err());

        assert!(load_cpu_config("/nonexistent/cpu.yaml").is_err());
    }
}
