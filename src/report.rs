use std::fmt::Write;

use crate::backend::event::Event;
use crate::backend::reorder_buffer::ROBSlotState;
use crate::backend::snapshot::CycleSnapshot;
use crate::cpu::{PerfCounters, RunSummary, Trace};
use crate::instructions::instructions::{mnemonic, Tag, UnitClass, NO_TAG};

/// Prints the human readable trace of a run to stdout. What gets printed is
/// selected by the trace flags; the final summary is always printed.
pub(crate) struct Reporter {
    trace: Trace,
}

impl Reporter {
    pub(crate) fn new(trace: Trace) -> Self {
        Self { trace }
    }

    pub(crate) fn cycle_begin(&self, cycle: u64) {
        if self.trace.cycle {
            println!("\n=== CYCLE {} ===", cycle);
        }
    }

    pub(crate) fn event(&self, event: &Event) {
        if self.is_traced(event) {
            println!("{}", event);
        }
    }

    fn is_traced(&self, event: &Event) -> bool {
        match event {
            Event::Issued { .. } => self.trace.issue,
            Event::Stalled { .. } => self.trace.stall,
            Event::ExecutionStarted { .. } | Event::ExecutionCompleted { .. } | Event::AddressResolved { .. } => self.trace.execute,
            Event::Broadcast { .. } | Event::StoreReady { .. } => self.trace.write_result,
            Event::Committed { .. } | Event::CommittedStore { .. } => self.trace.retire,
        }
    }

    pub(crate) fn snapshot(&self, snapshot: &CycleSnapshot) {
        print!("{}", format_snapshot(snapshot));
    }

    pub(crate) fn perf_counters(&self, perf_counters: &PerfCounters) {
        println!("[Cycles:{}][Issued={}][Stalls={}][Executed={}][Broadcast={}][Retired={}][IPC={:.2}]",
                 perf_counters.cycle_cnt,
                 perf_counters.issue_cnt,
                 perf_counters.stall_cnt,
                 perf_counters.execute_cnt,
                 perf_counters.broadcast_cnt,
                 perf_counters.retire_cnt,
                 perf_counters.retire_cnt as f32 / perf_counters.cycle_cnt.max(1) as f32
        );
    }

    pub(crate) fn summary(&self, summary: &RunSummary) {
        print!("{}", format_summary(summary));
    }
}

pub(crate) fn station_name(class: UnitClass, index: u16) -> String {
    format!("{}{}", class.prefix(), index + 1)
}

fn format_tag(tag: Tag) -> String {
    if tag == NO_TAG {
        String::from("-")
    } else {
        format!("#{}", tag)
    }
}

fn state_name(state: ROBSlotState) -> &'static str {
    match state {
        ROBSlotState::ISSUED => "Issued",
        ROBSlotState::EXECUTING => "Executing",
        ROBSlotState::EXECUTED => "ResultReady",
        ROBSlotState::RETIRED => "Retired",
    }
}

pub(crate) fn format_snapshot(snapshot: &CycleSnapshot) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "--- Reservation Stations ---");
    let _ = writeln!(out, "{:<5} {:<6} {:>10} {:>10} {:>4} {:>4} {:>5} {:>7} {:>8}",
                     "Name", "Op", "Vj", "Vk", "Qj", "Qk", "Dest", "Cycles", "Address");
    for rs in &snapshot.stations {
        let opcode = rs.opcode.map(mnemonic).unwrap_or("-");
        let _ = writeln!(out, "{:<5} {:<6} {:>10.2} {:>10.2} {:>4} {:>4} {:>5} {:>7} {:>8}",
                         station_name(rs.class, rs.index),
                         opcode,
                         rs.source_values[0],
                         rs.source_values[1],
                         format_tag(rs.source_tags[0]),
                         format_tag(rs.source_tags[1]),
                         format_tag(rs.rob_tag),
                         rs.cycles_remaining,
                         rs.effective_address);
    }

    let _ = writeln!(out, "--- Reorder Buffer ---");
    let _ = writeln!(out, "{:<5} {:<6} {:<12} {:>6} {:>10} {:>8}", "Tag", "Op", "State", "Dest", "Value", "Address");
    for slot in &snapshot.rob {
        let opcode = slot.opcode.map(mnemonic).unwrap_or("-");
        let target = slot.target.map(|reg| format!("F{}", reg)).unwrap_or_else(|| String::from("-"));
        let address = slot.address.map(|address| address.to_string()).unwrap_or_else(|| String::from("-"));
        let _ = writeln!(out, "{:<5} {:<6} {:<12} {:>6} {:>10.2} {:>8}",
                         format_tag(slot.tag),
                         opcode,
                         state_name(slot.state),
                         target,
                         slot.value,
                         address);
    }

    let _ = writeln!(out, "--- Register Status ---");
    if snapshot.rat.is_empty() {
        let _ = writeln!(out, "(none)");
    }
    for (reg, tag) in &snapshot.rat {
        let _ = writeln!(out, "F{} <- {}", reg, format_tag(*tag));
    }

    out
}

pub(crate) fn format_summary(summary: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\n=== SIMULATION COMPLETE in {} CYCLES ===", summary.cycles);
    let _ = writeln!(out, "Instructions retired: {}", summary.retired);
    let _ = writeln!(out, "--- Final FP register values ---");
    for (reg, value) in summary.registers.iter().enumerate() {
        let _ = writeln!(out, "F{}: {:.2}", reg, value);
    }
    out
}
