use std::fs;
use std::path::Path;
use std::rc::Rc;

use log::{debug, warn};
use regex::Regex;
use thiserror::Error;

use crate::cpu::{CPUConfig, FUConfig};
use crate::instructions::instructions::{get_opcode, get_register, Instr, Opcode, Program, RegisterType};

#[derive(Error, Debug)]
pub(crate) enum LoadError {
    #[error("{0}")]
    NotFoundError(String),
    #[error("{0}")]
    IOError(String),
    #[error("invalid line pattern: {0}")]
    PatternError(#[from] regex::Error),
}

/// What a program file describes: the functional unit configuration and the
/// instructions to run.
pub(crate) struct Workload {
    pub(crate) fu_config: FUConfig,
    pub(crate) program: Program,
}

#[derive(Clone, Copy, PartialEq, Debug)]
enum Section {
    None,
    Config,
    Instructions,
}

struct Loader {
    arch_reg_count: u16,
    // `offset(Rb)`
    memory_operand: Regex,
    // `KEY OPCODE VALUE`
    config_record: Regex,
    fu_config: FUConfig,
    code: Vec<Rc<Instr>>,
}

impl Loader {
    fn new(cpu_config: &CPUConfig) -> Result<Loader, LoadError> {
        Ok(Loader {
            arch_reg_count: cpu_config.arch_reg_count,
            memory_operand: Regex::new(r"^([+-]?\d+)\(([A-Za-z]\d+)\)$")?,
            config_record: Regex::new(r"^(\S+)\s+(\S+)\s+(\S+)")?,
            fu_config: FUConfig::default(),
            code: Vec::new(),
        })
    }

    fn load(mut self, src: &str) -> Workload {
        let mut section = Section::None;

        for (line_idx, raw_line) in src.lines().enumerate() {
            let line_nr = line_idx + 1;

            // '#' comments out the rest of the line
            let line = match raw_line.find('#') {
                Some(pos) => &raw_line[..pos],
                None => raw_line,
            }
            .trim();

            if line.contains("CONFIG_BEGIN") {
                section = Section::Config;
                continue;
            } else if line.contains("CONFIG_END") || line.contains("INSTRUCTIONS_END") {
                section = Section::None;
                continue;
            } else if line.contains("INSTRUCTIONS_BEGIN") {
                section = Section::Instructions;
                continue;
            }

            if line.is_empty() {
                continue;
            }

            match section {
                Section::Config => self.parse_config_record(line, line_nr),
                Section::Instructions => self.parse_instr(line, line_nr),
                Section::None => {}
            }
        }

        debug!("Loaded {} instructions", self.code.len());
        Workload { fu_config: self.fu_config, program: Program::new(self.code) }
    }

    fn parse_config_record(&mut self, line: &str, line_nr: usize) {
        let captures = match self.config_record.captures(line) {
            Some(captures) => captures,
            None => {
                warn!("Line {}: malformed configuration record '{}', skipped", line_nr, line);
                return;
            }
        };

        let key = &captures[1];
        let opcode = match get_opcode(&captures[2]) {
            Some(opcode) => opcode,
            None => {
                warn!("Line {}: unknown opcode '{}', skipped", line_nr, &captures[2]);
                return;
            }
        };

        match key {
            "CYCLES" => match captures[3].parse::<u32>() {
                Ok(latency) => {
                    self.fu_config.latencies.insert(opcode, latency);
                }
                Err(_) => warn!("Line {}: invalid latency '{}', skipped", line_nr, &captures[3]),
            },
            "UNITS" | "MEM_UNITS" => match captures[3].parse::<u16>() {
                Ok(count) => {
                    // last record for a pool wins
                    self.fu_config.station_counts.insert(opcode.unit_class(), count);
                }
                Err(_) => warn!("Line {}: invalid unit count '{}', skipped", line_nr, &captures[3]),
            },
            _ => warn!("Line {}: unknown configuration key '{}', skipped", line_nr, key),
        }
    }

    fn parse_instr(&mut self, line: &str, line_nr: usize) {
        let tokens: Vec<&str> = line
            .split(|c: char| c.is_whitespace() || c == ',')
            .filter(|token| !token.is_empty())
            .collect();

        let opcode = match tokens.first().and_then(|mnemonic| get_opcode(mnemonic)) {
            Some(opcode) => opcode,
            None => {
                warn!("Line {}: unknown instruction '{}', skipped", line_nr, line);
                return;
            }
        };

        let parsed = match opcode {
            Opcode::LD | Opcode::SD => self.parse_memory_instr(&tokens),
            _ => self.parse_arithmetic_instr(&tokens),
        };

        match parsed {
            Some((dest_reg, src1_reg, src2_reg, immediate)) => {
                let instr = Instr {
                    opcode,
                    dest_reg: Some(dest_reg),
                    src1_reg: Some(src1_reg),
                    src2_reg,
                    immediate,
                    seq: self.code.len(),
                    line: line_nr,
                };
                self.code.push(Rc::new(instr));
            }
            None => warn!("Line {}: invalid operands in '{}', skipped", line_nr, line),
        }
    }

    // OP Fd, Fs, Ft
    fn parse_arithmetic_instr(&self, tokens: &[&str]) -> Option<(RegisterType, RegisterType, Option<RegisterType>, i64)> {
        if tokens.len() < 4 {
            return None;
        }

        let dest = self.parse_register(tokens[1])?;
        let src1 = self.parse_register(tokens[2])?;
        let src2 = self.parse_register(tokens[3])?;
        Some((dest, src1, Some(src2), 0))
    }

    // LD Fd, off(Rb) and SD Fs, off(Rb); also `off Rb`
    fn parse_memory_instr(&self, tokens: &[&str]) -> Option<(RegisterType, RegisterType, Option<RegisterType>, i64)> {
        if tokens.len() < 3 {
            return None;
        }

        let reg = self.parse_register(tokens[1])?;

        if let Some(captures) = self.memory_operand.captures(tokens[2]) {
            let offset = captures[1].parse::<i64>().ok()?;
            let base = self.parse_register(&captures[2])?;
            return Some((reg, base, None, offset));
        }

        if tokens.len() < 4 {
            return None;
        }

        let offset = tokens[2].parse::<i64>().ok()?;
        let base = self.parse_register(tokens[3])?;
        Some((reg, base, None, offset))
    }

    fn parse_register(&self, token: &str) -> Option<RegisterType> {
        get_register(token, self.arch_reg_count)
    }
}

pub(crate) fn load(cpu_config: &CPUConfig, path: &str) -> Result<Workload, LoadError> {
    if !Path::new(path).exists() {
        return Err(LoadError::NotFoundError(format!("File '{}' does not exist", path)));
    }

    let src = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) => {
            return Err(LoadError::IOError(format!("Error reading file '{}': {}", path, err)));
        }
    };

    load_from_string(cpu_config, &src)
}

pub(crate) fn load_from_string(cpu_config: &CPUConfig, src: &str) -> Result<Workload, LoadError> {
    let loader = Loader::new(cpu_config)?;
    Ok(loader.load(src))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::instructions::instructions::UnitClass;

    fn load_src(src: &str) -> Workload {
        load_from_string(&CPUConfig::default(), src).unwrap()
    }

    #[test]
    fn test_config_section() {
        let src = r#"
CONFIG_BEGIN
CYCLES ADDD 2
CYCLES MULTD 10
UNITS ADDD 3
UNITS MULTD 2
MEM_UNITS LD 2
MEM_UNITS SD 1
CONFIG_END
"#;
        let workload = load_src(src);
        let fu_config = workload.fu_config;
        assert_eq!(fu_config.latency(Opcode::ADDD), 2);
        assert_eq!(fu_config.latency(Opcode::MULTD), 10);
        assert_eq!(fu_config.latency(Opcode::DIVD), 1);
        assert_eq!(fu_config.station_count(UnitClass::AddSub), 3);
        assert_eq!(fu_config.station_count(UnitClass::MulDiv), 2);
        assert_eq!(fu_config.station_count(UnitClass::Load), 2);
        assert_eq!(fu_config.station_count(UnitClass::Store), 1);
        assert!(workload.program.is_empty());
    }

    #[test]
    fn test_config_skips_bad_records() {
        let src = r#"
CONFIG_BEGIN
CYCLES FOO 3
CYCLES ADDD -2
SPEED ADDD 4
UNITS SUBD 1
UNITS ADDD 2
CYCLES
CONFIG_END
"#;
        let fu_config = load_src(src).fu_config;
        assert_eq!(fu_config.latency(Opcode::ADDD), 1);
        assert!(fu_config.latencies.is_empty());
        // ADDD and SUBD share a pool; the last record wins
        assert_eq!(fu_config.station_count(UnitClass::AddSub), 2);
    }

    #[test]
    fn test_instructions() {
        let src = r#"
INSTRUCTIONS_BEGIN
# a comment
ADDD F2, F1, F3
subd F4 F2 F6   # trailing comment
LD F6, 34(R2)
LD F8 45 R3
SD F4, -8(F1)
INSTRUCTIONS_END
"#;
        let program = load_src(src).program;
        assert_eq!(program.len(), 5);

        let add = program.get_instr(0);
        assert_eq!(add.opcode, Opcode::ADDD);
        assert_eq!((add.dest_reg, add.src1_reg, add.src2_reg), (Some(2), Some(1), Some(3)));
        assert_eq!(add.seq, 0);
        assert_eq!(add.line, 4);

        let sub = program.get_instr(1);
        assert_eq!(sub.opcode, Opcode::SUBD);
        assert_eq!(sub.src2_reg, Some(6));

        let ld = program.get_instr(2);
        assert_eq!((ld.dest_reg, ld.src1_reg, ld.src2_reg, ld.immediate), (Some(6), Some(2), None, 34));

        let ld_split = program.get_instr(3);
        assert_eq!((ld_split.dest_reg, ld_split.src1_reg, ld_split.immediate), (Some(8), Some(3), 45));

        let sd = program.get_instr(4);
        assert_eq!((sd.dest_reg, sd.src1_reg, sd.immediate), (Some(4), Some(1), -8));
        assert_eq!(sd.seq, 4);
        assert_eq!(format!("{}", sd), "SD F4, -8(F1)");
    }

    #[test]
    fn test_invalid_lines_are_skipped() {
        let src = r#"
ADDD F1, F1, F1
INSTRUCTIONS_BEGIN
NOP
ADDD F2, F1
ADDD F40, F1, F1
MULTD F2, F1, X
LD F1, (R2)
ADDD F3, F1, F2
INSTRUCTIONS_END
ADDD F1, F1, F1
"#;
        let program = load_src(src).program;
        assert_eq!(program.len(), 1);
        assert_eq!(program.get_instr(0).dest_reg, Some(3));
        assert_eq!(program.get_instr(0).seq, 0);
    }

    #[test]
    fn test_register_count_is_configurable() {
        let mut cpu_config = CPUConfig::default();
        cpu_config.arch_reg_count = 4;
        cpu_config.initial_regs.clear();
        let src = "INSTRUCTIONS_BEGIN\nADDD F3, F1, F2\nADDD F4, F1, F2\nINSTRUCTIONS_END\n";
        let program = load_from_string(&cpu_config, src).unwrap().program;
        assert_eq!(program.len(), 1);
    }

    #[test]
    fn test_load_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "CONFIG_BEGIN").unwrap();
        writeln!(file, "UNITS ADDD 1").unwrap();
        writeln!(file, "CONFIG_END").unwrap();
        writeln!(file, "INSTRUCTIONS_BEGIN").unwrap();
        writeln!(file, "ADDD F2, F1, F1").unwrap();
        writeln!(file, "INSTRUCTIONS_END").unwrap();

        let workload = load(&CPUConfig::default(), file.path().to_str().unwrap()).unwrap();
        assert_eq!(workload.program.len(), 1);
        assert_eq!(workload.fu_config.station_count(UnitClass::AddSub), 1);
    }

    #[test]
    fn test_load_missing_file() {
        match load(&CPUConfig::default(), "/nonexistent/program.txt") {
            Err(LoadError::NotFoundError(_)) => {}
            _ => panic!("expected NotFoundError"),
        }
    }
}
