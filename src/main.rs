use std::path::PathBuf;
use std::process::exit;
use std::rc::Rc;

use log::{error, info};
use structopt::StructOpt;

use crate::cpu::{CPU, CPUConfig, load_cpu_config};
use crate::loader::loader::{load, LoadError};

mod cpu;
mod loader;
mod backend;
mod instructions;
mod report;

#[derive(StructOpt, Debug)]
#[structopt(name = "Tomasulo Simulator")]
struct Opt {
    /// Path of the file with the unit configuration and the program
    #[structopt(parse(from_os_str))]
    file: PathBuf,

    /// Sets a custom engine config file
    #[structopt(short, long, parse(from_os_str))]
    config: Option<PathBuf>,
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let opt = Opt::from_args();

    let cpu_config = match &opt.config {
        Some(config_path) => {
            let cpu_config_path = config_path.to_string_lossy();
            match load_cpu_config(&cpu_config_path) {
                Ok(config) => config,
                Err(err) => {
                    error!("Failed to load {}. Cause: {}", cpu_config_path, err);
                    exit(1);
                }
            }
        }
        None => CPUConfig::default(),
    };

    let path = opt.file.to_string_lossy();
    info!("Loading {}", path);
    let workload = match load(&cpu_config, &path) {
        Ok(workload) => workload,
        Err(err) => {
            println!("Loading program '{}' failed.", path);
            match err {
                LoadError::NotFoundError(msg) | LoadError::IOError(msg) => {
                    println!("{}", msg);
                }
                LoadError::PatternError(err) => {
                    println!("{}", err);
                }
            }
            exit(1);
        }
    };

    if workload.program.is_empty() {
        println!("No valid instructions found. Nothing to simulate.");
        exit(0);
    }

    let program = Rc::new(workload.program);
    let mut cpu = CPU::new(&cpu_config, &workload.fu_config);
    if let Err(err) = cpu.run(&program) {
        println!("Simulation aborted: {}", err);
        exit(1);
    }
}
