//! `fat` - move files between CP/M drives and FAT volumes.
//!
//! Runs one command against a simulated machine whose native drives are
//! host directories or ZIP archives and whose disk units are image files.

mod logger;
mod terminal;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;

use cpmfat_core::{
    Bridge, BiosKind, CpmResult, DriveConfig, FsError, FsResult, HardwareIdentity,
    MachineConfig, Session, UnitConfig,
};

use terminal::TerminalConsole;

const EXIT_USAGE: u8 = 4;
const EXIT_ERROR: u8 = 8;

#[derive(Parser, Debug)]
#[command(name = "fat", version, about = "CP/M FAT utility")]
struct Args {
    /// Machine configuration (JSON)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Native drive backed by a host directory
    #[arg(short, long, value_name = "L=DIR")]
    drive: Vec<String>,

    /// Native drive seeded from a ZIP archive
    #[arg(short, long, value_name = "L=ZIP")]
    archive: Vec<String>,

    /// Disk unit backed by an image file; MEDIA is fixed, floppy, rom or ram
    #[arg(short, long, value_name = "IMAGE[:MEDIA]")]
    unit: Vec<String>,

    /// Firmware dialect
    #[arg(long)]
    bios: Option<BiosKind>,

    /// Clock: host, none or "YYYY-MM-DD HH:MM:SS"
    #[arg(long)]
    rtc: Option<String>,

    /// Enable trace logging
    #[arg(short, long)]
    trace: bool,

    /// Command and its parameters
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    command: Vec<String>,
}

impl Args {
    fn machine_config(&self) -> CpmResult<MachineConfig> {
        let mut config = match &self.config {
            Some(path) => MachineConfig::load(path)?,
            None => MachineConfig::default(),
        };

        let mut overrides = MachineConfig {
            bios: self.bios,
            rtc: self.rtc.clone(),
            ..Default::default()
        };
        for arg in &self.drive {
            overrides.drives.push(DriveConfig::host(arg)?);
        }
        for arg in &self.archive {
            overrides.drives.push(DriveConfig::archive(arg)?);
        }
        for arg in &self.unit {
            overrides.units.push(UnitConfig::parse(arg)?);
        }
        config.merge(overrides);
        Ok(config)
    }
}

fn usage(identity: HardwareIdentity) {
    println!(
        "\nCP/M FAT Utility v{}, [{}]\n\
         \n\
         Usage: fat [options] <cmd> <parms>\n\
         \x20 fat DIR <path>\n\
         \x20 fat COPY <src> <dst>\n\
         \x20 fat REN <from> <to>\n\
         \x20 fat DEL <path>\n\
         \x20 fat MD <path>\n\
         \x20 fat FORMAT <drv>\n\
         \n\
         CP/M filespec: <d>:FILENAME.EXT (<d> is CP/M drive letter A-P)\n\
         FAT filespec:  <u>:/DIR/FILENAME.EXT (<u> is disk unit #)",
        env!("CARGO_PKG_VERSION"),
        identity
    );
}

fn run(session: &Session, verb: &str, params: &[String]) -> FsResult<()> {
    let arg = |i: usize| {
        params
            .get(i)
            .map(String::as_str)
            .ok_or(FsError::InvalidParameter)
    };

    match verb.to_ascii_uppercase().as_str() {
        "DIR" => session.dir(arg(0)?).map(drop),
        "COPY" => session.copy(arg(0)?, arg(1)?).map(drop),
        "REN" => session.rename(arg(0)?, arg(1)?).map(drop),
        "DEL" | "ERA" => session.delete(arg(0)?),
        "MD" => session.make_dir(arg(0)?),
        "FORMAT" => session.format(arg(0)?).map(drop),
        _ => Err(FsError::InvalidParameter),
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    logger::init(args.trace);

    let config = match args.machine_config() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("fat: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let Some((verb, params)) = args.command.split_first() else {
        usage(config.identity());
        return ExitCode::from(EXIT_USAGE);
    };

    let machine = match config.build(TerminalConsole::new()) {
        Ok(machine) => machine.into_shared(),
        Err(e) => {
            eprintln!("fat: {}", e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let session = Session::new(Bridge::from(machine.clone()));
    log::debug!("running {} on {}", verb, session.platform().identity);
    let result = run(&session, verb, params);
    machine.borrow_mut().flush_open_files();

    match result {
        Ok(()) => {
            session.console().print("\n");
            ExitCode::SUCCESS
        }
        Err(e) => {
            session.console().print(&format!("\n\nError: {}\n", e));
            ExitCode::from(EXIT_ERROR)
        }
    }
}
