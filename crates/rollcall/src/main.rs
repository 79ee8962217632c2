//! `rollcall` - CLI and HTTP service entry point.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::io::Write;

use anyhow::Context;
use clap::Parser;

use rollcall::cli::{Cli, Command, ConfigCommand, ExportCommand};
use rollcall::model::{AttendanceRecord, Student};
use rollcall::storage::open_store;
use rollcall::{init_logging, Config};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbosity());

    if let Command::Config(ConfigCommand::Validate { file }) = &cli.command {
        return handle_validate(file.clone().or_else(|| cli.config.clone()));
    }

    let mut config = Config::load_from(cli.config.clone())?;

    match cli.command {
        Command::Serve(cmd) => {
            cmd.apply(&mut config);
            config.validate()?;
            let runtime = tokio::runtime::Runtime::new().context("failed to start runtime")?;
            runtime.block_on(rollcall::server::serve(&config))?;
        }
        Command::Students(cmd) => {
            let students = open_store(&config)?.list_students()?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&students)?);
            } else {
                print_students(&students);
            }
        }
        Command::Attendance(cmd) => {
            let records = open_store(&config)?.list_attendance()?;
            if cmd.json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_attendance(&records);
            }
        }
        Command::Export(cmd) => handle_export(&config, &cmd)?,
        Command::Config(cmd) => handle_config(&config, &cmd)?,
    }
    Ok(())
}

fn print_students(students: &[Student]) {
    if students.is_empty() {
        println!("No students registered.");
        return;
    }
    println!("{:<16} {:<24} {:<8} {:<6} Section", "Roll No", "Name", "Dept", "Year");
    for s in students {
        println!(
            "{:<16} {:<24} {:<8} {:<6} {}",
            s.roll_no, s.name, s.dept, s.year, s.section
        );
    }
}

fn print_attendance(records: &[AttendanceRecord]) {
    if records.is_empty() {
        println!("No attendance recorded.");
        return;
    }
    println!(
        "{:<16} {:<24} {:<8} {:<6} {:<8} Timestamp",
        "Roll No", "Name", "Dept", "Year", "Section"
    );
    for r in records {
        println!(
            "{:<16} {:<24} {:<8} {:<6} {:<8} {}",
            r.roll_no, r.name, r.dept, r.year, r.section, r.timestamp
        );
    }
}

fn handle_export(config: &Config, cmd: &ExportCommand) -> anyhow::Result<()> {
    let bytes = open_store(config)?.export_attendance_csv()?;
    match &cmd.output {
        Some(path) => {
            std::fs::write(path, &bytes)
                .with_context(|| format!("failed to write {}", path.display()))?;
            eprintln!("Wrote {} bytes to {}", bytes.len(), path.display());
        }
        None => std::io::stdout().write_all(&bytes)?,
    }
    Ok(())
}

fn handle_validate(file: Option<std::path::PathBuf>) -> anyhow::Result<()> {
    let path = file.unwrap_or_else(Config::default_config_path);
    println!("Validating configuration: {}", path.display());
    match Config::load_from(Some(path)) {
        Ok(_) => println!("Configuration is valid."),
        Err(e) => println!("Configuration error: {e}"),
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: &ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if *json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Server]");
                println!("  Address:            {}", config.bind_address());
                println!();
                println!("[Storage]");
                println!("  Backend:            {}", config.storage.backend);
                println!("  Data directory:     {}", config.data_dir().display());
                println!("  Students table:     {}", config.students_path().display());
                println!("  Attendance table:   {}", config.attendance_path().display());
                println!("  Database:           {}", config.database_path().display());
                println!("  QR images:          {}", config.qr_dir().display());
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => handle_validate(file.clone())?,
    }
    Ok(())
}
