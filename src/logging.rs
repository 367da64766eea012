use crate::config::{ERROR_LOG, WARNING_LOG};
use simplelog::{
    ColorChoice, CombinedLogger, ConfigBuilder, LevelFilter, SharedLogger, TermLogger,
    TerminalMode, WriteLogger,
};
use std::fs::{File, OpenOptions};
use std::io;
use std::path::Path;

/// Console at info (debug with `debug`), plus `warning.log` and `error.log`
/// under `output_root`. Falls back to env_logger when the files cannot be
/// created.
pub fn init(output_root: &Path, debug: bool) {
    let console = if debug {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    match file_loggers(output_root) {
        Ok(files) => {
            let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
                console,
                config(),
                TerminalMode::Mixed,
                ColorChoice::Auto,
            )];
            loggers.extend(files);
            if let Err(e) = CombinedLogger::init(loggers) {
                eprintln!("[warn] logger init failed: {e}");
            }
        }
        Err(e) => {
            eprintln!(
                "[warn] cannot create log files under {:?}: {e}",
                output_root
            );
            let default = if debug { "debug" } else { "info" };
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default))
                .init();
        }
    }
}

fn config() -> simplelog::Config {
    ConfigBuilder::new()
        .set_time_format_rfc3339()
        .set_target_level(LevelFilter::Off)
        .build()
}

fn file_loggers(output_root: &Path) -> io::Result<Vec<Box<dyn SharedLogger>>> {
    std::fs::create_dir_all(output_root)?;
    let warnings = append(&output_root.join(WARNING_LOG))?;
    let errors = append(&output_root.join(ERROR_LOG))?;
    Ok(vec![
        WriteLogger::new(LevelFilter::Warn, config(), warnings),
        WriteLogger::new(LevelFilter::Error, config(), errors),
    ])
}

fn append(path: &Path) -> io::Result<File> {
    OpenOptions::new().create(true).append(true).open(path)
}
