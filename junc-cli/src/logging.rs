// Logging
// Records go to stderr; when a log file path is given, a copy lands next to
// the run's temp data so long multi-round runs can be audited afterwards.

use anyhow::{Context, Result};
use log::LevelFilter;
use log4rs::append::console::{ConsoleAppender, Target};
use log4rs::append::file::FileAppender;
use log4rs::config::{Appender, Config, Root};
use log4rs::encode::pattern::PatternEncoder;
use std::path::Path;

const PATTERN: &str = "{d(%H:%M:%S)} {h({l:<5})} {m}{n}";

/// Initialise the process-wide logger. Must be called once, before any
/// enumeration work starts.
pub fn init(log_file: Option<&Path>) -> Result<()> {
    let console = ConsoleAppender::builder()
        .target(Target::Stderr)
        .encoder(Box::new(PatternEncoder::new(PATTERN)))
        .build();

    let mut config =
        Config::builder().appender(Appender::builder().build("console", Box::new(console)));
    let mut root = Root::builder().appender("console");

    if let Some(path) = log_file {
        let file = FileAppender::builder()
            .encoder(Box::new(PatternEncoder::new(PATTERN)))
            .build(path)
            .with_context(|| format!("can't create the log file {:?}", path))?;
        config = config.appender(Appender::builder().build("file", Box::new(file)));
        root = root.appender("file");
    }

    let config = config
        .build(root.build(LevelFilter::Info))
        .context("invalid logging configuration")?;
    log4rs::init_config(config).context("logging is already initialised")?;
    Ok(())
}
