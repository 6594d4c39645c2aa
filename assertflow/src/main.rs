//! Run the fatal-assertion check model over a textual IR file and report what it proves at each
//! annotated program point.

use anyhow::{bail, Context as _, Result};
use clap::{ArgAction, Parser};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{error, info};

use assertflow_ir::parser::parse;
use assertflow_models::{
    analyze_module, CallPatternCatalog, CheckModel, Config, ConfigError, CONFIG_FILE_NAME,
};
use assertflow_tracing::{
    init_tracing_subscriber, println_green, println_red_err, println_yellow,
    TracingSubscriberOptions,
};

#[derive(Debug, Parser)]
#[clap(
    name = "assertflow",
    about = "Propagate the conditions of fatal-assertion calls through a procedure's CFG.",
    version
)]
pub struct App {
    /// Path to the textual IR file to analyze.
    pub file: PathBuf,
    /// Path to the config file.  Defaults to the `assertflow.toml` next to the input, if any.
    #[clap(long)]
    pub config: Option<PathBuf>,
    /// Warn about calls which match a fatal assertion but don't fit its argument convention.
    #[clap(long)]
    pub strict: bool,
    /// Print the parsed IR before analyzing it.
    #[clap(long)]
    pub print_ir: bool,
    /// Use verbose output, `-vv` for the engine's per-instruction trace.
    #[clap(short, long, action = ArgAction::Count)]
    pub verbose: u8,
    /// Silence all output.
    #[clap(long)]
    pub silent: bool,
}

fn main() {
    let app = App::parse();
    init_tracing_subscriber(TracingSubscriberOptions {
        verbosity: Some(app.verbose),
        silent: Some(app.silent),
        ..Default::default()
    });
    if let Err(err) = run(app) {
        error!("Error: {:?}", err);
        std::process::exit(1);
    }
}

fn run(app: App) -> Result<()> {
    let mut config = load_config(&app)?;
    if app.strict {
        config.model.strict = true;
    }

    let input = fs::read_to_string(&app.file)
        .with_context(|| format!("failed to read {}", app.file.display()))?;
    let context =
        parse(&input).with_context(|| format!("failed to load {}", app.file.display()))?;
    if app.print_ir {
        info!("{context}");
    }

    let model = CheckModel::new(Arc::new(CallPatternCatalog::default()), config.model);
    let mut num_failed = 0;
    let mut num_analyzed = 0;
    for module in context.module_iter() {
        for report in analyze_module(&context, module, &model, &config.engine) {
            num_analyzed += 1;
            match &report.outcome {
                Ok(_) => info!("{}", report.to_string().trim_end()),
                Err(_) => {
                    num_failed += 1;
                    println_red_err(report.to_string().trim_end());
                }
            }
        }
    }

    if num_failed > 0 {
        bail!("{num_failed} of {num_analyzed} function(s) could not be analyzed.");
    }
    if num_analyzed == 0 {
        println_yellow("No functions with a body to analyze.");
    } else {
        println_green(&format!("Analyzed {num_analyzed} function(s)."));
    }
    Ok(())
}

fn load_config(app: &App) -> Result<Config> {
    if let Some(config_path) = &app.config {
        return Ok(Config::from_file(config_path.clone())?);
    }
    let dir = app.file.parent().unwrap_or_else(|| Path::new("."));
    match Config::from_dir(dir) {
        Ok(config) => {
            info!("Using {}", dir.join(CONFIG_FILE_NAME).display());
            Ok(config)
        }
        Err(ConfigError::NotFound { .. }) => Ok(Config::default()),
        Err(err) => Err(err.into()),
    }
}
