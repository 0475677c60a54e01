use anyhow::{bail, Context, Result};
use cartswap_core::layout::PinLayout;
use cartswap_core::logging::{LogCategory, LogConfig, LogLevel};
use cartswap_multicart::{title_of, BoardSim, SimEvent, TraceEntry, DEFAULT_CLOCK_PERIOD, SMB3_TAS};
use clap::Parser;
use std::fs::File;
use std::io::Write;
use std::path::PathBuf;

/// Play a console session against the cartridge swapper and print what the
/// select lines did.
#[derive(Parser)]
struct Args {
    /// Press this cartridge button (0-4) before anything else
    #[arg(long)]
    select: Option<u8>,

    /// Do not press the trigger button
    #[arg(long, default_value_t = false)]
    no_trigger: bool,

    /// Sequencer samples to hold the clock low for the reset
    /// (default: four clock periods)
    #[arg(long)]
    hold: Option<u64>,

    /// Clock pulses to play after the reset
    #[arg(long, default_value_t = 16)]
    pulses: u64,

    /// Dump the trace to this file as JSON
    #[arg(long)]
    save: Option<PathBuf>,

    /// Suppress the printed trace (still writes --save)
    #[arg(long, default_value_t = false)]
    quiet: bool,

    /// Core log level for every category: off, error, warn, info, debug, trace
    #[arg(long, default_value = "off")]
    log_level: String,

    /// Override the level for the sequencer category
    #[arg(long)]
    log_sequencer: Option<String>,

    /// Override the level for the control loop category
    #[arg(long)]
    log_control: Option<String>,

    /// Override the level for register writes (trace shows every write)
    #[arg(long)]
    log_pins: Option<String>,

    /// Core log messages allowed per category per second
    #[arg(long)]
    log_rate_limit: Option<usize>,

    /// Write core logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,
}

fn parse_level(s: &str) -> Result<LogLevel> {
    match LogLevel::from_str(s) {
        Some(level) => Ok(level),
        None => bail!("unknown log level: {}", s),
    }
}

fn configure_logging(args: &Args) -> Result<()> {
    let config = LogConfig::global();
    config.set_global_level(parse_level(&args.log_level)?);
    if let Some(level) = &args.log_sequencer {
        config.set_level(LogCategory::Sequencer, parse_level(level)?);
    }
    if let Some(level) = &args.log_control {
        config.set_level(LogCategory::Control, parse_level(level)?);
    }
    if let Some(level) = &args.log_pins {
        config.set_level(LogCategory::Pins, parse_level(level)?);
    }
    if let Some(limit) = args.log_rate_limit {
        config.set_rate_limit(limit);
    }
    if let Some(path) = &args.log_file {
        config
            .set_log_file(path.clone())
            .with_context(|| format!("opening log file {}", path.display()))?;
    }
    Ok(())
}

fn describe(entry: &TraceEntry) -> String {
    let what = match entry.event {
        SimEvent::PowerOn => "power on".to_string(),
        SimEvent::Press { button, action } => format!("button {} ({:?})", button, action),
        SimEvent::ResetHeld { samples } => format!("reset held {} samples", samples),
        SimEvent::Pulse { index } => format!("pulse {}", index),
    };
    format!(
        "{:<28} {}  {}",
        what,
        entry.select,
        title_of(entry.select).unwrap_or("(no single cartridge)")
    )
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    configure_logging(&args)?;

    let layout = PinLayout::default();
    let mut sim = BoardSim::new(layout, SMB3_TAS, DEFAULT_CLOCK_PERIOD);
    sim.power_on();

    if let Some(button) = args.select {
        if button >= layout.trigger_button() {
            bail!(
                "--select takes a cartridge button 0-{}, got {}",
                layout.trigger_button() - 1,
                button
            );
        }
        sim.press(button)?;
    }

    if !args.no_trigger {
        let action = sim.press(layout.trigger_button())?;
        log::info!("trigger -> {:?}", action);
    }

    let hold = args
        .hold
        .unwrap_or(DEFAULT_CLOCK_PERIOD.reset_threshold() * 4);
    if hold < DEFAULT_CLOCK_PERIOD.reset_threshold() {
        log::warn!(
            "a {} sample hold is shorter than the {} needed to detect a reset",
            hold,
            DEFAULT_CLOCK_PERIOD.reset_threshold()
        );
    }
    sim.hold_reset(hold)?;
    sim.pulses(args.pulses)?;

    if !args.quiet {
        for entry in sim.trace() {
            println!("{}", describe(entry));
        }
    }

    if let Some(path) = &args.save {
        let mut f =
            File::create(path).with_context(|| format!("creating {}", path.display()))?;
        write!(f, "{}", serde_json::to_string_pretty(sim.trace())?)?;
        log::info!("trace written to {}", path.display());
    }

    Ok(())
}
