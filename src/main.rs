use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;
use uart_link::acquire::{self, XadcReading};
use uart_link::frame::FrameGeometry;
use uart_link::link::{self, Transport};
use uart_link::plot::{self, ChartLabels, Series};
use uart_link::sim::SimulatedBoard;
use uart_link::sink::{self, XadcCsv};
use uart_link::{decode, init_bram, Config, Session};

/// Exercises the UART link to the FPGA test board.
#[derive(Parser, Debug)]
#[command(name = "uart_link_cli", version, about)]
struct Cli {
    /// TOML configuration file (default: ./uart_link.toml if present).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Serial port, overriding the configuration.
    #[arg(short, long, global = true)]
    port: Option<String>,

    /// Talk to the built-in simulated board instead of a serial port.
    #[arg(long, global = true)]
    simulate: bool,

    /// Increase log verbosity (-v debug, -vv trace). RUST_LOG takes precedence.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Cmd,
}

#[derive(Subcommand, Debug)]
enum Cmd {
    /// List available serial ports.
    Ports,
    /// Dump the FPGA block RAM to CSV.
    ReadBram {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Plot the samples after the dump.
        #[arg(long)]
        plot: bool,
    },
    /// Trigger a burst image capture and save it as CSV (and optionally TIFF).
    Burst {
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Directory for frame_<i>.tif files.
        #[arg(long)]
        tiff_dir: Option<PathBuf>,
        /// View the frames after the capture.
        #[arg(long)]
        plot: bool,
    },
    /// Send the UART self-test command and print the reply.
    SelfTest,
    /// Log XADC temperature and auxiliary voltages to CSV.
    Xadc {
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        samples: Option<usize>,
        /// Plot the readings after the run.
        #[arg(long)]
        plot: bool,
    },
    /// Convert a captured BRAM dump into a BRAM init word list.
    InitBram {
        #[arg(short, long)]
        input: Option<PathBuf>,
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Plot ADC volts against time.
        #[arg(long)]
        plot: bool,
    },
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("uart_link={level},uart_link_cli={level}")));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

// The main entry point for the command-line link tool.
fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let mut config = Config::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(port) = &cli.port {
        config.link.port = port.clone();
    }

    match cli.command {
        Cmd::Ports => list_ports(),
        Cmd::ReadBram { output, plot } => {
            if let Some(path) = output {
                config.bram.output = path;
            }
            run_read_bram(&config, cli.simulate, plot)
        }
        Cmd::Burst {
            output,
            tiff_dir,
            plot,
        } => {
            if let Some(path) = output {
                config.burst.output = path;
            }
            if tiff_dir.is_some() {
                config.burst.tiff_dir = tiff_dir;
            }
            run_burst(&config, cli.simulate, plot)
        }
        Cmd::SelfTest => run_self_test(&config, cli.simulate),
        Cmd::Xadc {
            output,
            samples,
            plot,
        } => {
            if let Some(path) = output {
                config.xadc.output = path;
            }
            if let Some(n) = samples {
                config.xadc.samples = n;
            }
            run_xadc(&config, cli.simulate, plot)
        }
        Cmd::InitBram {
            input,
            output,
            plot,
        } => {
            if let Some(path) = input {
                config.init_bram.input = path;
            }
            if let Some(path) = output {
                config.init_bram.output = path;
            }
            run_init_bram(&config, plot)
        }
    }
}

// Opens either the configured serial port or the simulated board.
fn open_session(
    config: &Config,
    timeout: Duration,
    simulate: bool,
) -> Result<Session<Box<dyn Transport>>> {
    config.validate().context("invalid configuration")?;
    let transport: Box<dyn Transport> = if simulate {
        tracing::info!("using simulated board");
        Box::new(
            SimulatedBoard::new()
                .with_bram_words(config.bram.bytes / 2)
                .with_burst_geometry(FrameGeometry::from(&config.burst)),
        )
    } else {
        let port = link::open_port(&config.link, timeout)
            .with_context(|| format!("could not open '{}'", config.link.port))?;
        Box::new(port)
    };
    Ok(Session::new(transport, timeout, config.link.short_read))
}

fn list_ports() -> Result<()> {
    let ports = serialport::available_ports().context("could not enumerate serial ports")?;
    if ports.is_empty() {
        println!("No serial ports found.");
        return Ok(());
    }
    println!("Available serial ports:");
    for (i, port) in ports.iter().enumerate() {
        println!("  {}: {} ({:?})", i, port.port_name, port.port_type);
    }
    Ok(())
}

fn run_read_bram(config: &Config, simulate: bool, plot: bool) -> Result<()> {
    let job = &config.bram;
    let samples = {
        let mut session = open_session(config, job.timeout()?, simulate)?;
        acquire::dump_bram(&mut session, job).context("BRAM dump failed")?
    };
    sink::write_samples(&job.output, &samples)
        .with_context(|| format!("could not write {}", job.output.display()))?;
    println!("Wrote {} samples to {}", samples.len(), job.output.display());

    if plot {
        let series = [Series::indexed(
            "BRAM",
            samples.iter().map(|s| f64::from(s.value)),
        )];
        plot::show_chart(
            &ChartLabels::new(
                "Sample Value in Decimal Code vs. Sample Number",
                "Sample Number",
                "Sample Value in Decimal Code",
            ),
            &series,
        )?;
    }
    Ok(())
}

fn run_burst(config: &Config, simulate: bool, plot: bool) -> Result<()> {
    let job = &config.burst;
    let burst = {
        let mut session = open_session(config, job.timeout()?, simulate)?;
        acquire::capture_burst(&mut session, job).context("burst capture failed")?
    };
    sink::write_samples(&job.output, &burst.samples)
        .with_context(|| format!("could not write {}", job.output.display()))?;
    println!(
        "Wrote {} samples ({} frames) to {}",
        burst.samples.len(),
        burst.frames.len(),
        job.output.display()
    );

    if let Some(dir) = &job.tiff_dir {
        let paths = sink::write_frame_stack(&burst.frames, dir, "frame")
            .with_context(|| format!("could not write TIFF frames to {}", dir.display()))?;
        for path in paths {
            println!("Wrote {}", path.display());
        }
    }

    if plot {
        plot::show_frames(&burst.frames, job.bit_depth)?;
    }
    Ok(())
}

fn run_self_test(config: &Config, simulate: bool) -> Result<()> {
    let job = &config.self_test;
    let mut session = open_session(config, job.timeout()?, simulate)?;
    let reply = acquire::self_test(&mut session, job).context("self-test failed")?;
    println!("Self-test reply: {}", decode::to_hex(&reply));
    Ok(())
}

fn run_xadc(config: &Config, simulate: bool, plot: bool) -> Result<()> {
    let job = &config.xadc;
    let mut readings: Vec<XadcReading> = Vec::with_capacity(job.samples);

    let csv = {
        let mut session = open_session(config, job.timeout()?, simulate)?;
        let mut csv = XadcCsv::create(&job.output)
            .with_context(|| format!("could not create {}", job.output.display()))?;
        acquire::monitor_xadc(&mut session, job, |reading| {
            csv.write(reading)?;
            readings.push(reading.clone());
            Ok(())
        })
        .context("XADC monitor failed")?;
        csv
    };
    csv.finish()?;
    println!("Wrote {} readings to {}", readings.len(), job.output.display());

    if plot {
        let delays: Vec<f64> = readings.iter().map(|r| r.delay_secs).collect();
        let pair = |f: fn(&XadcReading) -> f64| -> Vec<(f64, f64)> {
            delays.iter().copied().zip(readings.iter().map(f)).collect()
        };
        plot::show_chart(
            &ChartLabels::new("XADC Temperature", "Delay (sec)", "Temperature (degrees C)"),
            &[Series::new("Temperature", pair(|r| r.temperature_c))],
        )?;
        plot::show_chart(
            &ChartLabels::new("XADC Auxiliary Inputs", "Delay (sec)", "Volts"),
            &[
                Series::new("VAUX5", pair(|r| r.vaux5_v)),
                Series::new("VAUX12", pair(|r| r.vaux12_v)),
            ],
        )?;
    }
    Ok(())
}

fn run_init_bram(config: &Config, plot: bool) -> Result<()> {
    config.validate().context("invalid configuration")?;
    let job = &config.init_bram;
    let converted = init_bram::run(job)
        .with_context(|| format!("could not convert {}", job.input.display()))?;
    println!(
        "Wrote {} of {} words to {}",
        converted.words.len().min(job.words),
        converted.words.len(),
        job.output.display()
    );

    if plot {
        let points = converted
            .times
            .iter()
            .copied()
            .zip(converted.volts.iter().copied())
            .collect();
        plot::show_chart(
            &ChartLabels::new("ADC Out (V) vs. Time (Sec)", "Time (Sec)", "ADC Out (V)"),
            &[Series::new("ADC", points)],
        )?;
    }
    Ok(())
}
