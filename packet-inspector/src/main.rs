#![warn(clippy::all)]

#[macro_use]
extern crate log;

extern crate clap;
use clap::{crate_version, Parser};
use tracing::Level;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::EnvFilter;

extern crate flate2;
extern crate lz4;
extern crate xz2;

use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::Arc;

use flate2::read::GzDecoder;
use xz2::read::XzDecoder;

use libinspector_tools::{CaptureEngine, Config, Error, FrameAnalyzer, PcapFileSource};
use libpacket_inspector::*;

/// Default size of the capture reader buffer
const DEFAULT_BUFFER_CAPACITY: usize = 128 * 1024;

/// Dissect captured packets and reassembled TCP streams
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file
    #[arg(short, long, value_name = "CONFIG")]
    config: Option<String>,

    /// Application decoders to probe, comma-separated (default: all)
    #[arg(short, long)]
    decoders: Option<String>,

    /// List registered decoders and exit
    #[arg(long)]
    list_decoders: bool,

    /// Output directory (log file and stream summary)
    #[arg(short, long)]
    outdir: Option<String>,

    /// Number of jobs to run (default: 0 (auto))
    #[arg(short, long, default_value_t = 0)]
    jobs: u8,

    /// Number of packets to skip
    #[arg(short, long, default_value_t = 0)]
    skip: u32,

    /// Disable TCP stream reassembly
    #[arg(long)]
    no_reassembly: bool,

    /// Be verbose
    #[arg(short, long)]
    verbose: bool,

    /// Input file ("-" for standard input)
    input: Option<String>,
}

fn load_config(config: &mut Config, filename: &str) -> Result<(), io::Error> {
    debug!("Loading configuration {filename}");
    let path = Path::new(&filename);
    let file = File::open(path)?;
    config.load_config(file).map_err(to_io_error)
}

fn to_io_error(e: Error) -> io::Error {
    match e {
        Error::Io(e) => e,
        e => io::Error::new(io::ErrorKind::Other, e.to_string()),
    }
}

fn list_decoders(registry: &Registry) {
    println!("packet-inspector registered decoders:");
    for kind in [
        LayerKind::Datalink,
        LayerKind::Network,
        LayerKind::Transport,
        LayerKind::Application,
    ] {
        println!("  {kind}:");
        for name in registry.names(kind) {
            println!("    {name}");
        }
    }
}

fn open_input(input_filename: &str) -> Result<Box<dyn io::Read + Send>, io::Error> {
    if input_filename == "-" {
        return Ok(Box::new(io::stdin()));
    }
    let path = Path::new(input_filename);
    let file = File::open(path)?;
    let reader = if input_filename.ends_with(".gz") {
        Box::new(GzDecoder::new(file)) as Box<dyn io::Read + Send>
    } else if input_filename.ends_with(".xz") {
        Box::new(XzDecoder::new(file)) as Box<dyn io::Read + Send>
    } else if input_filename.ends_with(".lz4") {
        Box::new(lz4::Decoder::new(file)?) as Box<dyn io::Read + Send>
    } else {
        Box::new(file) as Box<dyn io::Read + Send>
    };
    Ok(reader)
}

fn main() -> io::Result<()> {
    let args = Args::parse();

    // load config
    let mut config = Config::default();
    if let Some(filename) = args.config.as_ref() {
        load_config(&mut config, filename)?;
    }
    // override config options from command-line arguments
    if args.jobs != 0 || config.get_usize("num_threads").is_none() {
        config.set("num_threads", args.jobs);
    }
    if let Some(dir) = args.outdir.as_ref() {
        config.set("output_dir", dir.as_str());
    }
    config.set("skip_index", args.skip);
    if let Some(names) = args.decoders.as_ref() {
        config.set("application.decoders", names.as_str());
    }
    if args.no_reassembly {
        config.set("reassembly.enabled", false);
    }

    let registry = Registry::from_config(&config).map_err(to_io_error)?;
    // check if asked to list decoders
    if args.list_decoders {
        list_decoders(&registry);
        ::std::process::exit(0);
    }

    // Open log file
    let log_file = config.get("log_file").unwrap_or("packet-inspector.log");
    let output_dir = get_output_dir(&config);
    let file_appender = RollingFileAppender::new(Rotation::NEVER, output_dir, log_file);
    let default_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let env_filter = EnvFilter::try_from_env("PACKET_INSPECTOR_LOG")
        .unwrap_or_else(|_| EnvFilter::from_default_env().add_directive(default_level.into()));
    tracing_subscriber::fmt()
        .with_writer(file_appender)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .compact()
        .init();

    // Now, really start
    info!("Packet inspector {}", crate_version!());
    if registry.num_decoders(LayerKind::Application) == 0 {
        warn!("No application decoders loaded");
    }
    debug!(
        "Application decoders: {}",
        registry.names(LayerKind::Application).join(", ")
    );

    let input_filename = match args.input.as_ref() {
        Some(s) => s.as_str(),
        None => {
            return Err(io::Error::new(
                io::ErrorKind::NotFound,
                "Input file name cannot be empty",
            ));
        }
    };
    let input_reader = open_input(input_filename)?;
    let capacity = config
        .get_usize("buffer_initial_capacity")
        .unwrap_or(DEFAULT_BUFFER_CAPACITY);
    let mut source = PcapFileSource::new(input_reader, capacity).map_err(to_io_error)?;

    let registry = Arc::new(registry);
    let sink = Arc::new(StdoutSink);
    let num_threads = config.get_usize("num_threads").unwrap_or(1);
    let analyzer = if num_threads == 1 {
        let analyzer = Analyzer::new(registry, &config, sink).map_err(to_io_error)?;
        Box::new(analyzer) as Box<dyn FrameAnalyzer>
    } else {
        let analyzer = ThreadedAnalyzer::new(registry, &config, sink).map_err(to_io_error)?;
        Box::new(analyzer) as Box<dyn FrameAnalyzer>
    };
    let mut engine = CaptureEngine::new(analyzer, &config);
    engine.run(&mut source).map_err(to_io_error)?;

    info!(
        "packet-inspector: done, {} frames read, exiting",
        source.frames_read()
    );
    Ok(())
}
