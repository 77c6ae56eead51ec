//! WAV to Vorbis-framed packet stream command line tool
//!
//! Drives the encoder element with the built-in reference engine. Each
//! packet is written as a little-endian u32 payload length, a little-endian
//! u64 granule position (0 for headers) and the payload itself.

use log::debug;
use std::env;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::process;
use vorbisenc_rs::error::{FlowError, FlowResult};
use vorbisenc_rs::util::read_wav_file;
use vorbisenc_rs::{
    Event, FrameSink, OutputFormat, OutputFrame, RawFrame, ReferenceCodec, State, VorbisEncoder,
    SECOND,
};

/// Input frames handed to the encoder per chunk
const CHUNK_FRAMES: usize = 1024;

/// Command line arguments structure
struct Args {
    input_file: String,
    output_file: Option<String>,
    start_ms: u64,
    quality: Option<f32>,
    bitrate: Option<i32>,
    min_bitrate: Option<i32>,
    max_bitrate: Option<i32>,
    managed: bool,
    quiet: bool,
    verbose: bool,
}

fn option_value<'a>(args: &'a [String], i: usize, name: &str) -> Result<&'a str, String> {
    args.get(i)
        .map(String::as_str)
        .ok_or_else(|| format!("Option {} requires a value", name))
}

fn parse_number<T: std::str::FromStr>(value: &str, what: &str) -> Result<T, String> {
    value
        .parse::<T>()
        .map_err(|_| format!("Invalid {}: {}", what, value))
}

impl Args {
    fn parse() -> Result<Self, String> {
        let args: Vec<String> = env::args().collect();

        let mut parsed = Args {
            input_file: String::new(),
            output_file: None,
            start_ms: 0,
            quality: None,
            bitrate: None,
            min_bitrate: None,
            max_bitrate: None,
            managed: false,
            quiet: false,
            verbose: false,
        };

        let mut i = 1;
        while i < args.len() && args[i].starts_with('-') && args[i] != "-" {
            let arg = args[i].as_str();
            match arg {
                "-s" => {
                    i += 1;
                    parsed.start_ms = parse_number(option_value(&args, i, arg)?, "start time")?;
                }
                "-q" => {
                    i += 1;
                    parsed.quality = Some(parse_number(option_value(&args, i, arg)?, "quality")?);
                }
                "-b" => {
                    i += 1;
                    parsed.bitrate = Some(parse_number(option_value(&args, i, arg)?, "bitrate")?);
                }
                "-m" => {
                    i += 1;
                    parsed.min_bitrate =
                        Some(parse_number(option_value(&args, i, arg)?, "minimum bitrate")?);
                }
                "-M" => {
                    i += 1;
                    parsed.max_bitrate =
                        Some(parse_number(option_value(&args, i, arg)?, "maximum bitrate")?);
                }
                "--managed" => parsed.managed = true,
                "-Q" => {
                    parsed.quiet = true;
                    parsed.verbose = false;
                }
                "-v" => {
                    parsed.verbose = true;
                    parsed.quiet = false;
                }
                "-h" | "--help" => return Err(String::new()),
                _ => return Err(format!("Unknown option: {}", arg)),
            }
            i += 1;
        }

        match &args[i.min(args.len())..] {
            [input] => parsed.input_file = input.clone(),
            [input, output] => {
                parsed.input_file = input.clone();
                parsed.output_file = Some(output.clone());
            }
            // Empty error triggers usage display
            _ => return Err(String::new()),
        }
        Ok(parsed)
    }
}

fn print_usage() {
    println!("Usage: vorbisenc [options] <infile.wav> [<outfile>]");
    println!();
    println!("Use \"-\" for standard output.");
    println!();
    println!("Options:");
    println!(" -h            this help message");
    println!(" -s <ms>       timestamp of the first sample in milliseconds, default 0");
    println!(" -q <quality>  quality target [-0.1..1.0], default 0.3");
    println!(" -b <bps>      average bitrate target");
    println!(" -m <bps>      minimum bitrate");
    println!(" -M <bps>      maximum bitrate");
    println!(" --managed     enable bitrate management");
    println!(" -Q            quiet mode");
    println!(" -v            verbose packet listing");
}

fn write_packet(output: &mut dyn Write, frame: &OutputFrame) -> std::io::Result<()> {
    output.write_all(&(frame.len() as u32).to_le_bytes())?;
    output.write_all(&frame.offset_end.to_le_bytes())?;
    output.write_all(&frame.data)
}

/// Sink writing length-prefixed packets, optionally listing each one
struct PacketWriter {
    output: Option<Box<dyn Write>>,
    verbose: bool,
    packets: usize,
    bytes: u64,
    last_granule: u64,
}

impl FrameSink for PacketWriter {
    fn name(&self) -> &str {
        "packet-writer"
    }

    fn set_format(&mut self, format: &OutputFormat) {
        debug!(
            "output format {}, {} channels at {} Hz",
            format.media_type, format.channels, format.sample_rate
        );
    }

    fn push(&mut self, frame: &OutputFrame) -> FlowResult {
        if self.verbose {
            let kind = if frame.is_header() { "header" } else { "audio" };
            let time = |t: Option<u64>| {
                t.map_or_else(|| "none".to_string(), |t| format!("{:.6}", t as f64 / SECOND as f64))
            };
            println!(
                "[Packet {}] {} {} bytes, offset {}, granule {}, ts {}, dur {}",
                self.packets,
                kind,
                frame.len(),
                frame.offset,
                frame.offset_end,
                time(frame.timestamp),
                time(frame.duration)
            );
        }

        if let Some(output) = self.output.as_mut() {
            write_packet(output, frame).map_err(|e| FlowError::Error(e.to_string()))?;
        }

        if !frame.is_header() {
            self.last_granule = frame.offset_end;
        }
        self.packets += 1;
        self.bytes += frame.len() as u64;
        Ok(())
    }

    fn push_event(&mut self, event: &Event) -> bool {
        if let (Event::Eos, Some(output)) = (event, self.output.as_mut()) {
            return output.flush().is_ok();
        }
        true
    }
}

fn encode(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    let quiet = args.quiet || args.output_file.as_deref() == Some("-");

    let audio = read_wav_file(&args.input_file)
        .map_err(|e| format!("Could not open WAVE file: {}", e))?;
    if !quiet {
        let duration = audio.duration_secs() as u32;
        println!(
            "WAVE Data, {} channels {}Hz {}bit, duration: {:02}:{:02}:{:02}",
            audio.channels,
            audio.sample_rate,
            audio.bits_per_sample,
            duration / 3600,
            (duration % 3600) / 60,
            duration % 60
        );
    }

    let output: Option<Box<dyn Write>> = match args.output_file.as_deref() {
        None => None,
        Some("-") => Some(Box::new(std::io::stdout())),
        Some(path) => Some(Box::new(BufWriter::new(File::create(path)?))),
    };
    let sink = PacketWriter {
        output,
        verbose: args.verbose,
        packets: 0,
        bytes: 0,
        last_granule: 0,
    };

    let mut encoder = VorbisEncoder::new(ReferenceCodec::new(), sink);
    if let Some(quality) = args.quality {
        encoder.set_quality(quality)?;
    }
    if let Some(bitrate) = args.bitrate {
        encoder.set_bitrate(bitrate)?;
    }
    if let Some(min) = args.min_bitrate {
        encoder.set_min_bitrate(min)?;
    }
    if let Some(max) = args.max_bitrate {
        encoder.set_max_bitrate(max)?;
    }
    if args.managed {
        encoder.set_managed(true);
    }

    encoder.set_state(State::Playing)?;
    encoder.set_format(audio.channels, audio.sample_rate)?;
    if !quiet {
        println!("{}", encoder.last_message().unwrap_or_default());
    }

    let start_time = std::time::Instant::now();
    let channels = audio.channels as usize;
    let rate = audio.sample_rate as u64;
    let start = args.start_ms.saturating_mul(1_000_000);

    for (index, chunk) in audio.samples.chunks(CHUNK_FRAMES * channels).enumerate() {
        let first_frame = (index * CHUNK_FRAMES) as u64;
        let timestamp = start + first_frame * SECOND / rate;
        encoder.chain(RawFrame::from_samples(chunk, Some(timestamp)))?;
    }
    encoder.handle_event(Event::Eos)?;

    let session_bytes = encoder.session().bytes_emitted();
    let session_samples = encoder.session().samples_submitted();
    encoder.set_state(State::Null)?;
    let sink = encoder.into_sink();

    if !quiet {
        let elapsed = start_time.elapsed();
        println!(
            "Encoded {} frames into {} packets ({} bytes), final granule {}",
            session_samples, sink.packets, session_bytes, sink.last_granule
        );
        println!(
            "Finished in {:02}:{:02}:{:02}",
            elapsed.as_secs() / 3600,
            (elapsed.as_secs() % 3600) / 60,
            elapsed.as_secs() % 60
        );
    }
    debug!("{} bytes written by sink", sink.bytes);

    Ok(())
}

fn main() {
    // Initialize logger with minimal output (only errors by default)
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Error)
        .format_timestamp(None)
        .format_module_path(false)
        .format_target(false)
        .init();

    let args = match Args::parse() {
        Ok(args) => args,
        Err(err) => {
            if err.is_empty() {
                print_usage();
            } else {
                eprintln!("Error: {}", err);
            }
            process::exit(1);
        }
    };

    if !Path::new(&args.input_file).exists() {
        eprintln!("Could not open WAVE file");
        process::exit(1);
    }

    if let Err(err) = encode(args) {
        eprintln!("Error: {}", err);
        process::exit(1);
    }
}
