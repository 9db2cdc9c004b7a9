use clap::{Parser, Subcommand, ValueEnum};
use hound::WavSpec;
use log::info;
use std::path::{Path, PathBuf};
use tapedeck_core::{encode_high_speed, encode_low_speed, Decoder, RegressionTally, Tape};

#[derive(Parser)]
#[command(name = "tapedeck")]
#[command(about = "Recover program binaries from cassette tape recordings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, ValueEnum)]
enum Baud {
    /// 500 baud pulse-position encoding
    #[value(name = "500")]
    Low,
    /// 1500 baud cycle-length encoding
    #[value(name = "1500")]
    High,
}

#[derive(Subcommand)]
enum Commands {
    /// Decode a WAV recording into programs
    Decode {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Write each program's binary into this directory
        #[arg(short, long, value_name = "DIR")]
        out_dir: Option<PathBuf>,
    },

    /// Encode a binary file to WAV audio
    Encode {
        /// Input binary file
        #[arg(value_name = "INPUT.BIN")]
        input: PathBuf,

        /// Output WAV file
        #[arg(value_name = "OUTPUT.WAV")]
        output: PathBuf,

        /// Encoding speed
        #[arg(short, long, default_value = "500")]
        baud: Baud,

        /// Sample rate of the synthesized audio
        #[arg(short, long, default_value = "48000")]
        rate: u32,
    },

    /// Decode a WAV recording and compare every program against a reference
    Verify {
        /// Input WAV file
        #[arg(value_name = "INPUT.WAV")]
        input: PathBuf,

        /// Reference binary the programs should decode to
        #[arg(value_name = "REFERENCE.BIN")]
        reference: PathBuf,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Decode { input, out_dir } => decode_command(&input, out_dir.as_deref()),
        Commands::Encode {
            input,
            output,
            baud,
            rate,
        } => encode_command(&input, &output, baud, rate),
        Commands::Verify { input, reference } => verify_command(&input, &reference),
    }
}

fn decode_command(
    input_path: &Path,
    out_dir: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let tape = read_wav(input_path)?;
    println!(
        "Read {}: {} samples at {} Hz",
        input_path.display(),
        tape.len(),
        tape.sample_rate
    );

    let programs = Decoder::new(&tape).decode();
    if programs.is_empty() {
        println!("No programs found");
        return Ok(());
    }

    for program in &programs {
        println!(
            "{} ({}): {}, {} bytes, {} bad bits, {:?}",
            program.label(),
            program.decoder_name,
            program.time_span(tape.sample_rate),
            program.binary.len(),
            program.bad_bit_count(),
            program.outcome,
        );
        if let Some(dir) = out_dir {
            std::fs::create_dir_all(dir)?;
            let path = dir.join(format!(
                "track-{}-copy-{}.bin",
                program.track_number, program.copy_number
            ));
            std::fs::write(&path, &program.binary)?;
            println!("  wrote {}", path.display());
        }
    }

    Ok(())
}

fn encode_command(
    input_path: &Path,
    output_path: &Path,
    baud: Baud,
    rate: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = std::fs::read(input_path)?;
    info!("read {} bytes from {}", data.len(), input_path.display());

    let samples = match baud {
        Baud::Low => encode_low_speed(&data, rate)?,
        Baud::High => encode_high_speed(&data, rate)?,
    };

    let spec = WavSpec {
        channels: 1,
        sample_rate: rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(output_path, spec)?;
    for sample in &samples {
        writer.write_sample(*sample)?;
    }
    writer.finalize()?;

    println!(
        "Encoded {} bytes to {} samples in {}",
        data.len(),
        samples.len(),
        output_path.display()
    );
    Ok(())
}

fn verify_command(
    input_path: &Path,
    reference_path: &Path,
) -> Result<(), Box<dyn std::error::Error>> {
    let tape = read_wav(input_path)?;
    let reference = std::fs::read(reference_path)?;

    let programs = Decoder::new(&tape).decode();
    if programs.is_empty() {
        return Err("no programs found on the tape".into());
    }

    let mut tally = RegressionTally::new();
    for program in &programs {
        let report = tally.record(program, &reference);
        match report.first_mismatch {
            None => println!(
                "{}: OK ({} bytes, {} bad bits)",
                program.label(),
                program.binary.len(),
                program.bad_bit_count()
            ),
            Some(mismatch) => println!(
                "{}: MISMATCH at byte {} (decoded {}, reference {})",
                program.label(),
                mismatch.index,
                mismatch
                    .actual
                    .map_or("<end>".to_string(), |b| format!("{:#04X}", b)),
                mismatch
                    .expected
                    .map_or("<end>".to_string(), |b| format!("{:#04X}", b)),
            ),
        }
    }

    println!("{} passed, {} failed", tally.passed, tally.failed);
    if !tally.all_passed() {
        return Err("reference comparison failed".into());
    }
    Ok(())
}

/// Read a WAV file into a tape: first channel only, normalized to signed
/// 16-bit. Unsupported formats are the one hard failure in this tool.
fn read_wav(path: &Path) -> Result<Tape, Box<dyn std::error::Error>> {
    let mut reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    let channels = spec.channels.max(1) as usize;

    let samples: Vec<i16> = match (spec.sample_format, spec.bits_per_sample) {
        (hound::SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .step_by(channels)
            .map(|s| s.map(|v| i16::from(v) << 8))
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .step_by(channels)
            .collect::<Result<_, _>>()?,
        (hound::SampleFormat::Float, 32) => reader
            .samples::<f32>()
            .step_by(channels)
            .map(|s| s.map(|v| (v.clamp(-1.0, 1.0) * 32_767.0) as i16))
            .collect::<Result<_, _>>()?,
        (format, bits) => {
            return Err(format!("unsupported WAV format: {:?} {} bits", format, bits).into());
        }
    };

    Ok(Tape::new(samples, spec.sample_rate))
}
