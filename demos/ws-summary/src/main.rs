use std::path::PathBuf;

use log::info;
use pico_args::Arguments;
use wavesurfer::{load_data_file_with, ClockConfig, DecodeOptions, OutputFormat};

const HELP: &str = "\
ws-summary: print the header and per-channel statistics of a WaveSurfer file

USAGE:
  ws-summary [OPTIONS] FILE

OPTIONS:
  --format FORMAT       double (default), single or raw
  --reference-hz HZ     timebase used to coerce legacy sample rates
  -h, --help            print this message
";

fn main() -> eyre::Result<()> {
    env_logger::init();
    let mut args = Arguments::from_env();
    if args.contains(["-h", "--help"]) {
        print!("{HELP}");
        return Ok(());
    }
    let format: OutputFormat = args
        .opt_value_from_str("--format")?
        .unwrap_or_default();
    let clock = ClockConfig {
        reference_hz: args
            .opt_value_from_str("--reference-hz")?
            .unwrap_or(ClockConfig::default().reference_hz),
    };
    let path: PathBuf = args.free_from_str()?;

    let data = load_data_file_with(&path, &DecodeOptions { format, clock })?;
    info!("{} sweeps in {}", data.sweeps.len(), path.display());

    let header = &data.header;
    println!("layout\t\t\t{}", header.version);
    println!("acquisition rate\t{} Hz", header.acquisition_sample_rate);
    println!("stimulation rate\t{} Hz", header.stimulation_sample_rate);
    println!(
        "AI channels\t\t{} ({} active)",
        header.n_ai_channels,
        header.n_active_channels()
    );
    for sweep in &data.sweeps {
        println!("{}", sweep.name);
        for channel in data.channel_summary(&sweep.name)? {
            println!(
                "  {:<12} mean {:>12.4}  min {:>12.4}  max {:>12.4}",
                channel.name, channel.mean, channel.min, channel.max
            );
        }
    }
    Ok(())
}
