#![allow(dead_code)]
use std::path::{Path, PathBuf};

use wavesurfer_hdf5::{
    builder::{DatasetBuilder, FileBuilder},
    Array,
};

pub const SCANS: u64 = 2001;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub fn write(dir: &Path, name: &str, builder: &FileBuilder) -> eyre::Result<PathBuf> {
    let path = dir.join(name);
    builder.write(&path)?;
    Ok(path)
}

/// Sawtooth from 0 to 16000 counts in steps of 8.
pub fn ramp() -> Vec<i16> {
    (0..SCANS as i16).map(|i| i * 8).collect()
}

/// Constant 100 counts with every tenth sample at 1100.
pub fn pulses() -> Vec<i16> {
    (0..SCANS).map(|i| if i % 10 == 0 { 1100 } else { 100 }).collect()
}

/// Current layout: three channels, the middle one inactive, 20 kHz.
/// Channel 0 scales to 0..5 V.
pub fn current() -> FileBuilder {
    let mut file = FileBuilder::new();
    let root = file.root();
    root.group("header")
        .dataset("VersionString", Array::string("1.0.2"))
        .dataset("AcquisitionSampleRate", Array::scalar(20e3f64))
        .dataset("StimulationSampleRate", Array::scalar(20e3f64))
        .dataset("NAIChannels", Array::scalar(3.0f64))
        .dataset("AIChannelScales", Array::vector(vec![1.0f64, 0.5, 0.01]))
        .dataset("IsAIChannelActive", Array::vector(vec![1u8, 0, 1]))
        .dataset(
            "AIScalingCoefficients",
            Array::matrix(
                3,
                4,
                vec![
                    0.0f64, 1.0 / 3200.0, 0.0, 0.0, //
                    0.0, 1.0, 0.0, 0.0, //
                    -0.1, 0.001, 0.0, 0.0,
                ],
            ),
        )
        .dataset(
            "AIChannelNames",
            Array::vector(vec!["Vm".to_owned(), "Aux".to_owned(), "Im".to_owned()]),
        )
        .dataset(
            "AIChannelUnits",
            Array::vector(vec!["V".to_owned(), "V".to_owned(), "pA".to_owned()]),
        );
    for (index, name) in ["sweep_0001", "sweep_0002"].into_iter().enumerate() {
        let mut scans = ramp();
        scans.extend(pulses());
        root.group(name)
            .dataset_with(
                "analogScans",
                DatasetBuilder::chunked(Array::matrix(2, SCANS, scans), &[2, 512])
                    .shuffle()
                    .deflate(4),
            )
            .dataset("digitalScans", Array::vector(vec![0u8, 1, 3, 1]))
            .dataset("timestamp", Array::scalar(index as f64 * 0.5));
    }
    file
}

/// Nested header of 0.912 and later, one channel, with the given rates.
pub fn nested(version: &str, acquisition: f64, stimulation: f64) -> FileBuilder {
    let mut file = FileBuilder::new();
    let header = file.root().group("header");
    header.dataset("VersionString", Array::string(version));
    header
        .group("Acquisition")
        .dataset("SampleRate", Array::scalar(acquisition))
        .dataset("AnalogChannelScales", Array::vector(vec![1.0f64]))
        .dataset("IsAnalogChannelActive", Array::vector(vec![1.0f64]))
        .dataset(
            "AnalogScalingCoefficients",
            Array::matrix(1, 2, vec![0.0f64, 1.0 / 3200.0]),
        );
    header
        .group("Stimulation")
        .dataset("SampleRate", Array::scalar(stimulation));
    file
}

/// 0.933 file with one sweep of the ramp.
pub fn legacy_0p933() -> FileBuilder {
    let mut file = nested("0.933", 20e3, 20e3);
    file.root()
        .group("sweep_0001")
        .dataset("analogScans", Array::matrix(1, SCANS, ramp()));
    file
}

/// 0.74 file: four channels, bare `trial_*` datasets, no calibration.
pub fn legacy_0p74() -> FileBuilder {
    let mut file = FileBuilder::new();
    let root = file.root();
    let acquisition = root.group("header").group("Acquisition");
    acquisition
        .dataset("SampleRate", Array::scalar(20e3f64))
        .dataset("ChannelScales", Array::vector(vec![0.1f64; 4]))
        .dataset("IsChannelActive", Array::vector(vec![1.0f64; 4]))
        .dataset(
            "ChannelNames",
            Array::vector(vec!["a".to_owned(), "b".to_owned(), "c".to_owned(), "d".to_owned()]),
        );
    root.group("header")
        .group("Stimulation")
        .dataset("SampleRate", Array::scalar(20e3f64));
    let mut samples: Vec<i16> = (0..4 * 1000).map(|i| (i % 7000 + 4000) as i16).collect();
    samples[17] = 15204;
    samples[500] = 2;
    root.dataset("trial_0001", Array::matrix(4, 1000, samples));
    file
}
