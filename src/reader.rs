//! Decoding a whole file: header normalization followed by every sweep.
use std::{ffi::OsStr, fmt, path::Path, str::FromStr};

use log::debug;
use wavesurfer_hdf5::{Array, ArrayData, File, Hdf5Error, NodeKind};

use crate::{
    clock::ClockConfig,
    container::Container,
    error::WavesurferError,
    header::{normalize, CanonicalHeader, HeaderNode, HeaderTree},
    scaling::{scale, Precision, RawBlock, ScaledBlock},
    version::VersionTag,
};

/// What sweeps are decoded into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Scaled to physical units as `f64`.
    #[default]
    Double,
    /// Scaled to physical units as `f32`.
    Single,
    /// Raw int16 counts only.
    Raw,
}

impl OutputFormat {
    /// Precision of scaled output, `None` for [`OutputFormat::Raw`].
    pub fn precision(self) -> Option<Precision> {
        match self {
            OutputFormat::Double => Some(Precision::Double),
            OutputFormat::Single => Some(Precision::Single),
            OutputFormat::Raw => None,
        }
    }
}

impl FromStr for OutputFormat {
    type Err = WavesurferError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" | "double" => Ok(OutputFormat::Double),
            "single" => Ok(OutputFormat::Single),
            "raw" => Ok(OutputFormat::Raw),
            _ => Err(WavesurferError::UnknownOutputFormat(s.to_owned())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputFormat::Double => "double",
            OutputFormat::Single => "single",
            OutputFormat::Raw => "raw",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DecodeOptions {
    pub format: OutputFormat,
    pub clock: ClockConfig,
}

/// One `sweep_*` group or `trial_*` dataset.
#[derive(Debug, Clone, PartialEq)]
pub struct SweepRecord {
    pub name: String,
    pub raw: RawBlock,
    /// Present for scaled output formats. Trials are never scaled.
    pub scaled: Option<ScaledBlock>,
    /// Bit-packed digital lines, as stored.
    pub digital_scans: Option<Array>,
    pub timestamp: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DecodedFile {
    pub header: CanonicalHeader,
    /// Every field of `/header`, including ones the canonical header drops.
    pub raw_header: HeaderTree,
    /// In stored order.
    pub sweeps: Vec<SweepRecord>,
}

impl DecodedFile {
    pub fn sweep(&self, name: &str) -> Option<&SweepRecord> {
        self.sweeps.iter().find(|s| s.name == name)
    }

    pub fn sweep_names(&self) -> impl Iterator<Item = &str> {
        self.sweeps.iter().map(|s| s.name.as_str())
    }
}

/// Decodes the file at `path` with the default clock configuration.
pub fn load_data_file<P: AsRef<Path>>(
    path: P,
    format: OutputFormat,
) -> Result<DecodedFile, WavesurferError> {
    load_data_file_with(
        path,
        &DecodeOptions {
            format,
            ..Default::default()
        },
    )
}

pub fn load_data_file_with<P: AsRef<Path>>(
    path: P,
    options: &DecodeOptions,
) -> Result<DecodedFile, WavesurferError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(WavesurferError::FileNotFound(path.to_owned()));
    }
    let is_h5 = path
        .extension()
        .and_then(OsStr::to_str)
        .is_some_and(|ext| ext.eq_ignore_ascii_case("h5"));
    if !is_h5 {
        return Err(WavesurferError::NotHdf5File(path.to_owned()));
    }
    let file = File::open(path).map_err(|source| match source {
        Hdf5Error::IOError(source) => WavesurferError::Unreadable {
            path: path.to_owned(),
            source,
        },
        source => WavesurferError::InvalidContainer {
            path: path.to_owned(),
            source,
        },
    })?;
    debug!("decoding {} as {}", path.display(), options.format);
    load_from_container(&file, options)
}

struct Calibration {
    scales: Vec<f64>,
    coefficients: Vec<Vec<f64>>,
    precision: Precision,
}

/// Decodes an already opened container.
pub fn load_from_container<C: Container + ?Sized>(
    container: &C,
    options: &DecodeOptions,
) -> Result<DecodedFile, WavesurferError> {
    let root = container.list_children("/")?;
    if !root
        .iter()
        .any(|c| c.name == "header" && c.kind == NodeKind::Group)
    {
        return Err(WavesurferError::UnrecognizedFormat(
            "no /header group".to_owned(),
        ));
    }
    let raw_header = crawl_header(container, "/header")?;
    let version = VersionTag::detect(&raw_header)?;
    let header = normalize(&raw_header, version, &options.clock)?;

    let has_sweeps = root
        .iter()
        .any(|c| c.kind == NodeKind::Group && c.name.starts_with("sweep_"));
    let calibration = match options.format.precision() {
        Some(precision) if has_sweeps => Some(Calibration {
            scales: header.active_channel_scales(),
            coefficients: header.active_coefficients()?,
            precision,
        }),
        _ => None,
    };

    let mut sweeps = Vec::new();
    for child in root {
        match child.kind {
            NodeKind::Group if child.name.starts_with("sweep_") => {
                sweeps.push(read_sweep(container, child.name, calibration.as_ref())?);
            }
            NodeKind::Dataset if child.name.starts_with("trial_") => {
                let raw = raw_block(&container.read_dataset(&child.name)?, &child.name)?;
                debug!("{}: {} channels x {} scans", child.name, raw.channels(), raw.scans());
                sweeps.push(SweepRecord {
                    name: child.name,
                    raw,
                    scaled: None,
                    digital_scans: None,
                    timestamp: None,
                });
            }
            _ if child.name == "header" => {}
            _ => debug!("ignoring /{}", child.name),
        }
    }
    Ok(DecodedFile {
        header,
        raw_header,
        sweeps,
    })
}

fn read_sweep<C: Container + ?Sized>(
    container: &C,
    name: String,
    calibration: Option<&Calibration>,
) -> Result<SweepRecord, WavesurferError> {
    let members = container.list_children(&name)?;
    let has = |member: &str| {
        members
            .iter()
            .any(|c| c.kind == NodeKind::Dataset && c.name == member)
    };

    let raw = if has("analogScans") {
        let path = format!("{name}/analogScans");
        raw_block(&container.read_dataset(&path)?, &path)?
    } else {
        debug!("{name} has no analogScans");
        RawBlock::new(0, 0, Vec::new())?
    };
    let scaled = match calibration {
        Some(c) if has("analogScans") => {
            Some(scale(&raw, &c.scales, &c.coefficients, c.precision)?)
        }
        _ => None,
    };
    let digital_scans = if has("digitalScans") {
        Some(container.read_dataset(&format!("{name}/digitalScans"))?)
    } else {
        None
    };
    let timestamp = if has("timestamp") {
        container
            .read_dataset(&format!("{name}/timestamp"))?
            .as_scalar_f64()
    } else {
        None
    };
    debug!("{name}: {} channels x {} scans", raw.channels(), raw.scans());
    Ok(SweepRecord {
        name,
        raw,
        scaled,
        digital_scans,
        timestamp,
    })
}

/// Interprets a stored int16 dataset of shape `[channels, scans]`. A vector
/// is a single channel.
fn raw_block(array: &Array, path: &str) -> Result<RawBlock, WavesurferError> {
    let ArrayData::I16(samples) = &array.data else {
        return Err(WavesurferError::InvalidField {
            field: path.to_owned(),
            found: array.data.type_name(),
        });
    };
    let (channels, scans) = match array.shape.as_slice() {
        [scans] => (1, *scans as usize),
        [channels, scans] => (*channels as usize, *scans as usize),
        shape => {
            return Err(WavesurferError::ShapeMismatch {
                what: "sample block rank",
                expected: 2,
                found: shape.len(),
            })
        }
    };
    RawBlock::new(channels, scans, samples.clone())
}

/// Reads a header group recursively. Leaves the container cannot decode are
/// skipped.
fn crawl_header<C: Container + ?Sized>(
    container: &C,
    path: &str,
) -> Result<HeaderTree, WavesurferError> {
    let mut tree = HeaderTree::default();
    for name in container.attribute_names(path)? {
        match container.read_attribute(path, &name) {
            Ok(value) => tree.insert(name, HeaderNode::Value(value)),
            Err(e) => debug!("skipping attribute {name} of {path}: {e}"),
        }
    }
    for child in container.list_children(path)? {
        let child_path = format!("{path}/{}", child.name);
        match child.kind {
            NodeKind::Group => {
                let group = crawl_header(container, &child_path)?;
                tree.insert(child.name, HeaderNode::Group(group));
            }
            NodeKind::Dataset => match container.read_dataset(&child_path) {
                Ok(value) => tree.insert(child.name, HeaderNode::Value(value)),
                Err(e) => debug!("skipping header field {child_path}: {e}"),
            },
        }
    }
    Ok(tree)
}

#[cfg(test)]
mod test {
    use std::collections::HashMap;

    use pretty_assertions::assert_eq;
    use wavesurfer_hdf5::{builder::FileBuilder, Child, Hdf5Error};

    use super::*;

    /// Flat path to value store, for exercising the decoder without HDF5.
    #[derive(Default)]
    struct MemoryContainer {
        groups: HashMap<String, Vec<Child>>,
        datasets: HashMap<String, Array>,
    }

    impl MemoryContainer {
        fn add(&mut self, path: &str, value: Option<Array>) {
            let (parent, name) = path.rsplit_once('/').unwrap_or(("", path));
            let parent = if parent.is_empty() { "/" } else { parent };
            let kind = match value {
                Some(value) => {
                    self.datasets.insert(path.to_owned(), value);
                    NodeKind::Dataset
                }
                None => {
                    self.groups.entry(path.to_owned()).or_default();
                    NodeKind::Group
                }
            };
            self.groups.entry(parent.to_owned()).or_default().push(Child {
                name: name.to_owned(),
                kind,
            });
        }
    }

    impl Container for MemoryContainer {
        fn list_children(&self, path: &str) -> Result<Vec<Child>, WavesurferError> {
            let path = if path == "/" { "/" } else { path.trim_start_matches('/') };
            let key = if path.is_empty() { "/" } else { path };
            self.groups
                .get(key)
                .cloned()
                .ok_or_else(|| Hdf5Error::PathNotFound(path.to_owned()).into())
        }

        fn attribute_names(&self, _path: &str) -> Result<Vec<String>, WavesurferError> {
            Ok(Vec::new())
        }

        fn read_attribute(&self, path: &str, name: &str) -> Result<Array, WavesurferError> {
            Err(Hdf5Error::AttributeNotFound {
                path: path.to_owned(),
                name: name.to_owned(),
            }
            .into())
        }

        fn read_dataset(&self, path: &str) -> Result<Array, WavesurferError> {
            self.datasets
                .get(path.trim_start_matches('/'))
                .cloned()
                .ok_or_else(|| Hdf5Error::PathNotFound(path.to_owned()).into())
        }
    }

    fn memory_file() -> MemoryContainer {
        let mut c = MemoryContainer::default();
        c.add("header", None);
        c.add("header/AcquisitionSampleRate", Some(Array::scalar(10e3f64)));
        c.add("header/StimulationSampleRate", Some(Array::scalar(10e3f64)));
        c.add("header/AIChannelScales", Some(Array::vector(vec![2.0f64])));
        c.add("header/AIScalingCoefficients", Some(Array::matrix(1, 2, vec![0.0f64, 1.0])));
        c.add("sweep_0001", None);
        c.add("sweep_0001/analogScans", Some(Array::matrix(1, 3, vec![2i16, 4, 6])));
        c.add("sweep_0001/timestamp", Some(Array::scalar(1.5f64)));
        c
    }

    #[test]
    fn test_output_format_from_str() -> eyre::Result<()> {
        assert_eq!("".parse::<OutputFormat>()?, OutputFormat::Double);
        assert_eq!("Double".parse::<OutputFormat>()?, OutputFormat::Double);
        assert_eq!("single".parse::<OutputFormat>()?, OutputFormat::Single);
        assert_eq!(" RAW ".parse::<OutputFormat>()?, OutputFormat::Raw);
        assert!("half".parse::<OutputFormat>().is_err());
        assert_eq!(OutputFormat::Single.to_string(), "single");
        Ok(())
    }

    #[test]
    fn test_memory_container() -> eyre::Result<()> {
        let decoded = load_from_container(&memory_file(), &DecodeOptions::default())?;
        assert_eq!(decoded.header.version, VersionTag::Current);
        assert_eq!(decoded.header.n_ai_channels, 1);
        let sweep = decoded.sweep("sweep_0001").unwrap();
        assert_eq!(sweep.raw.samples(), &[2, 4, 6]);
        assert_eq!(
            sweep.scaled.as_ref().and_then(|s| s.as_f64()),
            Some(&[1.0, 2.0, 3.0][..])
        );
        assert_eq!(sweep.timestamp, Some(1.5));
        assert_eq!(sweep.digital_scans, None);
        Ok(())
    }

    #[test]
    fn test_missing_header_group() {
        let mut c = MemoryContainer::default();
        c.add("sweep_0001", None);
        let err = load_from_container(&c, &DecodeOptions::default()).unwrap_err();
        assert!(matches!(err, WavesurferError::UnrecognizedFormat(_)));
    }

    #[test]
    fn test_raw_skips_calibration() -> eyre::Result<()> {
        let mut c = memory_file();
        c.datasets.remove("header/AIScalingCoefficients");
        assert!(matches!(
            load_from_container(&c, &DecodeOptions::default()),
            Err(WavesurferError::MissingCoefficients)
        ));
        let options = DecodeOptions {
            format: OutputFormat::Raw,
            ..Default::default()
        };
        let decoded = load_from_container(&c, &options)?;
        assert_eq!(decoded.sweeps[0].scaled, None);
        Ok(())
    }

    #[test]
    fn test_header_attributes_and_skipped_leaves() -> eyre::Result<()> {
        let mut builder = FileBuilder::new();
        let header = builder.root().group("header");
        header
            .attribute("Comment", Array::string("cell 3"))
            .dataset("AcquisitionSampleRate", Array::scalar(10e3f64))
            .dataset("StimulationSampleRate", Array::scalar(10e3f64))
            .dataset("AIChannelScales", Array::vector(Vec::<f64>::new()));
        header.group("Display").dataset("IsEnabled", Array::scalar(1u8));
        let file = File::from_bytes(builder.to_bytes()?)?;
        let decoded = load_from_container(&file, &DecodeOptions::default())?;
        assert_eq!(
            decoded.raw_header.value("Comment").and_then(Array::to_strings),
            Some(vec!["cell 3".to_owned()])
        );
        assert_eq!(
            decoded.raw_header.value("Display/IsEnabled"),
            Some(&Array::scalar(1u8))
        );
        assert_eq!(decoded.header.n_ai_channels, 0);
        assert!(decoded.sweeps.is_empty());
        Ok(())
    }

    #[test]
    fn test_raw_block_shapes() -> eyre::Result<()> {
        let block = raw_block(&Array::vector(vec![1i16, 2, 3]), "x")?;
        assert_eq!((block.channels(), block.scans()), (1, 3));
        assert!(matches!(
            raw_block(&Array::vector(vec![1.0f64]), "x"),
            Err(WavesurferError::InvalidField { found: "float64", .. })
        ));
        Ok(())
    }
}
