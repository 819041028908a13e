//! The `/header` group as stored, and its normalized form.
use log::{debug, warn};
use wavesurfer_hdf5::Array;

use crate::{
    clock::{reconcile, ClockConfig},
    error::WavesurferError,
    version::{version_number, VersionTag},
};

#[derive(Debug, Clone, PartialEq)]
pub enum HeaderNode {
    Value(Array),
    Group(HeaderTree),
}

/// Header fields in stored order. Subgroups nest; group attributes appear as
/// values next to datasets.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HeaderTree {
    entries: Vec<(String, HeaderNode)>,
}

impl HeaderTree {
    /// Adds `node` under `name`, replacing an existing entry of that name.
    pub fn insert(&mut self, name: impl Into<String>, node: HeaderNode) {
        let name = name.into();
        match self.entries.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = node,
            None => self.entries.push((name, node)),
        }
    }

    /// Looks up a slash-separated path such as `Acquisition/SampleRate`.
    pub fn get(&self, path: &str) -> Option<&HeaderNode> {
        let mut parts = path.split('/').filter(|p| !p.is_empty());
        let first = parts.next()?;
        let mut node = self.entries.iter().find(|(n, _)| n == first).map(|(_, v)| v)?;
        for part in parts {
            let HeaderNode::Group(tree) = node else {
                return None;
            };
            node = tree.entries.iter().find(|(n, _)| n == part).map(|(_, v)| v)?;
        }
        Some(node)
    }

    pub fn value(&self, path: &str) -> Option<&Array> {
        match self.get(path)? {
            HeaderNode::Value(array) => Some(array),
            HeaderNode::Group(_) => None,
        }
    }

    pub fn group(&self, path: &str) -> Option<&HeaderTree> {
        match self.get(path)? {
            HeaderNode::Group(tree) => Some(tree),
            HeaderNode::Value(_) => None,
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &HeaderNode)> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Header fields every supported layout is mapped into.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalHeader {
    pub version: VersionTag,
    /// `VersionString` as a number, 0.0 when absent.
    pub version_number: f64,
    pub acquisition_sample_rate: f64,
    pub stimulation_sample_rate: f64,
    pub n_ai_channels: usize,
    pub is_channel_active: Vec<bool>,
    /// One divisor per channel, active or not.
    pub channel_scales: Vec<f64>,
    /// Polynomial rows as stored, per channel or per active channel.
    pub scaling_coefficients: Option<Vec<Vec<f64>>>,
    pub channel_names: Option<Vec<String>>,
    pub channel_units: Option<Vec<String>>,
}

impl CanonicalHeader {
    pub fn n_active_channels(&self) -> usize {
        self.is_channel_active.iter().filter(|&&a| a).count()
    }

    fn active<T: Clone>(&self, values: &[T]) -> Vec<T> {
        values
            .iter()
            .zip(&self.is_channel_active)
            .filter(|(_, active)| **active)
            .map(|(v, _)| v.clone())
            .collect()
    }

    pub fn active_channel_scales(&self) -> Vec<f64> {
        self.active(&self.channel_scales)
    }

    /// Coefficient rows for the active channels, in channel order.
    pub fn active_coefficients(&self) -> Result<Vec<Vec<f64>>, WavesurferError> {
        let rows = self
            .scaling_coefficients
            .as_ref()
            .ok_or(WavesurferError::MissingCoefficients)?;
        let n_active = self.n_active_channels();
        if rows.len() == n_active {
            Ok(rows.clone())
        } else if rows.len() == self.n_ai_channels {
            Ok(self.active(rows))
        } else {
            Err(WavesurferError::ShapeMismatch {
                what: "coefficient row count",
                expected: self.n_ai_channels,
                found: rows.len(),
            })
        }
    }

    /// Names of the active channels, `ai<index>` where the file has none.
    pub fn active_channel_names(&self) -> Vec<String> {
        let all: Vec<String> = (0..self.n_ai_channels)
            .map(|i| {
                self.channel_names
                    .as_ref()
                    .and_then(|names| names.get(i))
                    .filter(|name| !name.is_empty())
                    .cloned()
                    .unwrap_or_else(|| format!("ai{i}"))
            })
            .collect();
        self.active(&all)
    }
}

/// Maps the raw header of a `version` file into a [`CanonicalHeader`].
///
/// Legacy files that stored requested rather than achieved sample rates are
/// passed through the clock reconciler with that release's rounding.
pub fn normalize(
    raw: &HeaderTree,
    version: VersionTag,
    clock: &ClockConfig,
) -> Result<CanonicalHeader, WavesurferError> {
    let fields = version.fields();
    let mut acquisition_sample_rate = scalar(raw, fields.acquisition_rate)?;
    let mut stimulation_sample_rate = scalar(raw, fields.stimulation_rate)?;
    if let Some((acquisition, stimulation)) = fields.clock_rounding {
        acquisition_sample_rate = reconcile(acquisition_sample_rate, clock, acquisition)?;
        stimulation_sample_rate = reconcile(stimulation_sample_rate, clock, stimulation)?;
    }

    let channel_scales = floats(raw, fields.channel_scales)?;
    let n_ai_channels = match fields.channel_count {
        Some(key) if raw.value(key).is_some() => count(raw, key)?,
        _ => channel_scales.len(),
    };
    if channel_scales.len() != n_ai_channels {
        return Err(WavesurferError::ShapeMismatch {
            what: "channel scale count",
            expected: n_ai_channels,
            found: channel_scales.len(),
        });
    }

    let is_channel_active = match fields.channel_active.iter().find_map(|k| raw.value(k).map(|v| (k, v))) {
        Some((key, value)) => value.to_bool_vec().ok_or_else(|| invalid(key, value))?,
        None => {
            debug!("no active channel mask, treating all {n_ai_channels} channels as active");
            vec![true; n_ai_channels]
        }
    };
    if is_channel_active.len() != n_ai_channels {
        return Err(WavesurferError::ShapeMismatch {
            what: "active channel mask length",
            expected: n_ai_channels,
            found: is_channel_active.len(),
        });
    }
    if let Some(index) = channel_scales.iter().position(|&s| s == 0.0) {
        warn!("channel {index} has a zero channel scale");
    }

    Ok(CanonicalHeader {
        version,
        version_number: version_number(raw),
        acquisition_sample_rate,
        stimulation_sample_rate,
        n_ai_channels,
        is_channel_active,
        channel_scales,
        scaling_coefficients: raw.value(fields.coefficients).map(coefficient_rows).transpose()?,
        channel_names: raw.value(fields.channel_names).and_then(Array::to_strings),
        channel_units: raw.value(fields.channel_units).and_then(Array::to_strings),
    })
}

fn invalid(field: &str, value: &Array) -> WavesurferError {
    WavesurferError::InvalidField {
        field: field.to_owned(),
        found: value.data.type_name(),
    }
}

fn required<'a>(raw: &'a HeaderTree, field: &str) -> Result<&'a Array, WavesurferError> {
    raw.value(field)
        .ok_or_else(|| WavesurferError::MissingField(field.to_owned()))
}

fn scalar(raw: &HeaderTree, field: &str) -> Result<f64, WavesurferError> {
    let value = required(raw, field)?;
    value.as_scalar_f64().ok_or_else(|| invalid(field, value))
}

fn floats(raw: &HeaderTree, field: &str) -> Result<Vec<f64>, WavesurferError> {
    let value = required(raw, field)?;
    value.to_f64_vec().ok_or_else(|| invalid(field, value))
}

fn count(raw: &HeaderTree, field: &str) -> Result<usize, WavesurferError> {
    let n = scalar(raw, field)?;
    if n < 0.0 || n.fract() != 0.0 {
        return Err(WavesurferError::InvalidField {
            field: field.to_owned(),
            found: "non-integer",
        });
    }
    Ok(n as usize)
}

/// Splits a coefficient dataset into rows. A matrix is `channels x order`; a
/// vector or scalar is a single row.
fn coefficient_rows(value: &Array) -> Result<Vec<Vec<f64>>, WavesurferError> {
    let flat = value.to_f64_vec().ok_or_else(|| invalid("scaling coefficients", value))?;
    match value.shape.as_slice() {
        [rows, cols] => {
            let (rows, cols) = (*rows as usize, *cols as usize);
            if cols == 0 {
                return Ok(vec![Vec::new(); rows]);
            }
            Ok(flat.chunks(cols).map(<[f64]>::to_vec).collect())
        }
        [] | [_] => Ok(vec![flat]),
        shape => Err(WavesurferError::ShapeMismatch {
            what: "scaling coefficient rank",
            expected: 2,
            found: shape.len(),
        }),
    }
}

#[cfg(test)]
mod test {
    use pretty_assertions::assert_eq;

    use super::*;

    fn value(array: Array) -> HeaderNode {
        HeaderNode::Value(array)
    }

    fn current() -> HeaderTree {
        let mut raw = HeaderTree::default();
        raw.insert("VersionString", value(Array::string("1.0.2")));
        raw.insert("AcquisitionSampleRate", value(Array::scalar(20e3f64)));
        raw.insert("StimulationSampleRate", value(Array::scalar(20e3f64)));
        raw.insert("NAIChannels", value(Array::scalar(3.0f64)));
        raw.insert("AIChannelScales", value(Array::vector(vec![0.1f64, 0.2, 0.5])));
        raw.insert("IsAIChannelActive", value(Array::vector(vec![1u8, 0, 1])));
        raw.insert(
            "AIScalingCoefficients",
            value(Array::matrix(3, 2, vec![0.0f64, 1.0, 0.0, 2.0, 0.0, 3.0])),
        );
        raw.insert(
            "AIChannelNames",
            value(Array::vector(vec!["Vm".to_owned(), "".to_owned(), "Im".to_owned()])),
        );
        raw
    }

    #[test]
    fn test_tree_paths() {
        let mut inner = HeaderTree::default();
        inner.insert("SampleRate", value(Array::scalar(1.0f64)));
        let mut tree = HeaderTree::default();
        tree.insert("Acquisition", HeaderNode::Group(inner));
        assert!(tree.value("Acquisition/SampleRate").is_some());
        assert!(tree.value("/Acquisition/SampleRate").is_some());
        assert!(tree.value("Acquisition").is_none());
        assert!(tree.group("Acquisition").is_some());
        assert!(tree.get("Acquisition/SampleRate/Deeper").is_none());
        assert!(tree.get("Stimulation/SampleRate").is_none());
        assert_eq!(tree.len(), 1);
    }

    #[test]
    fn test_normalize_current() -> eyre::Result<()> {
        let header = normalize(&current(), VersionTag::Current, &ClockConfig::default())?;
        assert_eq!(header.acquisition_sample_rate, 20e3);
        assert_eq!(header.n_ai_channels, 3);
        assert_eq!(header.n_active_channels(), 2);
        assert_eq!(header.version_number, 1.0);
        assert_eq!(header.active_channel_scales(), vec![0.1, 0.5]);
        assert_eq!(
            header.active_coefficients()?,
            vec![vec![0.0, 1.0], vec![0.0, 3.0]]
        );
        assert_eq!(header.active_channel_names(), vec!["Vm", "Im"]);
        Ok(())
    }

    #[test]
    fn test_coefficients_per_active_channel() -> eyre::Result<()> {
        let mut raw = current();
        raw.insert(
            "AIScalingCoefficients",
            value(Array::matrix(2, 1, vec![7.0f64, 8.0])),
        );
        let header = normalize(&raw, VersionTag::Current, &ClockConfig::default())?;
        assert_eq!(header.active_coefficients()?, vec![vec![7.0], vec![8.0]]);

        raw.insert("AIScalingCoefficients", value(Array::matrix(4, 1, vec![0.0f64; 4])));
        let header = normalize(&raw, VersionTag::Current, &ClockConfig::default())?;
        assert!(matches!(
            header.active_coefficients(),
            Err(WavesurferError::ShapeMismatch { .. })
        ));
        Ok(())
    }

    #[test]
    fn test_missing_coefficients_only_fail_on_use() -> eyre::Result<()> {
        let mut raw = HeaderTree::default();
        let mut acquisition = HeaderTree::default();
        acquisition.insert("SampleRate", value(Array::scalar(29997.0f64)));
        acquisition.insert("ChannelScales", value(Array::vector(vec![1.0f64; 4])));
        let mut stimulation = HeaderTree::default();
        stimulation.insert("SampleRate", value(Array::scalar(29997.0f64)));
        raw.insert("Acquisition", HeaderNode::Group(acquisition));
        raw.insert("Stimulation", HeaderNode::Group(stimulation));

        let clock = ClockConfig::default();
        let header = normalize(&raw, VersionTag::Legacy0p74, &clock)?;
        assert_eq!(header.n_ai_channels, 4);
        assert_eq!(header.n_active_channels(), 4);
        assert_eq!(clock.ticks_per_sample(header.acquisition_sample_rate), 3333.0);
        assert_eq!(clock.ticks_per_sample(header.stimulation_sample_rate), 3334.0);
        assert_eq!(
            header.active_coefficients().unwrap_err().to_string(),
            "Unable to read channel scaling coefficients"
        );
        assert_eq!(header.active_channel_names(), vec!["ai0", "ai1", "ai2", "ai3"]);
        Ok(())
    }

    #[test]
    fn test_missing_rate() {
        let mut raw = current();
        raw.insert("StimulationSampleRate", value(Array::string("fast")));
        assert!(matches!(
            normalize(&raw, VersionTag::Current, &ClockConfig::default()),
            Err(WavesurferError::InvalidField { .. })
        ));
        assert!(matches!(
            normalize(&current(), VersionTag::Legacy0p933, &ClockConfig::default()),
            Err(WavesurferError::MissingField(f)) if f == "Acquisition/SampleRate"
        ));
    }

    #[test]
    fn test_mask_length_checked() {
        let mut raw = current();
        raw.insert("IsAIChannelActive", value(Array::vector(vec![1u8, 1])));
        assert!(matches!(
            normalize(&raw, VersionTag::Current, &ClockConfig::default()),
            Err(WavesurferError::ShapeMismatch { what: "active channel mask length", .. })
        ));
    }

    #[test]
    fn test_coefficient_rows() -> eyre::Result<()> {
        assert_eq!(coefficient_rows(&Array::scalar(0.5f64))?, vec![vec![0.5]]);
        assert_eq!(
            coefficient_rows(&Array::matrix(2, 0, Vec::<f64>::new()))?,
            vec![Vec::<f64>::new(), Vec::new()]
        );
        assert!(coefficient_rows(&Array::new(vec![1, 1, 1], vec![1.0f64])).is_err());
        Ok(())
    }
}
