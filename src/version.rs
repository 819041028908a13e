//! Header layouts written by successive WaveSurfer releases.
use std::fmt;

use log::debug;

use crate::{clock::Rounding, error::WavesurferError, header::HeaderTree};

/// A family of files sharing one header layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VersionTag {
    /// Nested `Acquisition`/`Stimulation` groups with `ChannelScales`.
    Legacy0p74,
    /// Nested groups, `AnalogChannelScales`, rates stored as requested.
    Legacy0p912,
    /// Nested groups, rates already coerced when written.
    Legacy0p913,
    Legacy0p933,
    /// Flat header with `AI*` field names.
    Current,
}

/// Where each canonical field lives for one [`VersionTag`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldTable {
    pub acquisition_rate: &'static str,
    pub stimulation_rate: &'static str,
    pub channel_count: Option<&'static str>,
    pub channel_scales: &'static str,
    /// Tried in order.
    pub channel_active: &'static [&'static str],
    pub coefficients: &'static str,
    pub channel_names: &'static str,
    pub channel_units: &'static str,
    /// Acquisition and stimulation rounding, when the stored rates are the
    /// requested ones rather than what the hardware ran at.
    pub clock_rounding: Option<(Rounding, Rounding)>,
}

const LEGACY_0P74: FieldTable = FieldTable {
    acquisition_rate: "Acquisition/SampleRate",
    stimulation_rate: "Stimulation/SampleRate",
    channel_count: None,
    channel_scales: "Acquisition/ChannelScales",
    channel_active: &["Acquisition/IsChannelActive"],
    coefficients: "Acquisition/AnalogScalingCoefficients",
    channel_names: "Acquisition/ChannelNames",
    channel_units: "Acquisition/ChannelUnits",
    clock_rounding: Some((Rounding::Floor, Rounding::NearestEven)),
};

const LEGACY_0P912: FieldTable = FieldTable {
    acquisition_rate: "Acquisition/SampleRate",
    stimulation_rate: "Stimulation/SampleRate",
    channel_count: None,
    channel_scales: "Acquisition/AnalogChannelScales",
    channel_active: &["Acquisition/IsAnalogChannelActive", "Acquisition/IsChannelActive"],
    coefficients: "Acquisition/AnalogScalingCoefficients",
    channel_names: "Acquisition/AnalogChannelNames",
    channel_units: "Acquisition/AnalogChannelUnits",
    clock_rounding: Some((Rounding::Floor, Rounding::NearestEven)),
};

const LEGACY_0P913: FieldTable = FieldTable {
    clock_rounding: None,
    ..LEGACY_0P912
};

const CURRENT: FieldTable = FieldTable {
    acquisition_rate: "AcquisitionSampleRate",
    stimulation_rate: "StimulationSampleRate",
    channel_count: Some("NAIChannels"),
    channel_scales: "AIChannelScales",
    channel_active: &["IsAIChannelActive"],
    coefficients: "AIScalingCoefficients",
    channel_names: "AIChannelNames",
    channel_units: "AIChannelUnits",
    clock_rounding: None,
};

impl VersionTag {
    /// Picks the layout from marker fields of the raw header.
    pub fn detect(header: &HeaderTree) -> Result<Self, WavesurferError> {
        let version = version_number(header);
        let tag = if header.value("AcquisitionSampleRate").is_some() {
            VersionTag::Current
        } else if header.group("Acquisition").is_some() {
            if header.value("Acquisition/ChannelScales").is_some() {
                VersionTag::Legacy0p74
            } else if header.value("Acquisition/AnalogChannelScales").is_some() {
                if version < 0.9125 {
                    VersionTag::Legacy0p912
                } else if version < 0.92 {
                    VersionTag::Legacy0p913
                } else {
                    VersionTag::Legacy0p933
                }
            } else {
                return Err(WavesurferError::UnrecognizedFormat(
                    "Acquisition group has no channel scales".to_owned(),
                ));
            }
        } else {
            return Err(WavesurferError::UnrecognizedFormat(
                "header has neither AcquisitionSampleRate nor an Acquisition group".to_owned(),
            ));
        };
        debug!("detected {tag} layout (VersionString {version})");
        Ok(tag)
    }

    pub fn fields(self) -> &'static FieldTable {
        match self {
            VersionTag::Legacy0p74 => &LEGACY_0P74,
            VersionTag::Legacy0p912 => &LEGACY_0P912,
            VersionTag::Legacy0p913 | VersionTag::Legacy0p933 => &LEGACY_0P913,
            VersionTag::Current => &CURRENT,
        }
    }
}

impl fmt::Display for VersionTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VersionTag::Legacy0p74 => "0.74",
            VersionTag::Legacy0p912 => "0.912",
            VersionTag::Legacy0p913 => "0.913",
            VersionTag::Legacy0p933 => "0.933",
            VersionTag::Current => "current",
        };
        f.write_str(name)
    }
}

/// `VersionString` as a number. Dotted release strings keep their first two
/// components, so "1.0.2" reads as 1.0. Missing or unparseable is 0.0.
pub fn version_number(header: &HeaderTree) -> f64 {
    let Some(value) = header.value("VersionString") else {
        return 0.0;
    };
    if let Some(number) = value.as_scalar_f64() {
        return number;
    }
    let Some(text) = value.to_strings().and_then(|v| v.into_iter().next()) else {
        return 0.0;
    };
    let text = text.trim();
    text.parse()
        .ok()
        .or_else(|| {
            let mut parts = text.splitn(3, '.');
            let major = parts.next()?;
            let minor = parts.next()?;
            format!("{major}.{minor}").parse().ok()
        })
        .unwrap_or(0.0)
}
