// Drum lanes - Fixed set of percussion tracks with 16 activation cells each

use super::STEPS;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Default lane gain in dB
pub const DEFAULT_TRACK_GAIN_DB: f32 = -10.0;
/// Lowest accepted lane gain in dB
pub const MIN_TRACK_GAIN_DB: f32 = -60.0;
/// Highest accepted lane gain in dB
pub const MAX_TRACK_GAIN_DB: f32 = 0.0;

/// Percussion lane kind. The lane order is fixed: index 0 is always the kick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DrumKind {
    Kick,
    Snare,
    HiHat,
    Clap,
    Tom,
    Rim,
    Crash,
    Ride,
    Cowbell,
    Shaker,
}

impl DrumKind {
    /// All lanes in track order
    pub const ALL: [DrumKind; 10] = [
        DrumKind::Kick,
        DrumKind::Snare,
        DrumKind::HiHat,
        DrumKind::Clap,
        DrumKind::Tom,
        DrumKind::Rim,
        DrumKind::Crash,
        DrumKind::Ride,
        DrumKind::Cowbell,
        DrumKind::Shaker,
    ];

    /// Lane kind for a track index
    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }

    /// Track index of this lane
    pub fn index(self) -> usize {
        self as usize
    }

    /// Display name
    pub fn name(self) -> &'static str {
        match self {
            DrumKind::Kick => "Kick",
            DrumKind::Snare => "Snare",
            DrumKind::HiHat => "Hi-Hat",
            DrumKind::Clap => "Clap",
            DrumKind::Tom => "Tom",
            DrumKind::Rim => "Rim",
            DrumKind::Crash => "Crash",
            DrumKind::Ride => "Ride",
            DrumKind::Cowbell => "Cowbell",
            DrumKind::Shaker => "Shaker",
        }
    }

    /// Variants offered for this lane
    pub fn variants(self) -> &'static [DrumVariant] {
        use DrumVariant::*;
        match self {
            DrumKind::Kick => &[Modern, Eight08, Nine09, Acoustic, Distorted],
            DrumKind::Snare => &[Modern, Eight08, Trap, Rim, Acoustic],
            DrumKind::HiHat => &[Modern, Closed, Trap],
            DrumKind::Tom => &[Modern, Eight08],
            _ => &[Modern],
        }
    }

    /// Whether this lane offers `variant`
    pub fn supports(self, variant: DrumVariant) -> bool {
        self.variants().contains(&variant)
    }

    /// Map an unsupported variant to the lane default
    pub fn normalize(self, variant: DrumVariant) -> DrumVariant {
        if self.supports(variant) {
            variant
        } else {
            DrumVariant::Modern
        }
    }
}

impl fmt::Display for DrumKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for DrumKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == value)
            .ok_or_else(|| format!("unknown drum kind '{}'", value))
    }
}

impl From<DrumKind> for String {
    fn from(kind: DrumKind) -> Self {
        kind.name().to_string()
    }
}

/// Number of drum lanes
pub const DRUM_TRACK_COUNT: usize = DrumKind::ALL.len();

/// Sound character of a drum lane
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(try_from = "String", into = "String")]
pub enum DrumVariant {
    #[default]
    Modern,
    Eight08,
    Nine09,
    Acoustic,
    Distorted,
    Trap,
    Rim,
    Closed,
}

impl DrumVariant {
    pub fn label(self) -> &'static str {
        match self {
            DrumVariant::Modern => "Modern",
            DrumVariant::Eight08 => "808",
            DrumVariant::Nine09 => "909",
            DrumVariant::Acoustic => "Acoustic",
            DrumVariant::Distorted => "Distorted",
            DrumVariant::Trap => "Trap",
            DrumVariant::Rim => "Rim",
            DrumVariant::Closed => "Closed",
        }
    }

    /// Parse a variant label. Unknown labels return `None`.
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            "Modern" => Some(DrumVariant::Modern),
            "808" => Some(DrumVariant::Eight08),
            "909" => Some(DrumVariant::Nine09),
            "Acoustic" => Some(DrumVariant::Acoustic),
            "Distorted" => Some(DrumVariant::Distorted),
            "Trap" => Some(DrumVariant::Trap),
            "Rim" => Some(DrumVariant::Rim),
            "Closed" => Some(DrumVariant::Closed),
            _ => None,
        }
    }
}

impl fmt::Display for DrumVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl TryFrom<String> for DrumVariant {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_label(&value).ok_or_else(|| format!("unknown drum variant '{}'", value))
    }
}

impl From<DrumVariant> for String {
    fn from(variant: DrumVariant) -> Self {
        variant.label().to_string()
    }
}

/// Activation cells of one lane, packed into a bitset.
///
/// Persisted as a list of `STEPS` booleans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "[bool; 16]", into = "[bool; 16]")]
pub struct StepMask(u16);

impl StepMask {
    pub const EMPTY: StepMask = StepMask(0);

    /// Build a mask from the active step indices. Indices past the loop are ignored.
    pub fn from_steps(steps: &[usize]) -> Self {
        steps
            .iter()
            .filter(|&&s| s < STEPS)
            .fold(Self::EMPTY, |mask, &s| mask.with(s, true))
    }

    #[inline]
    pub fn get(self, step: usize) -> bool {
        step < STEPS && self.0 & (1 << step) != 0
    }

    /// Copy with one cell set or cleared
    #[must_use]
    pub fn with(self, step: usize, active: bool) -> Self {
        if step >= STEPS {
            return self;
        }
        if active {
            StepMask(self.0 | (1 << step))
        } else {
            StepMask(self.0 & !(1 << step))
        }
    }

    #[must_use]
    pub fn toggled(self, step: usize) -> Self {
        self.with(step, !self.get(step))
    }

    /// Active step indices in ascending order
    pub fn active_steps(self) -> impl Iterator<Item = usize> {
        (0..STEPS).filter(move |&s| self.get(s))
    }

    pub fn count(self) -> usize {
        self.0.count_ones() as usize
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<[bool; STEPS]> for StepMask {
    fn from(cells: [bool; STEPS]) -> Self {
        cells
            .iter()
            .enumerate()
            .fold(Self::EMPTY, |mask, (s, &on)| mask.with(s, on))
    }
}

impl From<StepMask> for [bool; STEPS] {
    fn from(mask: StepMask) -> Self {
        std::array::from_fn(|s| mask.get(s))
    }
}

/// One percussion lane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DrumTrack {
    pub kind: DrumKind,
    #[serde(default)]
    pub variant: DrumVariant,
    pub steps: StepMask,
    #[serde(default = "default_gain_db")]
    pub gain_db: f32,
    #[serde(default)]
    pub muted: bool,
}

fn default_gain_db() -> f32 {
    DEFAULT_TRACK_GAIN_DB
}

impl DrumTrack {
    /// Empty lane with default variant and gain
    pub fn new(kind: DrumKind) -> Self {
        Self {
            kind,
            variant: DrumVariant::Modern,
            steps: StepMask::EMPTY,
            gain_db: DEFAULT_TRACK_GAIN_DB,
            muted: false,
        }
    }

    #[inline]
    pub fn is_active(&self, step: usize) -> bool {
        self.steps.get(step)
    }

    /// Whether this lane should sound on `step`
    #[inline]
    pub fn fires_on(&self, step: usize) -> bool {
        !self.muted && self.steps.get(step)
    }
}

/// The ten drum lanes in fixed order
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DrumPattern {
    tracks: Vec<Arc<DrumTrack>>,
}

impl DrumPattern {
    /// All lanes empty
    pub fn new() -> Self {
        Self {
            tracks: DrumKind::ALL
                .iter()
                .map(|&kind| Arc::new(DrumTrack::new(kind)))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.tracks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tracks.is_empty()
    }

    pub fn track(&self, index: usize) -> Option<&DrumTrack> {
        self.tracks.get(index).map(Arc::as_ref)
    }

    /// Shared handle to a lane (used to check structural sharing)
    pub fn track_handle(&self, index: usize) -> Option<&Arc<DrumTrack>> {
        self.tracks.get(index)
    }

    pub fn tracks(&self) -> impl Iterator<Item = &DrumTrack> {
        self.tracks.iter().map(Arc::as_ref)
    }

    /// Copy with lane `index` replaced. Other lanes stay shared.
    #[must_use]
    pub fn with_track(&self, index: usize, track: DrumTrack) -> Self {
        let mut tracks = self.tracks.clone();
        if let Some(slot) = tracks.get_mut(index) {
            *slot = Arc::new(track);
        }
        Self { tracks }
    }

    /// Copy with every lane's cells cleared. Variant, gain and mute are kept.
    #[must_use]
    pub fn cleared(&self) -> Self {
        Self {
            tracks: self
                .tracks
                .iter()
                .map(|t| {
                    if t.steps.is_empty() {
                        Arc::clone(t)
                    } else {
                        Arc::new(DrumTrack {
                            steps: StepMask::EMPTY,
                            ..DrumTrack::clone(t)
                        })
                    }
                })
                .collect(),
        }
    }

    /// Ten lanes, each at its own index
    pub fn is_well_formed(&self) -> bool {
        self.tracks.len() == DRUM_TRACK_COUNT
            && self
                .tracks
                .iter()
                .enumerate()
                .all(|(i, t)| t.kind.index() == i)
    }
}

impl Default for DrumPattern {
    fn default() -> Self {
        Self::new()
    }
}
