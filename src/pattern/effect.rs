// Effect chains - Per-track ordered effect configuration

use super::drum::DRUM_TRACK_COUNT;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Effect processor kind. Persisted by display name (`"Soft Clipper"`, `"EQ"`, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum EffectKind {
    Reverb,
    Delay,
    Distortion,
    Chorus,
    BitCrusher,
    Echo,
    Flanger,
    Limiter,
    PitchShift,
    SoftClip,
    StereoWidth,
    Compressor,
    Eq3,
}

impl EffectKind {
    pub const ALL: [EffectKind; 13] = [
        EffectKind::Reverb,
        EffectKind::Delay,
        EffectKind::Distortion,
        EffectKind::Chorus,
        EffectKind::BitCrusher,
        EffectKind::Echo,
        EffectKind::Flanger,
        EffectKind::Limiter,
        EffectKind::PitchShift,
        EffectKind::SoftClip,
        EffectKind::StereoWidth,
        EffectKind::Compressor,
        EffectKind::Eq3,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EffectKind::Reverb => "Reverb",
            EffectKind::Delay => "Delay",
            EffectKind::Distortion => "Distortion",
            EffectKind::Chorus => "Chorus",
            EffectKind::BitCrusher => "BitCrusher",
            EffectKind::Echo => "Echo",
            EffectKind::Flanger => "Flanger",
            EffectKind::Limiter => "Limiter",
            EffectKind::PitchShift => "Pitch",
            EffectKind::SoftClip => "Soft Clipper",
            EffectKind::StereoWidth => "Stereo Width",
            EffectKind::Compressor => "Compressor",
            EffectKind::Eq3 => "EQ",
        }
    }
}

impl fmt::Display for EffectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for EffectKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|k| k.name() == s)
            .ok_or_else(|| format!("unknown effect type '{}'", s))
    }
}

impl TryFrom<String> for EffectKind {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EffectKind> for String {
    fn from(kind: EffectKind) -> Self {
        kind.name().to_string()
    }
}

/// Unique identifier for an effect slot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectId(Uuid);

impl EffectId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for EffectId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for EffectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// Named numeric parameters of one effect. Missing names use the processor default.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EffectParams(BTreeMap<String, f32>);

impl EffectParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<f32> {
        self.0.get(name).copied()
    }

    /// Value of `name`, or `default` when unset or not finite
    pub fn get_or(&self, name: &str, default: f32) -> f32 {
        self.get(name).filter(|v| v.is_finite()).unwrap_or(default)
    }

    pub fn with(mut self, name: impl Into<String>, value: f32) -> Self {
        self.0.insert(name.into(), value);
        self
    }

    pub fn set(&mut self, name: impl Into<String>, value: f32) {
        self.0.insert(name.into(), value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One effect slot in a track's chain
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EffectConfig {
    pub id: EffectId,
    #[serde(rename = "type")]
    pub kind: EffectKind,
    #[serde(default)]
    pub params: EffectParams,
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl EffectConfig {
    /// Enabled slot with default parameters and a fresh id
    pub fn new(kind: EffectKind) -> Self {
        Self {
            id: EffectId::new(),
            kind,
            params: EffectParams::new(),
            enabled: true,
        }
    }

    pub fn with_params(mut self, params: EffectParams) -> Self {
        self.params = params;
        self
    }
}

/// Logical track: one of the drum lanes or the synth lane.
///
/// Persisted as `"drum-N"` or `"synth"`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum TrackId {
    Drum(usize),
    Synth,
}

impl TrackId {
    /// Every track in display order: drum lanes then synth
    pub fn all() -> impl Iterator<Item = TrackId> {
        (0..DRUM_TRACK_COUNT)
            .map(TrackId::Drum)
            .chain(std::iter::once(TrackId::Synth))
    }

    /// Whether this id names an existing track
    pub fn is_valid(self) -> bool {
        match self {
            TrackId::Drum(i) => i < DRUM_TRACK_COUNT,
            TrackId::Synth => true,
        }
    }
}

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackId::Drum(i) => write!(f, "drum-{}", i),
            TrackId::Synth => f.write_str("synth"),
        }
    }
}

impl FromStr for TrackId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s == "synth" {
            return Ok(TrackId::Synth);
        }
        s.strip_prefix("drum-")
            .and_then(|n| n.parse().ok())
            .map(TrackId::Drum)
            .ok_or_else(|| format!("unknown track id '{}'", s))
    }
}

impl TryFrom<String> for TrackId {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TrackId> for String {
    fn from(track: TrackId) -> Self {
        track.to_string()
    }
}

/// Effect chains keyed by track. A missing entry is an empty chain.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackEffects(BTreeMap<TrackId, Arc<Vec<EffectConfig>>>);

impl TrackEffects {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ordered chain for `track`
    pub fn chain(&self, track: TrackId) -> &[EffectConfig] {
        self.0.get(&track).map(|c| c.as_slice()).unwrap_or(&[])
    }

    /// Shared handle to a chain (used to detect which chains changed)
    pub fn chain_handle(&self, track: TrackId) -> Option<&Arc<Vec<EffectConfig>>> {
        self.0.get(&track)
    }

    pub fn contains_kind(&self, track: TrackId, kind: EffectKind) -> bool {
        self.chain(track).iter().any(|e| e.kind == kind)
    }

    pub fn find(&self, track: TrackId, id: EffectId) -> Option<&EffectConfig> {
        self.chain(track).iter().find(|e| e.id == id)
    }

    /// Copy with the chain of `track` replaced. Other chains stay shared.
    #[must_use]
    pub fn with_chain(&self, track: TrackId, chain: Vec<EffectConfig>) -> Self {
        let mut map = self.0.clone();
        if chain.is_empty() {
            map.remove(&track);
        } else {
            map.insert(track, Arc::new(chain));
        }
        Self(map)
    }

    /// Tracks that have a non-empty chain
    pub fn tracks(&self) -> impl Iterator<Item = TrackId> + '_ {
        self.0.keys().copied()
    }

    /// Whether every chain has at most one slot per kind
    pub fn kinds_are_unique(&self) -> bool {
        self.0.values().all(|chain| {
            chain
                .iter()
                .enumerate()
                .all(|(i, e)| chain[..i].iter().all(|p| p.kind != e.kind))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_id_round_trip_through_string() {
        for track in TrackId::all() {
            let text = track.to_string();
            assert_eq!(text.parse::<TrackId>().unwrap(), track);
        }
        assert_eq!("drum-3".parse::<TrackId>().unwrap(), TrackId::Drum(3));
        assert!("piano".parse::<TrackId>().is_err());
    }

    #[test]
    fn test_track_id_validity() {
        assert!(TrackId::Drum(9).is_valid());
        assert!(!TrackId::Drum(10).is_valid());
        assert!(TrackId::Synth.is_valid());
    }

    #[test]
    fn test_effect_kind_uses_display_names_on_disk() {
        let json = serde_json::to_string(&EffectKind::SoftClip).unwrap();
        assert_eq!(json, "\"Soft Clipper\"");
        let kind: EffectKind = serde_json::from_str("\"EQ\"").unwrap();
        assert_eq!(kind, EffectKind::Eq3);
    }

    #[test]
    fn test_track_effects_keyed_by_string() {
        let effects = TrackEffects::new()
            .with_chain(TrackId::Drum(0), vec![EffectConfig::new(EffectKind::Reverb)]);
        let json = serde_json::to_value(&effects).unwrap();
        assert!(json.get("drum-0").is_some());

        let back: TrackEffects = serde_json::from_value(json).unwrap();
        assert_eq!(back, effects);
    }

    #[test]
    fn test_empty_chain_removes_entry() {
        let effects = TrackEffects::new()
            .with_chain(TrackId::Synth, vec![EffectConfig::new(EffectKind::Delay)])
            .with_chain(TrackId::Synth, Vec::new());
        assert_eq!(effects.tracks().count(), 0);
        assert!(effects.chain(TrackId::Synth).is_empty());
    }

    #[test]
    fn test_params_fallback() {
        let params = EffectParams::new().with("mix", 0.5).with("bad", f32::NAN);
        assert_eq!(params.get_or("mix", 0.1), 0.5);
        assert_eq!(params.get_or("missing", 0.1), 0.1);
        assert_eq!(params.get_or("bad", 0.2), 0.2);
    }

    #[test]
    fn test_kinds_are_unique() {
        let ok = TrackEffects::new().with_chain(
            TrackId::Synth,
            vec![
                EffectConfig::new(EffectKind::Reverb),
                EffectConfig::new(EffectKind::Delay),
            ],
        );
        assert!(ok.kinds_are_unique());

        let bad = ok.with_chain(
            TrackId::Drum(1),
            vec![
                EffectConfig::new(EffectKind::Reverb),
                EffectConfig::new(EffectKind::Reverb),
            ],
        );
        assert!(!bad.kinds_are_unique());
    }
}
