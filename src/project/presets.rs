// Presets - Built-in patterns and the user preset library

use crate::pattern::DrumKind::{HiHat, Kick, Snare};
use crate::pattern::DrumVariant::{
    Acoustic, Closed, Distorted, Eight08, Modern, Nine09, Rim, Trap,
};
use crate::pattern::{AppState, DrumKind, DrumTrack, DrumVariant, Pitch, StepMask, SynthNote};
use crate::project::PersistenceError;
use crate::project::migration::LEGACY_NOTE_DURATION;
use crate::project::persistence::write_atomically;
use crate::project::types::{FORMAT_VERSION, Preset, PresetFile};
use std::fs;
use std::path::{Path, PathBuf};

struct PresetRecipe {
    name: &'static str,
    bpm: f64,
    /// Active cells per lane index
    drums: fn(usize, usize) -> bool,
    variant: fn(DrumKind) -> DrumVariant,
    synth: &'static [(usize, &'static [&'static str])],
}

const RECIPES: [PresetRecipe; 8] = [
    PresetRecipe {
        name: "Techno",
        bpm: 130.0,
        drums: |lane, step| match lane {
            0 => step % 4 == 0,
            2 => step % 2 == 1,
            _ => false,
        },
        variant: |kind| match kind {
            Kick => Nine09,
            HiHat => Closed,
            _ => Modern,
        },
        synth: &[(2, &["C2", "C3"]), (6, &["C2", "C3"]), (10, &["C2", "C3"]), (14, &["C2", "C3"])],
    },
    PresetRecipe {
        name: "Hip Hop",
        bpm: 90.0,
        drums: |lane, step| match lane {
            0 => matches!(step, 0 | 7 | 10),
            1 => matches!(step, 4 | 12),
            2 => step % 2 == 0,
            _ => false,
        },
        variant: |kind| match kind {
            Kick => Eight08,
            Snare | HiHat => Trap,
            _ => Eight08,
        },
        synth: &[(0, &["C2"]), (8, &["G2"])],
    },
    PresetRecipe {
        name: "House",
        bpm: 124.0,
        drums: |lane, step| match lane {
            0 => step % 4 == 0,
            2 => step % 2 == 1,
            3 => matches!(step, 4 | 12),
            _ => false,
        },
        variant: |_| Modern,
        synth: &[
            (0, &["C2"]),
            (2, &["C2"]),
            (3, &["E2"]),
            (4, &["G2"]),
            (6, &["A2"]),
            (8, &["C2"]),
            (10, &["C2"]),
            (12, &["G2"]),
            (14, &["Bb2"]),
        ],
    },
    PresetRecipe {
        name: "Trap",
        bpm: 140.0,
        drums: |lane, step| match lane {
            0 => matches!(step, 0 | 10),
            1 => step == 8,
            2 => step % 2 == 0 || step % 3 == 0,
            _ => false,
        },
        variant: |kind| match kind {
            Kick => Distorted,
            Snare | HiHat => Trap,
            _ => Eight08,
        },
        synth: &[(0, &["D2"]), (3, &["D2"]), (6, &["F2"])],
    },
    PresetRecipe {
        name: "80s Pop",
        bpm: 110.0,
        drums: |lane, step| match lane {
            0 => matches!(step, 0 | 8),
            1 => matches!(step, 4 | 12),
            _ => false,
        },
        variant: |kind| match kind {
            Snare => Eight08,
            _ => Modern,
        },
        synth: &[
            (0, &["C3", "E3", "G3"]),
            (2, &["C3", "E3", "G3"]),
            (4, &["C3", "E3", "G3"]),
            (6, &["C3", "E3", "G3"]),
            (8, &["C3", "E3", "G3"]),
            (10, &["C3", "E3", "G3"]),
            (12, &["C3", "E3", "G3"]),
            (14, &["C3", "E3", "G3"]),
        ],
    },
    PresetRecipe {
        name: "Lofi",
        bpm: 80.0,
        drums: |lane, step| match lane {
            0 => matches!(step, 0 | 8 | 11),
            1 => matches!(step, 4 | 12),
            2 => step % 2 == 0,
            _ => false,
        },
        variant: |_| Acoustic,
        synth: &[(0, &["E3", "G3", "B3"]), (8, &["D3", "F#3", "A3"])],
    },
    PresetRecipe {
        name: "DnB",
        bpm: 174.0,
        drums: |lane, step| match lane {
            0 => matches!(step, 0 | 10),
            1 => matches!(step, 4 | 12),
            2 => true,
            _ => false,
        },
        variant: |kind| match kind {
            Snare => Rim,
            _ => Modern,
        },
        synth: &[(0, &["F2"]), (2, &["C3"]), (10, &["F2"])],
    },
    PresetRecipe {
        name: "Dubstep",
        bpm: 140.0,
        drums: |lane, step| match lane {
            0 => step == 0,
            1 => step == 8,
            2 => step % 2 == 0,
            _ => false,
        },
        variant: |kind| match kind {
            Kick => Distorted,
            Snare => Trap,
            _ => Eight08,
        },
        synth: &[(0, &["D1", "D2"]), (1, &["D1", "D2"])],
    },
];

impl PresetRecipe {
    fn build(&self) -> Preset {
        let mut state = AppState::new();
        state.bpm = self.bpm;

        for (lane, kind) in DrumKind::ALL.into_iter().enumerate() {
            let steps: Vec<usize> = (0..crate::pattern::STEPS)
                .filter(|&step| (self.drums)(lane, step))
                .collect();
            let track = DrumTrack {
                variant: kind.normalize((self.variant)(kind)),
                steps: StepMask::from_steps(&steps),
                ..DrumTrack::new(kind)
            };
            state.drums = state.drums.with_track(lane, track);
        }

        for (step, names) in self.synth {
            for pitch in names.iter().filter_map(|n| n.parse::<Pitch>().ok()) {
                state.synth = state
                    .synth
                    .with_note(*step, SynthNote::new(pitch, LEGACY_NOTE_DURATION));
            }
        }

        Preset::new(self.name, state)
    }
}

/// Names of the built-in presets, in display order
pub fn builtin_preset_names() -> impl Iterator<Item = &'static str> {
    RECIPES.iter().map(|r| r.name)
}

/// Every built-in preset. Notes get fresh ids on each call.
pub fn builtin_presets() -> Vec<Preset> {
    RECIPES.iter().map(PresetRecipe::build).collect()
}

pub fn builtin_preset(name: &str) -> Option<Preset> {
    RECIPES.iter().find(|r| r.name == name).map(PresetRecipe::build)
}

/// User presets stored next to the session file
#[derive(Debug, Clone)]
pub struct PresetLibrary {
    path: Option<PathBuf>,
    presets: Vec<Preset>,
}

impl PresetLibrary {
    /// Library that is never written to disk
    pub fn in_memory() -> Self {
        Self {
            path: None,
            presets: Vec::new(),
        }
    }

    /// Open the library file at `path`; a missing file is an empty library
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let presets = if path.exists() {
            let text = fs::read_to_string(&path)?;
            let file: PresetFile = serde_json::from_str(&text)?;
            if file.version > FORMAT_VERSION {
                return Err(PersistenceError::UnsupportedVersion(file.version));
            }
            file.presets
        } else {
            Vec::new()
        };
        Ok(Self {
            path: Some(path),
            presets,
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// User presets in save order
    pub fn user_presets(&self) -> &[Preset] {
        &self.presets
    }

    /// Built-in names first, then user names
    pub fn names(&self) -> Vec<String> {
        builtin_preset_names()
            .map(str::to_string)
            .chain(self.presets.iter().map(|p| p.name.clone()))
            .collect()
    }

    /// Look a preset up by name; built-ins shadow user presets
    pub fn find(&self, name: &str) -> Option<Preset> {
        builtin_preset(name).or_else(|| self.presets.iter().find(|p| p.name == name).cloned())
    }

    /// Store the state under `name`, replacing a user preset of the same name
    pub fn save_preset(&mut self, name: &str, state: &AppState) -> Result<(), PersistenceError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(PersistenceError::InvalidName(name.to_string()));
        }
        if builtin_preset_names().any(|n| n == name) {
            return Err(PersistenceError::InvalidName(name.to_string()));
        }

        let preset = Preset::new(name, state.clone());
        match self.presets.iter_mut().find(|p| p.name == name) {
            Some(existing) => *existing = preset,
            None => self.presets.push(preset),
        }
        self.flush()
    }

    /// Remove a user preset; returns whether it existed
    pub fn delete_preset(&mut self, name: &str) -> Result<bool, PersistenceError> {
        let before = self.presets.len();
        self.presets.retain(|p| p.name != name);
        if self.presets.len() == before {
            return Ok(false);
        }
        self.flush()?;
        Ok(true)
    }

    fn flush(&self) -> Result<(), PersistenceError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let file = PresetFile {
            version: FORMAT_VERSION,
            presets: self.presets.clone(),
        };
        write_atomically(path, &serde_json::to_string_pretty(&file)?)
    }
}
