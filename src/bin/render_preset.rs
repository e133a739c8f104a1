// Render a built-in preset to a WAV file
// Run with: cargo run --bin render_preset -- "House" house.wav

use loopstation::audio::export::{ExportFormat, export_duration, export_to_file};
use loopstation::audio::{EngineRenderer, WavEncoder};
use loopstation::project::{builtin_preset, builtin_preset_names};
use std::path::PathBuf;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut args = std::env::args().skip(1);
    let (Some(name), Some(output)) = (args.next(), args.next()) else {
        eprintln!("Usage: render_preset <preset> <output.wav> [sample rate]");
        eprintln!("Presets:");
        for name in builtin_preset_names() {
            eprintln!("   - {}", name);
        }
        std::process::exit(2);
    };
    let sample_rate: u32 = match args.next() {
        Some(rate) => rate.parse()?,
        None => 44100,
    };

    let Some(preset) = builtin_preset(&name) else {
        eprintln!("❌ Unknown preset '{}'", name);
        std::process::exit(1);
    };

    println!("🎵 Loopstation - Offline Render");
    println!("================================");
    println!("   - Preset: {}", preset.name);
    println!("   - Tempo: {} BPM", preset.state.bpm);
    println!("   - Drum hits: {}", preset.state.drums.tracks().map(|t| t.steps.count()).sum::<usize>());
    println!("   - Synth notes: {}", preset.state.synth.note_count());
    println!("   - Length: {:.2}s at {} Hz", export_duration(&preset.state), sample_rate);

    let path = PathBuf::from(output);
    let mut renderer = EngineRenderer::new(sample_rate);
    let bytes = export_to_file(
        &mut renderer,
        &WavEncoder::default(),
        &preset.state,
        ExportFormat::Wav,
        &path,
    )?;

    println!("\n💾 Wrote {} ({} bytes)", path.display(), bytes);
    Ok(())
}
