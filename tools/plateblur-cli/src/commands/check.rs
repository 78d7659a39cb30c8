//! Check codecs, detector model and tracker backends.

use plateblur_common::config::AppConfig;
use plateblur_frame_model::TrackerAlgorithm;
use plateblur_render_engine::{encoder_available, init_ffmpeg};

pub fn run(config: &AppConfig) -> anyhow::Result<()> {
    println!("plateblur System Check");
    println!("{}", "=".repeat(50));

    let mut ready = true;

    match init_ffmpeg() {
        Ok(()) => println!("[OK] FFmpeg libraries loaded"),
        Err(e) => {
            println!("[FAIL] FFmpeg: {e}");
            ready = false;
        }
    }

    for (kind, name) in [
        ("Video encoder", &config.output.video_encoder),
        ("Audio encoder", &config.output.audio_encoder),
    ] {
        if encoder_available(name) {
            println!("[OK] {kind}: {name}");
        } else {
            println!("[FAIL] {kind}: {name} not available");
            ready = false;
        }
    }

    if plateblur_vision::onnx_enabled() {
        println!("[OK] ONNX detector compiled in");
    } else {
        println!("[WARN] Built without ONNX support; only --dry-run will work");
        ready = false;
    }

    let model = &config.processing.model_path;
    if model.is_file() {
        println!("[OK] Detector model: {}", model.display());
    } else {
        println!("[WARN] Detector model not found: {}", model.display());
        ready = false;
    }

    let native = plateblur_vision::compiled_trackers();
    let names: Vec<&str> = native.iter().map(TrackerAlgorithm::name).collect();
    println!("[OK] Tracker backends: {}", names.join(", "));
    let fallback: Vec<&str> = TrackerAlgorithm::ALL
        .iter()
        .filter(|a| !native.contains(*a))
        .map(TrackerAlgorithm::name)
        .collect();
    if !fallback.is_empty() {
        println!(
            "[WARN] {} fall back to TEMPLATE (built without OpenCV)",
            fallback.join(", ")
        );
    }

    println!();
    if ready {
        println!("All components are available. plateblur is ready.");
    } else {
        println!("Some components are missing. See above for details.");
    }
    Ok(())
}
