//! Default configuration constants for tuneprep.
//!
//! Shared by the config file, the CLI and the stage configuration structs so
//! every entry point agrees on the same values.

/// Root under which each model gets its own dataset tree.
pub const DATA_ROOT: &str = "./data";

/// Default segmentation start offset in seconds.
pub const START_SECS: u64 = 0;

/// Default stride between segment start times in seconds.
pub const INTERVAL_SECS: u64 = 30;

/// Default trailing overlap added to every segment in seconds.
///
/// Each segment is `INTERVAL_SECS + OVERLAY_SECS` long, so consecutive
/// segments share this many seconds of audio.
pub const OVERLAY_SECS: u64 = 5;

/// Default loudness normalization target in dB LUFS.
///
/// Raising the target makes output louder, lowering it makes it quieter.
pub const LOUDNESS_TARGET: f64 = -23.0;

/// Default transcript file extension (without the dot).
pub const TRANSCRIPTION_EXTENSION: &str = "lab";

/// Default Whisper model name.
pub const WHISPER_MODEL: &str = "base";

/// Default transcription language.
pub const LANGUAGE: &str = "ja";

/// Language value that lets Whisper detect the spoken language.
pub const AUTO_LANGUAGE: &str = "auto";

/// Marker written into `normalize_loudness` once the normalizer succeeded.
pub const NORMALIZED_MARKER: &str = ".normalized";

/// Content of the normalization marker. Only its presence is ever checked.
pub const NORMALIZED_MARKER_CONTENT: &str = "normalized";

/// Source audio extensions picked up by every stage (matched case-insensitively).
pub const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav"];

/// Maximum time a single cut may take before it is abandoned.
pub const CUT_TIMEOUT_SECS: u64 = 120;

/// Sample rate Whisper expects for in-process inference.
pub const WHISPER_SAMPLE_RATE: u32 = 16000;

// fish-speech hand-off

/// Checkout of the fish-speech repository the training scripts are run from.
pub const FISH_SPEECH_DIR: &str = ".";

pub const VQ_CHECKPOINT: &str =
    "checkpoints/fish-speech-1.4/firefly-gan-vq-fsq-8x1024-21hz-generator.pth";

pub const VQ_CONFIG: &str = "firefly_gan_vq";

pub const VQ_BATCH_SIZE: u32 = 16;

pub const VQ_NUM_WORKERS: u32 = 1;

pub const DATASET_NUM_WORKERS: u32 = 16;

pub const TRAIN_CONFIG: &str = "text2semantic_finetune";

pub const LORA_CONFIG: &str = "r_8_alpha_16";

/// Report whether the in-process Whisper backend is compiled into this build.
pub fn whisper_backend() -> &'static str {
    if cfg!(feature = "cuda") {
        "whisper-rs (CUDA)"
    } else if cfg!(feature = "vulkan") {
        "whisper-rs (Vulkan)"
    } else if cfg!(feature = "whisper") {
        "whisper-rs (CPU)"
    } else {
        "not compiled in"
    }
}

/// Whether `extension` names a source audio format (`mp3`/`wav`, any case).
pub fn is_audio_extension(extension: &str) -> bool {
    AUDIO_EXTENSIONS
        .iter()
        .any(|known| known.eq_ignore_ascii_case(extension))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whisper_backend_matches_compiled_feature() {
        let expected = if cfg!(feature = "cuda") {
            "whisper-rs (CUDA)"
        } else if cfg!(feature = "vulkan") {
            "whisper-rs (Vulkan)"
        } else if cfg!(feature = "whisper") {
            "whisper-rs (CPU)"
        } else {
            "not compiled in"
        };
        assert_eq!(whisper_backend(), expected);
    }

    #[test]
    fn audio_extensions_are_case_insensitive() {
        assert!(is_audio_extension("wav"));
        assert!(is_audio_extension("WAV"));
        assert!(is_audio_extension("Mp3"));
        assert!(!is_audio_extension("lab"));
        assert!(!is_audio_extension(""));
    }
}
