//! Media inspection: how long a clip runs and whether it carries audio.

use std::path::Path;
use std::process::Command;

use crate::error::TriviaError;

/// Reads durations and stream layout of media files.
pub trait MediaProbe {
    /// Length in seconds.
    fn duration(&self, path: &Path) -> Result<f64, TriviaError>;

    fn has_audio(&self, path: &Path) -> Result<bool, TriviaError>;
}

/// Probe backed by hound for WAV files and `ffprobe` for everything else.
#[derive(Debug, Default, Clone, Copy)]
pub struct FfprobeProbe;

impl MediaProbe for FfprobeProbe {
    fn duration(&self, path: &Path) -> Result<f64, TriviaError> {
        if is_wav(path) {
            return wav_duration_seconds(path);
        }

        let stdout = run_ffprobe(
            path,
            &[
                "-show_entries",
                "format=duration",
                "-of",
                "default=noprint_wrappers=1:nokey=1",
            ],
        )?;

        stdout.trim().parse::<f64>().map_err(|e| {
            TriviaError::MediaError(format!(
                "Failed to parse ffprobe duration '{}' for {}: {}",
                stdout.trim(),
                path.display(),
                e
            ))
        })
    }

    fn has_audio(&self, path: &Path) -> Result<bool, TriviaError> {
        if is_wav(path) {
            return Ok(true);
        }

        let stdout = run_ffprobe(
            path,
            &[
                "-select_streams",
                "a",
                "-show_entries",
                "stream=index",
                "-of",
                "csv=p=0",
            ],
        )?;
        Ok(!stdout.trim().is_empty())
    }
}

/// Length of a WAV file in seconds, read from its header.
pub fn wav_duration_seconds(path: &Path) -> Result<f64, TriviaError> {
    let reader = hound::WavReader::open(path)?;
    let spec = reader.spec();
    if spec.sample_rate == 0 {
        return Err(TriviaError::MediaError(format!(
            "{} reports a zero sample rate",
            path.display()
        )));
    }
    Ok(f64::from(reader.duration()) / f64::from(spec.sample_rate))
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}

fn run_ffprobe(path: &Path, args: &[&str]) -> Result<String, TriviaError> {
    let output = Command::new("ffprobe")
        .args(["-v", "error"])
        .args(args)
        .arg(path)
        .output()
        .map_err(|e| {
            TriviaError::MediaError(format!("Failed to run ffprobe for {}: {}", path.display(), e))
        })?;

    if !output.status.success() {
        return Err(TriviaError::MediaError(format!(
            "ffprobe failed for {}: {}",
            path.display(),
            String::from_utf8_lossy(&output.stderr).trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;

    /// Probe answering from a fixed table; unknown paths fall back to `default`.
    pub struct TableProbe {
        pub durations: HashMap<PathBuf, f64>,
        pub default: f64,
        pub silent: Vec<PathBuf>,
    }

    impl TableProbe {
        pub fn new(default: f64) -> Self {
            Self {
                durations: HashMap::new(),
                default,
                silent: Vec::new(),
            }
        }

        pub fn with(mut self, path: impl Into<PathBuf>, seconds: f64) -> Self {
            self.durations.insert(path.into(), seconds);
            self
        }
    }

    impl MediaProbe for TableProbe {
        fn duration(&self, path: &Path) -> Result<f64, TriviaError> {
            Ok(self.durations.get(path).copied().unwrap_or(self.default))
        }

        fn has_audio(&self, path: &Path) -> Result<bool, TriviaError> {
            Ok(!self.silent.iter().any(|p| p == path))
        }
    }
}
