//! Optional capture dumps: each endpointed utterance written as a 16 kHz
//! mono WAV for offline inspection of wake/VAD behaviour.

use std::path::{Path, PathBuf};

use chrono::Local;

use crate::audio::CAPTURE_RATE;
use crate::error::{Result, SatelliteError};

pub fn save_capture(dir: &Path, samples: &[i16]) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let filename = format!("capture-{}.wav", Local::now().format("%Y%m%d-%H%M%S%.3f"));
    let path = dir.join(filename);

    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: CAPTURE_RATE,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut writer = hound::WavWriter::create(&path, spec)
        .map_err(|e| SatelliteError::Io(std::io::Error::other(e.to_string())))?;

    for &sample in samples {
        writer
            .write_sample(sample)
            .map_err(|e| SatelliteError::Io(std::io::Error::other(e.to_string())))?;
    }

    writer
        .finalize()
        .map_err(|e| SatelliteError::Io(std::io::Error::other(e.to_string())))?;

    log::debug!("Saved capture to {} ({} samples)", path.display(), samples.len());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_a_readable_wav() {
        let tmp = tempfile::tempdir().unwrap();
        let samples: Vec<i16> = (0..1600).map(|i| (i % 100) as i16).collect();

        let path = save_capture(tmp.path(), &samples).unwrap();
        assert!(path.exists());

        let reader = hound::WavReader::open(&path).unwrap();
        assert_eq!(reader.spec().sample_rate, CAPTURE_RATE);
        assert_eq!(reader.spec().channels, 1);
        assert_eq!(reader.len(), 1600);
    }
}
