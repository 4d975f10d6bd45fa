//! Stimulus loading and decoding via symphonia
//!
//! Accepts a URL, a filesystem path, an in-memory byte payload, or an
//! already-decoded buffer, and produces one immutable `DecodedBuffer`.
//! Decoding requires a fully-buffered payload; remote stimuli are fetched
//! completely before the probe runs. Any fetch or decode failure surfaces
//! as `AudioError::Load` and leaves the caller's previous buffer untouched.

use std::fs::File;
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::{MediaSource, MediaSourceStream};
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use super::buffer::DecodedBuffer;
use super::error::AudioError;

/// Where a stimulus comes from. The engine does not interpret logical
/// folder names ("music/", "tones/", ...); it only consumes the final
/// resolvable reference.
pub enum SoundSource {
    /// Remote asset, fetched fully before decoding.
    Url(String),
    /// Local file.
    Path(PathBuf),
    /// Ad-hoc uploaded bytes.
    Bytes(Vec<u8>),
    /// Pre-decoded buffer, passed through as-is.
    Decoded(Arc<DecodedBuffer>),
}

impl SoundSource {
    /// Human-readable name used in load errors and retry prompts.
    pub fn name(&self) -> String {
        match self {
            Self::Url(url) => url
                .rsplit('/')
                .next()
                .filter(|s| !s.is_empty())
                .unwrap_or(url)
                .to_string(),
            Self::Path(path) => path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            Self::Bytes(_) => "uploaded audio".to_string(),
            Self::Decoded(_) => "decoded audio".to_string(),
        }
    }
}

/// Decode a sound source into a shared buffer.
pub fn decode(source: SoundSource) -> Result<Arc<DecodedBuffer>, AudioError> {
    let name = source.name();
    match source {
        SoundSource::Decoded(buffer) => Ok(buffer),
        SoundSource::Path(path) => {
            let mut hint = Hint::new();
            if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
                hint.with_extension(ext);
            }
            let file = File::open(&path)
                .map_err(|e| AudioError::load(&name, format!("cannot open file: {}", e)))?;
            decode_stream(Box::new(file), hint, &name)
        }
        SoundSource::Bytes(bytes) => {
            decode_stream(Box::new(Cursor::new(bytes)), Hint::new(), &name)
        }
        SoundSource::Url(url) => {
            log::info!("fetching stimulus from {}", url);
            let response = reqwest::blocking::get(&url)
                .and_then(|r| r.error_for_status())
                .map_err(|e| AudioError::load(&name, format!("fetch failed: {}", e)))?;
            let bytes = response
                .bytes()
                .map_err(|e| AudioError::load(&name, format!("fetch failed: {}", e)))?;

            let mut hint = Hint::new();
            if let Some(ext) = name.rsplit('.').next().filter(|e| e.len() <= 4) {
                hint.with_extension(ext);
            }
            decode_stream(Box::new(Cursor::new(bytes.to_vec())), hint, &name)
        }
    }
}

/// Probe and fully decode one media stream into interleaved stereo f32.
fn decode_stream(
    media: Box<dyn MediaSource>,
    hint: Hint,
    name: &str,
) -> Result<Arc<DecodedBuffer>, AudioError> {
    let mss = MediaSourceStream::new(media, Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &hint,
            mss,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| AudioError::load(name, format!("unsupported or corrupt format: {}", e)))?;

    let mut format = probed.format;
    let track = format
        .default_track()
        .ok_or_else(|| AudioError::load(name, "no audio track found"))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params.sample_rate.unwrap_or(44100);

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| AudioError::load(name, format!("unsupported codec: {}", e)))?;

    let mut interleaved: Vec<f32> = Vec::new();
    let mut sample_buf: Option<SampleBuffer<f32>> = None;
    let mut channels = 2usize;

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break; // end of stream
            }
            Err(SymphoniaError::ResetRequired) => break,
            Err(e) => return Err(AudioError::load(name, format!("read error: {}", e))),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                // Corrupt packets are skipped; a stream with nothing but
                // corrupt packets fails below with "decoded no audio".
                log::warn!("skipping corrupt packet in '{}': {}", name, e);
                continue;
            }
            Err(e) => return Err(AudioError::load(name, format!("decode error: {}", e))),
        };

        if sample_buf.is_none() {
            let spec = *decoded.spec();
            channels = spec.channels.count().max(1);
            sample_buf = Some(SampleBuffer::new(decoded.capacity() as u64, spec));
        }
        if let Some(sb) = sample_buf.as_mut() {
            sb.copy_interleaved_ref(decoded);
            append_as_stereo(&mut interleaved, sb.samples(), channels);
        }
    }

    if interleaved.is_empty() {
        return Err(AudioError::load(name, "decoded no audio"));
    }

    let buffer = DecodedBuffer::from_interleaved(interleaved, sample_rate);
    log::info!(
        "decoded '{}': {} frames at {} Hz ({:.2}s)",
        name,
        buffer.frames(),
        buffer.sample_rate(),
        buffer.duration_secs()
    );
    Ok(Arc::new(buffer))
}

/// Fold an interleaved block of `channels` into interleaved stereo:
/// mono duplicates, stereo copies, wider layouts downmix by averaging even
/// channels left and odd channels right.
fn append_as_stereo(out: &mut Vec<f32>, samples: &[f32], channels: usize) {
    match channels {
        1 => {
            out.reserve(samples.len() * 2);
            for &s in samples {
                out.push(s);
                out.push(s);
            }
        }
        2 => out.extend_from_slice(samples),
        n => {
            let half = (n as f32 / 2.0).max(1.0);
            for frame in samples.chunks_exact(n) {
                let mut left = 0.0f32;
                let mut right = 0.0f32;
                for (ch, &s) in frame.iter().enumerate() {
                    if ch % 2 == 0 {
                        left += s;
                    } else {
                        right += s;
                    }
                }
                out.push(left / half);
                out.push(right / half);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nonexistent_file_is_load_error() {
        let result = decode(SoundSource::Path(PathBuf::from("/nonexistent/tone.mp3")));
        assert!(matches!(result, Err(AudioError::Load { .. })));
    }

    #[test]
    fn test_garbage_bytes_are_load_error() {
        let result = decode(SoundSource::Bytes(vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0x01]));
        assert!(matches!(result, Err(AudioError::Load { .. })));
    }

    #[test]
    fn test_predecoded_buffer_passes_through() {
        let buffer = Arc::new(DecodedBuffer::from_interleaved(vec![0.1, 0.2], 44100));
        let out = decode(SoundSource::Decoded(Arc::clone(&buffer))).unwrap();
        assert!(Arc::ptr_eq(&buffer, &out));
    }

    #[test]
    fn test_wav_bytes_decode() {
        // Minimal 16-bit PCM WAV: four frames of silence at 44.1 kHz.
        let mut wav: Vec<u8> = Vec::new();
        let data_len = 4u32 * 2 * 2;
        wav.extend_from_slice(b"RIFF");
        wav.extend_from_slice(&(36 + data_len).to_le_bytes());
        wav.extend_from_slice(b"WAVE");
        wav.extend_from_slice(b"fmt ");
        wav.extend_from_slice(&16u32.to_le_bytes());
        wav.extend_from_slice(&1u16.to_le_bytes()); // PCM
        wav.extend_from_slice(&2u16.to_le_bytes()); // stereo
        wav.extend_from_slice(&44100u32.to_le_bytes());
        wav.extend_from_slice(&(44100u32 * 4).to_le_bytes());
        wav.extend_from_slice(&4u16.to_le_bytes());
        wav.extend_from_slice(&16u16.to_le_bytes());
        wav.extend_from_slice(b"data");
        wav.extend_from_slice(&data_len.to_le_bytes());
        wav.extend_from_slice(&vec![0u8; data_len as usize]);

        let buffer = decode(SoundSource::Bytes(wav)).unwrap();
        assert_eq!(buffer.sample_rate(), 44100);
        assert_eq!(buffer.frames(), 4);
    }

    #[test]
    fn test_source_names() {
        assert_eq!(
            SoundSource::Url("https://host/tones/tone-1k.mp3".into()).name(),
            "tone-1k.mp3"
        );
        assert_eq!(
            SoundSource::Path(PathBuf::from("music/sample1.wav")).name(),
            "sample1.wav"
        );
        assert_eq!(SoundSource::Bytes(vec![]).name(), "uploaded audio");
    }

    #[test]
    fn test_multichannel_downmix() {
        // One frame of 4 channels: evens left, odds right.
        let mut out = Vec::new();
        append_as_stereo(&mut out, &[0.2, 0.4, 0.6, 0.8], 4);
        assert_eq!(out.len(), 2);
        assert!((out[0] - 0.4).abs() < 1e-6);
        assert!((out[1] - 0.6).abs() < 1e-6);
    }
}
