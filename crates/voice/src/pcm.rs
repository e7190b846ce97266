//! 16-bit PCM audio as exchanged with the voice agent.

use std::io::Cursor;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

/// Sample rate of every stream, in both directions.
pub const SAMPLE_RATE: u32 = 16_000;

/// Converts a float sample in `[-1, 1]` to a 16-bit sample, clamping.
#[inline]
pub fn to_i16(sample: f32) -> i16 {
    (sample * 32768.0).clamp(-32768.0, 32767.0) as i16
}

/// Encodes float samples as base64 of 16-bit little-endian PCM.
pub fn encode_f32(samples: &[f32]) -> String {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        bytes.extend_from_slice(&to_i16(*sample).to_le_bytes());
    }
    STANDARD.encode(bytes)
}

/// Decodes base64 of 16-bit little-endian PCM. A trailing odd byte is
/// dropped.
pub fn decode(encoded: &str) -> Result<Vec<i16>, base64::DecodeError> {
    let bytes = STANDARD.decode(encoded)?;
    Ok(bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect())
}

/// Wraps samples in a mono WAV container.
pub fn to_wav(samples: &[i16], sample_rate: u32) -> Result<Vec<u8>, hound::Error> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)?;
        for sample in samples {
            writer.write_sample(*sample)?;
        }
        writer.finalize()?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_conversion_clamps() {
        assert_eq!(to_i16(0.0), 0);
        assert_eq!(to_i16(1.0), 32767);
        assert_eq!(to_i16(-1.0), -32768);
        assert_eq!(to_i16(2.5), 32767);
        assert_eq!(to_i16(0.5), 16384);
    }

    #[test]
    fn test_encoding_is_little_endian() {
        let encoded = encode_f32(&[0.5, -1.0]);
        assert_eq!(STANDARD.decode(&encoded).unwrap(), vec![0x00, 0x40, 0x00, 0x80]);
        assert_eq!(decode(&encoded).unwrap(), vec![16384, -32768]);
        assert_eq!(decode(&STANDARD.encode([1u8, 0, 7])).unwrap(), vec![1]);
        assert!(decode("%%%").is_err());
    }

    #[test]
    fn test_wav_header() {
        let wav = to_wav(&[1, -1, 300], SAMPLE_RATE).unwrap();
        assert_eq!(wav.len(), 44 + 6);
        assert_eq!(&wav[0..4], b"RIFF");
        assert_eq!(&wav[8..12], b"WAVE");
        assert_eq!(u32::from_le_bytes([wav[24], wav[25], wav[26], wav[27]]), SAMPLE_RATE);

        let reader = hound::WavReader::new(Cursor::new(wav)).unwrap();
        assert_eq!(reader.spec().channels, 1);
        let samples: Vec<i16> = reader.into_samples().map(Result::unwrap).collect();
        assert_eq!(samples, vec![1, -1, 300]);
    }
}
