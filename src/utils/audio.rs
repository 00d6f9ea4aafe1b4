use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use thiserror::Error;

/// Size of the canonical RIFF/WAVE header written by [`write_wav_header`].
pub const WAV_HEADER_LEN: usize = 44;

/// Largest `fmt ` chunk accepted (WAVE_FORMAT_EXTENSIBLE is 40 bytes).
const MAX_FMT_CHUNK: u32 = 64;

/// Layout of raw PCM samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PcmFormat {
    pub sample_rate: u32,
    pub channels: u16,
    pub bits_per_sample: u16,
}

impl PcmFormat {
    /// Fixed output format of the speech provider: 16-bit signed LE, mono, 24 kHz.
    pub const PROVIDER: PcmFormat = PcmFormat {
        sample_rate: 24_000,
        channels: 1,
        bits_per_sample: 16,
    };

    pub fn byte_rate(&self) -> u32 {
        self.sample_rate * self.channels as u32 * self.bits_per_sample as u32 / 8
    }

    pub fn block_align(&self) -> u16 {
        self.channels * self.bits_per_sample / 8
    }
}

impl Default for PcmFormat {
    fn default() -> Self {
        Self::PROVIDER
    }
}

#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("no audio produced")]
    NoAudio,
    #[error("PCM payload of {0} bytes does not fit in a RIFF container")]
    TooLarge(usize),
    #[error("not a RIFF file")]
    NotRiff,
    #[error("not a WAVE file")]
    NotWave,
    #[error("missing {0} chunk")]
    MissingChunk(&'static str),
    #[error("WAV data is truncated")]
    Truncated,
    #[error("fmt chunk of {0} bytes is too large")]
    OversizedFormat(u32),
    #[error(transparent)]
    Io(#[from] io::Error),
}

fn truncated(e: io::Error) -> AssemblyError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        AssemblyError::Truncated
    } else {
        AssemblyError::Io(e)
    }
}

/// Writes the 44-byte PCM WAV header for a payload of `data_size` bytes.
pub fn write_wav_header<W: Write>(out: &mut W, format: PcmFormat, data_size: u32) -> io::Result<()> {
    out.write_all(b"RIFF")?;
    out.write_all(&(36 + data_size).to_le_bytes())?;
    out.write_all(b"WAVE")?;

    out.write_all(b"fmt ")?;
    out.write_all(&16u32.to_le_bytes())?;
    out.write_all(&1u16.to_le_bytes())?;
    out.write_all(&format.channels.to_le_bytes())?;
    out.write_all(&format.sample_rate.to_le_bytes())?;
    out.write_all(&format.byte_rate().to_le_bytes())?;
    out.write_all(&format.block_align().to_le_bytes())?;
    out.write_all(&format.bits_per_sample.to_le_bytes())?;

    out.write_all(b"data")?;
    out.write_all(&data_size.to_le_bytes())?;
    Ok(())
}

/// Concatenates raw PCM fragments in order behind a single WAV header.
/// The samples are copied verbatim.
pub fn assemble_wav<B: AsRef<[u8]>>(fragments: &[B], format: PcmFormat) -> Result<Vec<u8>, AssemblyError> {
    if fragments.is_empty() {
        return Err(AssemblyError::NoAudio);
    }

    let total: usize = fragments.iter().map(|f| f.as_ref().len()).sum();
    let data_size = u32::try_from(total)
        .ok()
        .filter(|size| size.checked_add(36).is_some())
        .ok_or(AssemblyError::TooLarge(total))?;

    let mut out = Vec::with_capacity(WAV_HEADER_LEN + total);
    write_wav_header(&mut out, format, data_size)?;
    for fragment in fragments {
        out.extend_from_slice(fragment.as_ref());
    }
    Ok(out)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WavInfo {
    pub riff_size: u32,
    pub audio_format: u16,
    pub format: PcmFormat,
    pub byte_rate: u32,
    pub block_align: u16,
    pub data_offset: u64,
    pub data_size: u32,
}

impl WavInfo {
    pub fn duration_secs(&self) -> f64 {
        if self.byte_rate == 0 {
            return 0.0;
        }
        self.data_size as f64 / self.byte_rate as f64
    }
}

/// Walks the RIFF chunks up to the `data` chunk, skipping anything it does not know.
pub fn scan_wav<R: Read + Seek>(mut f: R) -> Result<WavInfo, AssemblyError> {
    let mut id = [0u8; 4];
    let mut word = [0u8; 4];

    f.read_exact(&mut id).map_err(truncated)?;
    if &id != b"RIFF" {
        return Err(AssemblyError::NotRiff);
    }
    f.read_exact(&mut word).map_err(truncated)?;
    let riff_size = u32::from_le_bytes(word);

    f.read_exact(&mut id).map_err(truncated)?;
    if &id != b"WAVE" {
        return Err(AssemblyError::NotWave);
    }

    let mut fmt: Option<Vec<u8>> = None;

    loop {
        let mut chunk_id = [0u8; 4];
        let n = f.read(&mut chunk_id)?;
        if n == 0 {
            break;
        }
        if n < 4 {
            f.read_exact(&mut chunk_id[n..]).map_err(truncated)?;
        }

        f.read_exact(&mut word).map_err(truncated)?;
        let chunk_size = u32::from_le_bytes(word);

        if &chunk_id == b"fmt " {
            if chunk_size > MAX_FMT_CHUNK {
                return Err(AssemblyError::OversizedFormat(chunk_size));
            }
            let mut buf = vec![0u8; chunk_size as usize];
            f.read_exact(&mut buf).map_err(truncated)?;
            fmt = Some(buf);
        } else if &chunk_id == b"data" {
            let fmt = fmt.take().ok_or(AssemblyError::MissingChunk("fmt "))?;
            if fmt.len() < 16 {
                return Err(AssemblyError::Truncated);
            }
            let u16_at = |i: usize| u16::from_le_bytes([fmt[i], fmt[i + 1]]);
            let u32_at = |i: usize| u32::from_le_bytes([fmt[i], fmt[i + 1], fmt[i + 2], fmt[i + 3]]);

            return Ok(WavInfo {
                riff_size,
                audio_format: u16_at(0),
                format: PcmFormat {
                    channels: u16_at(2),
                    sample_rate: u32_at(4),
                    bits_per_sample: u16_at(14),
                },
                byte_rate: u32_at(8),
                block_align: u16_at(12),
                data_offset: f.stream_position()?,
                data_size: chunk_size,
            });
        } else {
            // RIFF chunks are word aligned
            let skip = chunk_size as i64 + (chunk_size & 1) as i64;
            f.seek(SeekFrom::Current(skip))?;
        }
    }

    Err(AssemblyError::MissingChunk("data"))
}

pub fn parse_wav(bytes: &[u8]) -> Result<WavInfo, AssemblyError> {
    scan_wav(Cursor::new(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_layout_is_exact() {
        let wav = assemble_wav(&[vec![1u8, 2, 3, 4]], PcmFormat::PROVIDER).unwrap();

        let mut expected = Vec::new();
        expected.extend_from_slice(b"RIFF");
        expected.extend_from_slice(&40u32.to_le_bytes());
        expected.extend_from_slice(b"WAVE");
        expected.extend_from_slice(b"fmt ");
        expected.extend_from_slice(&16u32.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&1u16.to_le_bytes());
        expected.extend_from_slice(&24_000u32.to_le_bytes());
        expected.extend_from_slice(&48_000u32.to_le_bytes());
        expected.extend_from_slice(&2u16.to_le_bytes());
        expected.extend_from_slice(&16u16.to_le_bytes());
        expected.extend_from_slice(b"data");
        expected.extend_from_slice(&4u32.to_le_bytes());
        expected.extend_from_slice(&[1, 2, 3, 4]);

        assert_eq!(wav.len(), WAV_HEADER_LEN + 4);
        assert_eq!(wav, expected);
    }

    #[test]
    fn test_fragments_are_concatenated_in_order() {
        let a = vec![0xAAu8; 6];
        let b = vec![0xBBu8; 2];
        let c = vec![0xCCu8; 10];

        let wav = assemble_wav(&[a.clone(), b.clone(), c.clone()], PcmFormat::PROVIDER).unwrap();

        let mut header = Vec::new();
        write_wav_header(&mut header, PcmFormat::PROVIDER, 18).unwrap();
        let expected: Vec<u8> = header.into_iter().chain(a).chain(b).chain(c).collect();
        assert_eq!(wav, expected);
    }

    #[test]
    fn test_empty_fragment_list_fails() {
        let fragments: Vec<Vec<u8>> = Vec::new();
        let result = assemble_wav(&fragments, PcmFormat::PROVIDER);
        assert!(matches!(result, Err(AssemblyError::NoAudio)));
    }

    #[test]
    fn test_parsed_header_matches_payload_size() {
        for size in [0usize, 1, 2, 4_800, 48_000] {
            let wav = assemble_wav(&[vec![7u8; size]], PcmFormat::PROVIDER).unwrap();
            let info = parse_wav(&wav).unwrap();

            assert_eq!(info.data_size as usize, size);
            assert_eq!(info.riff_size as usize, 36 + size);
            assert_eq!(info.riff_size as usize, wav.len() - 8);
            assert_eq!(info.data_offset, WAV_HEADER_LEN as u64);
            assert_eq!(info.audio_format, 1);
            assert_eq!(info.format, PcmFormat::PROVIDER);
            assert_eq!(info.block_align, 2);
        }
    }

    #[test]
    fn test_duration_of_one_second() {
        let wav = assemble_wav(&[vec![0u8; 48_000]], PcmFormat::PROVIDER).unwrap();
        let info = parse_wav(&wav).unwrap();
        assert!((info.duration_secs() - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_scan_skips_unknown_chunks() {
        let mut buf = Vec::new();
        buf.extend_from_slice(b"RIFF");
        buf.extend_from_slice(&0u32.to_le_bytes());
        buf.extend_from_slice(b"WAVE");
        buf.extend_from_slice(b"fmt ");
        buf.extend_from_slice(&16u32.to_le_bytes());
        buf.extend_from_slice(&1u16.to_le_bytes());
        buf.extend_from_slice(&2u16.to_le_bytes());
        buf.extend_from_slice(&44_100u32.to_le_bytes());
        buf.extend_from_slice(&176_400u32.to_le_bytes());
        buf.extend_from_slice(&4u16.to_le_bytes());
        buf.extend_from_slice(&16u16.to_le_bytes());
        buf.extend_from_slice(b"LIST");
        buf.extend_from_slice(&3u32.to_le_bytes());
        buf.extend_from_slice(&[1, 2, 3, 0]);
        buf.extend_from_slice(b"data");
        buf.extend_from_slice(&8u32.to_le_bytes());
        buf.extend_from_slice(&[0u8; 8]);

        let info = parse_wav(&buf).unwrap();
        assert_eq!(info.format.channels, 2);
        assert_eq!(info.format.sample_rate, 44_100);
        assert_eq!(info.data_size, 8);
        assert_eq!(info.data_offset, buf.len() as u64 - 8);
    }

    #[test]
    fn test_scan_rejects_non_wav() {
        assert!(matches!(parse_wav(b"ID3\x04 some mp3 bytes"), Err(AssemblyError::NotRiff)));
        assert!(matches!(parse_wav(b"RIFF\0\0\0\0AVI "), Err(AssemblyError::NotWave)));
        assert!(matches!(parse_wav(b"RIF"), Err(AssemblyError::Truncated)));
        assert!(matches!(
            parse_wav(b"RIFF\x04\0\0\0WAVE"),
            Err(AssemblyError::MissingChunk("data"))
        ));
    }

    #[test]
    fn test_scan_rejects_oversized_fmt_chunk() {
        let mut bytes = b"RIFF\x24\0\0\0WAVEfmt ".to_vec();
        bytes.extend_from_slice(&u32::MAX.to_le_bytes());
        bytes.extend_from_slice(&[0u8; 16]);
        assert!(matches!(parse_wav(&bytes), Err(AssemblyError::OversizedFormat(u32::MAX))));
    }
}
