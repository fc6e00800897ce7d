//! PCM16 mono to RIFF/WAVE conversion.
//!
//! The layout is fixed: a 44-byte header (`RIFF` descriptor, 16-byte `fmt `
//! sub-chunk, `data` sub-chunk header) followed by the samples as
//! little-endian 16-bit integers. No resampling, no transcoding.

/// Size of the canonical PCM WAV header.
pub const WAV_HEADER_LEN: usize = 44;

const CHANNELS: u16 = 1;
const BITS_PER_SAMPLE: u16 = 16;
const BYTES_PER_SAMPLE: u32 = 2;
const PCM_FORMAT: u16 = 1;

/// Build the 44-byte header for `data_len` bytes of mono PCM16 at `sample_rate`.
pub fn wav_header(data_len: u32, sample_rate: u32) -> [u8; WAV_HEADER_LEN] {
    let byte_rate = sample_rate * BYTES_PER_SAMPLE * u32::from(CHANNELS);
    let block_align = CHANNELS * BITS_PER_SAMPLE / 8;
    let riff_len = data_len.saturating_add(36);

    let mut header = [0u8; WAV_HEADER_LEN];
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&riff_len.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&PCM_FORMAT.to_le_bytes());
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&block_align.to_le_bytes());
    header[34..36].copy_from_slice(&BITS_PER_SAMPLE.to_le_bytes());

    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_len.to_le_bytes());
    header
}

/// `data` chunk length for `byte_len` bytes. RIFF sizes are 32-bit, so
/// anything longer saturates at `u32::MAX`.
pub fn data_chunk_len(byte_len: usize) -> u32 {
    u32::try_from(byte_len).unwrap_or(u32::MAX)
}

/// Encode samples into a complete, self-contained WAV container.
///
/// Deterministic: the same samples and rate always produce the same bytes.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_len = samples.len() * BYTES_PER_SAMPLE as usize;
    let mut out = Vec::with_capacity(WAV_HEADER_LEN + data_len);
    out.extend_from_slice(&wav_header(data_chunk_len(data_len), sample_rate));
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}

/// Decode little-endian PCM16 bytes into samples. A trailing odd byte is dropped.
pub fn pcm16_from_le_bytes(bytes: &[u8]) -> Vec<i16> {
    bytes
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect()
}

/// Encode samples as little-endian PCM16 bytes.
pub fn pcm16_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut out = Vec::with_capacity(samples.len() * 2);
    for sample in samples {
        out.extend_from_slice(&sample.to_le_bytes());
    }
    out
}
