//! Fixed ADTS header (7 bytes, or 9 with CRC)
//!
//! ```text
//! AAAAAAAA AAAABCCD EEFFFFGH HHIJKLMM MMMMMMMM MMMOOOOO OOOOOOPP
//! A sync   B id   C layer   D protection absent   E profile
//! F sampling index   G private   H channel config   I..L misc bits
//! M frame length (header + payload)   O buffer fullness   P raw blocks
//! ```

use super::{sample_rate_for_index, AacProfile};
use crate::error::{Result, TranscodeError};

/// Length of a header without CRC
pub const ADTS_HEADER_LEN: usize = 7;

/// Largest value the 13-bit frame length field can hold
pub const MAX_FRAME_LENGTH: usize = 0x1FFF;

const SYNCWORD: u16 = 0xFFF;
const VBR_FULLNESS: u16 = 0x7FF;

/// MPEG identifier bit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MpegVersion {
    Mpeg4,
    Mpeg2,
}

impl MpegVersion {
    fn bit(self) -> u8 {
        match self {
            MpegVersion::Mpeg4 => 0,
            MpegVersion::Mpeg2 => 1,
        }
    }
}

/// Decoded fields of an ADTS header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdtsHeader {
    pub mpeg_version: MpegVersion,
    pub protection_absent: bool,
    pub profile: AacProfile,
    pub sampling_index: u8,
    pub channel_config: u8,
    /// Header plus payload, in bytes
    pub frame_length: u16,
    pub buffer_fullness: u16,
    /// Number of raw data blocks minus one
    pub raw_blocks: u8,
}

impl AdtsHeader {
    /// Header for one raw AAC frame of `payload_len` bytes, in the layout
    /// this crate emits: MPEG-2 id, no CRC, VBR buffer fullness, one block.
    pub fn for_payload(
        payload_len: usize,
        sampling_index: u8,
        profile: AacProfile,
        channel_config: u8,
    ) -> Result<Self> {
        let frame_length = payload_len + ADTS_HEADER_LEN;
        if frame_length > MAX_FRAME_LENGTH {
            return Err(TranscodeError::Adts(format!(
                "frame length {} exceeds {}",
                frame_length, MAX_FRAME_LENGTH
            )));
        }
        if sample_rate_for_index(sampling_index).is_none() {
            return Err(TranscodeError::Adts(format!(
                "sampling index {} out of range",
                sampling_index
            )));
        }
        if channel_config > 7 {
            return Err(TranscodeError::Adts(format!(
                "channel config {} out of range",
                channel_config
            )));
        }
        Ok(Self {
            mpeg_version: MpegVersion::Mpeg2,
            protection_absent: true,
            profile,
            sampling_index,
            channel_config,
            frame_length: frame_length as u16,
            buffer_fullness: VBR_FULLNESS,
            raw_blocks: 0,
        })
    }

    /// Bytes taken by the header itself (9 when a CRC follows)
    pub fn header_len(&self) -> usize {
        if self.protection_absent {
            ADTS_HEADER_LEN
        } else {
            ADTS_HEADER_LEN + 2
        }
    }

    pub fn payload_len(&self) -> usize {
        (self.frame_length as usize).saturating_sub(self.header_len())
    }

    pub fn sample_rate(&self) -> Option<u32> {
        sample_rate_for_index(self.sampling_index)
    }

    /// Serialise the fixed 7-byte part.
    pub fn to_bytes(&self) -> [u8; ADTS_HEADER_LEN] {
        let len = self.frame_length;
        let fullness = self.buffer_fullness & 0x7FF;
        [
            0xFF,
            0xF0 | (self.mpeg_version.bit() << 3) | u8::from(self.protection_absent),
            (self.profile.adts_bits() << 6)
                | ((self.sampling_index & 0x0F) << 2)
                | ((self.channel_config >> 2) & 0x01),
            ((self.channel_config & 0x03) << 6) | ((len >> 11) as u8 & 0x03),
            ((len >> 3) & 0xFF) as u8,
            (((len & 0x07) as u8) << 5) | ((fullness >> 6) as u8 & 0x1F),
            (((fullness & 0x3F) as u8) << 2) | (self.raw_blocks & 0x03),
        ]
    }
}

/// Build the 7-byte header that precedes a raw AAC payload.
pub fn encode_header(
    payload_len: usize,
    sampling_index: u8,
    profile: AacProfile,
    channel_config: u8,
) -> Result<[u8; ADTS_HEADER_LEN]> {
    AdtsHeader::for_payload(payload_len, sampling_index, profile, channel_config)
        .map(|h| h.to_bytes())
}

/// Parse the fixed header at the start of `bytes`.
pub fn parse_header(bytes: &[u8]) -> Result<AdtsHeader> {
    if bytes.len() < ADTS_HEADER_LEN {
        return Err(TranscodeError::Adts(format!(
            "need {} header bytes, got {}",
            ADTS_HEADER_LEN,
            bytes.len()
        )));
    }
    let sync = ((bytes[0] as u16) << 4) | (bytes[1] as u16 >> 4);
    if sync != SYNCWORD {
        return Err(TranscodeError::Adts(format!("bad syncword {:#05x}", sync)));
    }
    let layer = (bytes[1] >> 1) & 0x03;
    if layer != 0 {
        return Err(TranscodeError::Adts(format!("layer must be 0, got {}", layer)));
    }

    let mpeg_version = if bytes[1] & 0x08 != 0 {
        MpegVersion::Mpeg2
    } else {
        MpegVersion::Mpeg4
    };
    let protection_absent = bytes[1] & 0x01 != 0;
    let profile = AacProfile::from_adts_bits(bytes[2] >> 6)
        .ok_or_else(|| TranscodeError::Adts("reserved profile".into()))?;
    let sampling_index = (bytes[2] >> 2) & 0x0F;
    if sample_rate_for_index(sampling_index).is_none() {
        return Err(TranscodeError::Adts(format!(
            "sampling index {} out of range",
            sampling_index
        )));
    }
    let channel_config = ((bytes[2] & 0x01) << 2) | (bytes[3] >> 6);
    let frame_length =
        ((bytes[3] as u16 & 0x03) << 11) | ((bytes[4] as u16) << 3) | (bytes[5] as u16 >> 5);
    let buffer_fullness = ((bytes[5] as u16 & 0x1F) << 6) | (bytes[6] as u16 >> 2);
    let raw_blocks = bytes[6] & 0x03;

    let header = AdtsHeader {
        mpeg_version,
        protection_absent,
        profile,
        sampling_index,
        channel_config,
        frame_length,
        buffer_fullness,
        raw_blocks,
    };
    if (frame_length as usize) < header.header_len() {
        return Err(TranscodeError::Adts(format!(
            "frame length {} shorter than header",
            frame_length
        )));
    }
    Ok(header)
}
