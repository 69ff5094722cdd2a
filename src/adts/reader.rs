use super::header::{parse_header, AdtsHeader};
use crate::error::{Result, TranscodeError};

/// Splits an ADTS byte stream into `(header, raw payload)` pairs.
///
/// Any CRC bytes are skipped, so the payload is exactly what a raw AAC
/// decoder expects. Iteration stops after the first malformed or truncated
/// frame, which is yielded as an error.
pub struct AdtsFrames<'a> {
    data: &'a [u8],
    offset: usize,
    failed: bool,
}

impl<'a> AdtsFrames<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            offset: 0,
            failed: false,
        }
    }
}

impl<'a> Iterator for AdtsFrames<'a> {
    type Item = Result<(AdtsHeader, &'a [u8])>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.offset >= self.data.len() {
            return None;
        }
        let rest = &self.data[self.offset..];
        let header = match parse_header(rest) {
            Ok(h) => h,
            Err(e) => {
                self.failed = true;
                return Some(Err(e));
            }
        };
        let frame_len = header.frame_length as usize;
        if rest.len() < frame_len {
            self.failed = true;
            return Some(Err(TranscodeError::Adts(format!(
                "truncated frame at offset {}: need {} bytes, have {}",
                self.offset,
                frame_len,
                rest.len()
            ))));
        }
        let payload = &rest[header.header_len()..frame_len];
        self.offset += frame_len;
        Some(Ok((header, payload)))
    }
}
