//! Body of the legacy envelope format: one single block, or a run of frames.

use super::envelope::EnvelopeError;
use super::header::{ContentType, MESSAGE_ID_LEN};
use super::reader::Reader;
use super::suite::{IV_LEN, TAG_LEN};

/// Sequence-number slot value announcing the final frame.
pub const FINAL_FRAME_MARKER: u32 = 0xFFFF_FFFF;

const SINGLE_BLOCK_AAD: &[u8] = b"AWSKMSEncryptionClient Single Block";
const FRAME_AAD: &[u8] = b"AWSKMSEncryptionClient Frame";
const FINAL_FRAME_AAD: &[u8] = b"AWSKMSEncryptionClient Final Frame";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameKind {
    SingleBlock,
    Regular,
    Final,
}

/// One authenticated unit of ciphertext.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub kind: FrameKind,
    pub sequence_number: u32,
    pub iv: [u8; IV_LEN],
    pub ciphertext: Vec<u8>,
    pub tag: [u8; TAG_LEN],
}

impl Frame {
    /// AAD binding this frame to its message, position and length.
    pub fn aad(&self, message_id: &[u8; MESSAGE_ID_LEN]) -> Vec<u8> {
        let label = match self.kind {
            FrameKind::SingleBlock => SINGLE_BLOCK_AAD,
            FrameKind::Regular => FRAME_AAD,
            FrameKind::Final => FINAL_FRAME_AAD,
        };
        let mut aad = Vec::with_capacity(MESSAGE_ID_LEN + label.len() + 12);
        aad.extend_from_slice(message_id);
        aad.extend_from_slice(label);
        aad.extend_from_slice(&self.sequence_number.to_be_bytes());
        aad.extend_from_slice(&(self.ciphertext.len() as u64).to_be_bytes());
        aad
    }
}

/// Parse the body that follows the header authentication block.
pub fn parse_body(
    r: &mut Reader<'_>,
    content_type: ContentType,
    frame_length: u32,
) -> Result<Vec<Frame>, EnvelopeError> {
    match content_type {
        ContentType::SingleBlock => parse_single_block(r).map(|f| vec![f]),
        ContentType::Framed => parse_frames(r, frame_length),
    }
}

fn parse_single_block(r: &mut Reader<'_>) -> Result<Frame, EnvelopeError> {
    let iv = r.array::<IV_LEN>("body iv")?;
    let len = r.u64("body content length")?;
    if len > r.remaining() as u64 {
        return Err(EnvelopeError::Truncated("body content"));
    }
    let ciphertext = r.bytes(len as usize, "body content")?.to_vec();
    let tag = r.array::<TAG_LEN>("body tag")?;
    Ok(Frame {
        kind: FrameKind::SingleBlock,
        sequence_number: 1,
        iv,
        ciphertext,
        tag,
    })
}

fn parse_frames(r: &mut Reader<'_>, frame_length: u32) -> Result<Vec<Frame>, EnvelopeError> {
    let mut frames = Vec::new();
    let mut expected: u32 = 1;
    loop {
        let slot = r.u32("frame sequence number")?;
        if slot == FINAL_FRAME_MARKER {
            let sequence_number = r.u32("final frame sequence number")?;
            check_sequence(sequence_number, expected)?;
            let iv = r.array::<IV_LEN>("final frame iv")?;
            let len = r.u32("final frame content length")?;
            if len > frame_length {
                return Err(EnvelopeError::Invalid(format!(
                    "final frame length {len} exceeds frame length {frame_length}"
                )));
            }
            let ciphertext = r.bytes(len as usize, "final frame content")?.to_vec();
            let tag = r.array::<TAG_LEN>("final frame tag")?;
            frames.push(Frame {
                kind: FrameKind::Final,
                sequence_number,
                iv,
                ciphertext,
                tag,
            });
            return Ok(frames);
        }

        check_sequence(slot, expected)?;
        let iv = r.array::<IV_LEN>("frame iv")?;
        let ciphertext = r.bytes(frame_length as usize, "frame content")?.to_vec();
        let tag = r.array::<TAG_LEN>("frame tag")?;
        frames.push(Frame {
            kind: FrameKind::Regular,
            sequence_number: slot,
            iv,
            ciphertext,
            tag,
        });
        expected = expected
            .checked_add(1)
            .filter(|n| *n != FINAL_FRAME_MARKER)
            .ok_or_else(|| EnvelopeError::Invalid("frame count overflow".into()))?;
    }
}

fn check_sequence(actual: u32, expected: u32) -> Result<(), EnvelopeError> {
    if actual != expected {
        return Err(EnvelopeError::Invalid(format!(
            "frame sequence number {actual}, expected {expected}"
        )));
    }
    Ok(())
}
