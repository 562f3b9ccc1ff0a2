//! Server-to-client frame encoding.
//!
//! Only what the broker pushes is implemented: single, unfragmented,
//! unmasked frames. Client frames are never decoded; the only inbound signal
//! the broker acts on is the socket closing.

/// Frame opcodes used by the broker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    Text = 0x1,
    Close = 0x8,
}

const FIN: u8 = 0x80;

/// Encode `payload` as a final frame with the given opcode.
///
/// Lengths up to 125 fit in the second byte; up to 65535 use the `126`
/// marker plus a 16-bit big-endian length; anything larger uses `127` plus a
/// 64-bit big-endian length.
pub fn encode_frame(opcode: Opcode, payload: &[u8]) -> Vec<u8> {
    let len = payload.len();
    let mut frame = Vec::with_capacity(len + 10);

    frame.push(FIN | opcode as u8);
    if len <= 125 {
        frame.push(len as u8);
    } else if len <= u16::MAX as usize {
        frame.push(126);
        frame.extend_from_slice(&(len as u16).to_be_bytes());
    } else {
        frame.push(127);
        frame.extend_from_slice(&(len as u64).to_be_bytes());
    }

    frame.extend_from_slice(payload);
    frame
}

pub fn encode_text_frame(message: &str) -> Vec<u8> {
    encode_frame(Opcode::Text, message.as_bytes())
}

/// A close frame without a status code.
pub fn close_frame() -> Vec<u8> {
    encode_frame(Opcode::Close, &[])
}
