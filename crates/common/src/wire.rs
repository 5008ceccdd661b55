#![forbid(unsafe_code)]

use std::io::{Read, Write};

/// First byte of every frame; anything else on the wire is a protocol fault.
pub const MAGIC_BYTE: u8 = 0x5A;

/// Upper bound on a single frame body.
pub const MAX_FRAME_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug)]
pub enum WireError {
    Io(std::io::Error),
    BadMagic(u8),
    OversizedFrame(usize),
    TruncatedFrame,
}

impl std::fmt::Display for WireError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WireError::Io(err) => write!(f, "wire i/o error: {err}"),
            WireError::BadMagic(byte) => write!(f, "bad magic byte 0x{byte:02X}"),
            WireError::OversizedFrame(len) => write!(f, "frame of {len} bytes exceeds limit"),
            WireError::TruncatedFrame => write!(f, "peer closed mid-frame"),
        }
    }
}

impl std::error::Error for WireError {}

impl From<std::io::Error> for WireError {
    fn from(err: std::io::Error) -> Self {
        WireError::Io(err)
    }
}

/// Writes one frame: magic byte, 4-byte big-endian length, payload.
pub fn write_frame<W: Write>(writer: &mut W, payload: &[u8]) -> Result<(), WireError> {
    if payload.len() > MAX_FRAME_BYTES {
        return Err(WireError::OversizedFrame(payload.len()));
    }
    let len = payload.len() as u32;
    writer.write_all(&[MAGIC_BYTE])?;
    writer.write_all(&len.to_be_bytes())?;
    writer.write_all(payload)?;
    writer.flush()?;
    Ok(())
}

/// Reads one frame body. `Ok(None)` means the peer closed at a frame
/// boundary; a close mid-frame is `TruncatedFrame`.
pub fn read_frame<R: Read>(reader: &mut R) -> Result<Option<Vec<u8>>, WireError> {
    let mut magic = [0u8; 1];
    loop {
        match reader.read(&mut magic) {
            Ok(0) => return Ok(None),
            Ok(_) => break,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(err) => return Err(WireError::Io(err)),
        }
    }
    if magic[0] != MAGIC_BYTE {
        return Err(WireError::BadMagic(magic[0]));
    }

    let mut len_buf = [0u8; 4];
    read_exact_or_truncated(reader, &mut len_buf)?;
    let len = u32::from_be_bytes(len_buf) as usize;
    if len > MAX_FRAME_BYTES {
        return Err(WireError::OversizedFrame(len));
    }

    let mut body = vec![0u8; len];
    read_exact_or_truncated(reader, &mut body)?;
    Ok(Some(body))
}

// Accumulates partial reads until the declared length is satisfied.
fn read_exact_or_truncated<R: Read>(reader: &mut R, buf: &mut [u8]) -> Result<(), WireError> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => return Err(WireError::TruncatedFrame),
            Ok(n) => filled += n,
            Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
            Err(err) => return Err(WireError::Io(err)),
        }
    }
    Ok(())
}
