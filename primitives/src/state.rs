//! Persisted device-state codec.
//!
//! Save/restore persists only the interrupt registers. The blob is a 32-bit
//! big-endian version word followed by `int_status` and `int_enable`, also
//! big-endian. A version mismatch fails the decode so a restore from an
//! incompatible snapshot leaves the device untouched.

/// Current save-blob version.
pub const STATE_VERSION: u32 = 2;

/// Encoded blob length in bytes.
pub const STATE_BLOB_LEN: usize = 12;

/// The persisted register pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedState {
    pub int_status: u32,
    pub int_enable: u32,
}

/// Decode failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateError {
    #[error("state blob too short: {0} bytes")]
    TooShort(usize),

    #[error("state version mismatch: expected {expected}, got {got}")]
    VersionMismatch { expected: u32, got: u32 },
}

/// Encode a state blob at the current version.
pub fn encode_state(state: &SavedState) -> [u8; STATE_BLOB_LEN] {
    let mut out = [0u8; STATE_BLOB_LEN];
    out[0..4].copy_from_slice(&STATE_VERSION.to_be_bytes());
    out[4..8].copy_from_slice(&state.int_status.to_be_bytes());
    out[8..12].copy_from_slice(&state.int_enable.to_be_bytes());
    out
}

/// Decode a state blob, verifying the version word.
pub fn decode_state(bytes: &[u8]) -> Result<SavedState, StateError> {
    if bytes.len() < STATE_BLOB_LEN {
        return Err(StateError::TooShort(bytes.len()));
    }
    let word = |off: usize| u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]]);
    let version = word(0);
    if version != STATE_VERSION {
        return Err(StateError::VersionMismatch {
            expected: STATE_VERSION,
            got: version,
        });
    }
    Ok(SavedState {
        int_status: word(4),
        int_enable: word(8),
    })
}
