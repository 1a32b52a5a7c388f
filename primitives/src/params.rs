//! Parameter-block byte layout.
//!
//! The device publishes its diagnostic registers into a named shared-memory
//! region so cooperating host processes can read them. The layout is an
//! explicit sequence of 32-bit little-endian fields rather than a shared
//! struct; a process that maps the region by name gets a byte-compatible
//! view regardless of its own language or compiler.

/// Named field offsets within the parameter block, in bytes.
pub mod offsets {
    pub const INT_STATUS: usize = 0;
    pub const INT_ENABLE: usize = 4;
    pub const REGION_WRITE_DONE: usize = 8;
    pub const SYNC_VALUE: usize = 12;
    pub const NUMBER_OF_BUFFERS: usize = 16;
    pub const EACH_BUFFER_SIZE: usize = 20;
    pub const TOTAL_BUFFERS_LENGTH: usize = 24;
    pub const HOST_BUFFER_LENGTH: usize = 28;
    pub const INPUT_BUFFER_1_AVAILABLE_COUNT: usize = 32;
    pub const INPUT_BUFFER_2_AVAILABLE_COUNT: usize = 36;
    pub const CURRENT_INPUT_BUFFER: usize = 40;
    pub const CURRENT_OUTPUT_BUFFER: usize = 44;
    pub const SIGNAL_TYPE: usize = 48;
    pub const SIGNAL_VALUE: usize = 52;
    pub const HOST_DATA_BUFFER_OFFSET: usize = 56;
}

/// Total size of the parameter block in bytes.
pub const PARAM_BLOCK_SIZE: usize = 60;

/// One coherent snapshot of the published fields.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ParamSnapshot {
    pub int_status: u32,
    pub int_enable: u32,
    pub region_write_done: u32,
    pub sync_value: u32,
    pub number_of_buffers: u32,
    pub each_buffer_size: u32,
    pub total_buffers_length: u32,
    pub host_buffer_length: u32,
    pub input_buffer_1_available_count: u32,
    pub input_buffer_2_available_count: u32,
    pub current_input_buffer: u32,
    pub current_output_buffer: u32,
    pub signal_type: u32,
    pub signal_value: u32,
    pub host_data_buffer_offset: u32,
}

impl ParamSnapshot {
    /// Serialize into the first `PARAM_BLOCK_SIZE` bytes of `out`.
    ///
    /// `out` must be at least `PARAM_BLOCK_SIZE` long; the remainder of a
    /// larger region is left untouched.
    pub fn encode_into(&self, out: &mut [u8]) {
        use offsets::*;

        let mut put = |off: usize, v: u32| {
            out[off..off + 4].copy_from_slice(&v.to_le_bytes());
        };
        put(INT_STATUS, self.int_status);
        put(INT_ENABLE, self.int_enable);
        put(REGION_WRITE_DONE, self.region_write_done);
        put(SYNC_VALUE, self.sync_value);
        put(NUMBER_OF_BUFFERS, self.number_of_buffers);
        put(EACH_BUFFER_SIZE, self.each_buffer_size);
        put(TOTAL_BUFFERS_LENGTH, self.total_buffers_length);
        put(HOST_BUFFER_LENGTH, self.host_buffer_length);
        put(
            INPUT_BUFFER_1_AVAILABLE_COUNT,
            self.input_buffer_1_available_count,
        );
        put(
            INPUT_BUFFER_2_AVAILABLE_COUNT,
            self.input_buffer_2_available_count,
        );
        put(CURRENT_INPUT_BUFFER, self.current_input_buffer);
        put(CURRENT_OUTPUT_BUFFER, self.current_output_buffer);
        put(SIGNAL_TYPE, self.signal_type);
        put(SIGNAL_VALUE, self.signal_value);
        put(HOST_DATA_BUFFER_OFFSET, self.host_data_buffer_offset);
    }
}

/// Read one published field from a mapped parameter block.
///
/// This is the accessor a cooperating process uses; it performs no
/// validation beyond the bounds check.
pub fn read_field(block: &[u8], offset: usize) -> Option<u32> {
    let bytes = block.get(offset..offset + 4)?;
    Some(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
}
