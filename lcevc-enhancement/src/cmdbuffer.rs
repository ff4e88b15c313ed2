//! Residual command buffers.
//!
//! The decode loop serializes its output as a stream of commands against
//! block-raster transform-unit positions; the applicator replays the stream
//! against a picture plane. One allocation stores both regions: command
//! bytes grow from the front, residual payloads grow from the end backwards.
//! The regions never overlap; an append that would collide grows the
//! allocation, and the buffer is never shrunk so it settles at the stream's
//! peak size.
//!
//! Wire format of a command: one byte with the opcode in bits 7..6 and a
//! 6-bit jump field in bits 5..0. Jump values 0..=61 are literal TU jumps;
//! 62 means the next two bytes hold the jump (little endian); 63 means the
//! next three bytes do.

use crate::config::TransformType;

/// Jump field value signalling a two-byte extension.
const MID_JUMP_SIGNAL: u8 = 62;
/// Jump field value signalling a three-byte extension.
const BIG_JUMP_SIGNAL: u8 = 63;

const MID_JUMP_MAX: u32 = 0xFFFF;
const BIG_JUMP_MAX: u32 = 0xFF_FFFF;

/// A command against a transform-unit position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmdBufferCmd {
    /// Add the residual payload to the target samples.
    Add = 0x00,
    /// Overwrite the target samples with the payload (signed targets).
    Set = 0x40,
    /// Overwrite the target samples with zeros (signed targets).
    SetZero = 0x80,
    /// Zero a whole 32x32 (edge-clipped) block.
    Clear = 0xC0,
}

impl CmdBufferCmd {
    #[inline]
    fn from_byte(byte: u8) -> Self {
        match byte & 0xC0 {
            0x00 => Self::Add,
            0x40 => Self::Set,
            0x80 => Self::SetZero,
            _ => Self::Clear,
        }
    }

    /// Whether the command carries a residual payload.
    #[inline]
    pub fn has_residuals(self) -> bool {
        matches!(self, Self::Add | Self::Set)
    }
}

/// A resumption record allowing a segment of the stream to be applied
/// independently of the commands before it.
#[derive(Debug, Clone, Copy, Default)]
pub struct EntryPoint {
    /// Jump accumulator at the start of the segment: the TU index reached by
    /// the last command before it.
    pub initial_jump: u32,
    /// Byte offset of the segment's first command.
    pub command_offset: usize,
    /// Residual bytes consumed before the segment.
    pub data_offset: usize,
    /// Number of commands in the segment.
    pub count: u32,
}

/// A double-ended command/payload buffer.
#[derive(Debug, Clone, Default)]
pub struct CmdBuffer {
    buffer: Vec<u8>,
    command_len: usize,
    residual_len: usize,
    /// Residual values per payload-carrying command: 4 or 16.
    transform_size: usize,
    entry_points: Vec<EntryPoint>,
    command_count: u32,
    segment_count: u32,
    jump_accum: u32,
    segment_initial_jump: u32,
    segment_command_offset: usize,
    segment_data_offset: usize,
}

impl CmdBuffer {
    const INITIAL_CAPACITY: usize = 1024;

    /// Create a buffer expecting roughly `num_entry_points` splits.
    pub fn new(num_entry_points: usize) -> Self {
        Self {
            entry_points: Vec::with_capacity(num_entry_points * 2),
            ..Self::default()
        }
    }

    /// Clear both regions and set the transform size for the next stream.
    /// The allocation is retained.
    pub fn reset(&mut self, transform: TransformType) {
        self.command_len = 0;
        self.residual_len = 0;
        self.transform_size = transform.layer_count();
        self.entry_points.clear();
        self.command_count = 0;
        self.segment_count = 0;
        self.jump_accum = 0;
        self.segment_initial_jump = 0;
        self.segment_command_offset = 0;
        self.segment_data_offset = 0;
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.command_count == 0
    }

    #[inline]
    pub fn command_count(&self) -> u32 {
        self.command_count
    }

    /// Residual values per payload-carrying command.
    #[inline]
    pub fn transform_size(&self) -> usize {
        self.transform_size
    }

    /// Payload bytes per payload-carrying command.
    #[inline]
    pub fn layer_size(&self) -> usize {
        self.transform_size * 2
    }

    /// Total bytes of the residual payload region.
    #[inline]
    pub fn residual_size(&self) -> usize {
        self.residual_len
    }

    /// Append one command. `residuals`, when present, must hold
    /// `transform_size` values in scanline order.
    pub fn append(&mut self, cmd: CmdBufferCmd, residuals: Option<&[i16]>, jump: u32) {
        debug_assert!(jump <= BIG_JUMP_MAX, "jump {jump} exceeds the wire format");
        debug_assert_eq!(cmd.has_residuals(), residuals.is_some());

        let command_bytes = if jump < u32::from(MID_JUMP_SIGNAL) {
            1
        } else if jump <= MID_JUMP_MAX {
            3
        } else {
            4
        };
        let payload_bytes = residuals.map_or(0, |r| {
            debug_assert_eq!(r.len(), self.transform_size);
            self.layer_size()
        });
        self.ensure_capacity(command_bytes + payload_bytes);

        let op = cmd as u8;
        match command_bytes {
            1 => {
                self.buffer[self.command_len] = op | jump as u8;
            }
            3 => {
                self.buffer[self.command_len] = op | MID_JUMP_SIGNAL;
                self.buffer[self.command_len + 1] = jump as u8;
                self.buffer[self.command_len + 2] = (jump >> 8) as u8;
            }
            _ => {
                self.buffer[self.command_len] = op | BIG_JUMP_SIGNAL;
                self.buffer[self.command_len + 1] = jump as u8;
                self.buffer[self.command_len + 2] = (jump >> 8) as u8;
                self.buffer[self.command_len + 3] = (jump >> 16) as u8;
            }
        }
        self.command_len += command_bytes;

        if let Some(values) = residuals {
            self.residual_len += self.layer_size();
            let start = self.buffer.len() - self.residual_len;
            for (i, &value) in values.iter().enumerate() {
                let bytes = value.to_le_bytes();
                self.buffer[start + i * 2] = bytes[0];
                self.buffer[start + i * 2 + 1] = bytes[1];
            }
        }

        self.jump_accum += jump;
        self.command_count += 1;
        self.segment_count += 1;
    }

    /// Finalize the open segment as an entry point. Subsequent appends start
    /// the next segment.
    pub fn split(&mut self) {
        self.entry_points.push(EntryPoint {
            initial_jump: self.segment_initial_jump,
            command_offset: self.segment_command_offset,
            data_offset: self.segment_data_offset,
            count: self.segment_count,
        });
        self.segment_initial_jump = self.jump_accum;
        self.segment_command_offset = self.command_len;
        self.segment_data_offset = self.residual_len;
        self.segment_count = 0;
    }

    /// Number of independently applicable segments. A buffer without splits
    /// is one synthetic segment.
    #[inline]
    pub fn num_segments(&self) -> usize {
        self.entry_points.len().max(1)
    }

    /// Iterate one segment's commands.
    pub fn segment(&self, entry_point_index: usize) -> SegmentIter<'_> {
        let entry = if self.entry_points.is_empty() {
            EntryPoint {
                initial_jump: 0,
                command_offset: 0,
                data_offset: 0,
                count: self.command_count,
            }
        } else {
            self.entry_points[entry_point_index]
        };

        SegmentIter {
            buffer: self,
            command_offset: entry.command_offset,
            data_offset: entry.data_offset,
            remaining: entry.count,
            initial_jump: entry.initial_jump,
        }
    }

    fn ensure_capacity(&mut self, extra: usize) {
        let needed = self.command_len + self.residual_len + extra;
        if needed <= self.buffer.len() {
            return;
        }

        let new_len = (self.buffer.len() * 2).max(needed).max(Self::INITIAL_CAPACITY);
        let mut grown = vec![0u8; new_len];
        grown[..self.command_len].copy_from_slice(&self.buffer[..self.command_len]);
        if self.residual_len > 0 {
            let old_start = self.buffer.len() - self.residual_len;
            let new_start = new_len - self.residual_len;
            grown[new_start..].copy_from_slice(&self.buffer[old_start..]);
        }
        self.buffer = grown;
    }
}

/// One decoded command.
#[derive(Debug, Clone, Copy)]
pub struct Command<'a> {
    pub cmd: CmdBufferCmd,
    pub jump: u32,
    /// Scanline-ordered residual payload bytes (little-endian i16), present
    /// for `Add` and `Set`.
    pub residuals: Option<&'a [u8]>,
}

/// Cursor over one segment of a command buffer.
#[derive(Debug, Clone)]
pub struct SegmentIter<'a> {
    buffer: &'a CmdBuffer,
    command_offset: usize,
    data_offset: usize,
    remaining: u32,
    initial_jump: u32,
}

impl<'a> SegmentIter<'a> {
    /// The TU jump accumulator the segment starts from.
    #[inline]
    pub fn initial_jump(&self) -> u32 {
        self.initial_jump
    }
}

impl<'a> Iterator for SegmentIter<'a> {
    type Item = Command<'a>;

    fn next(&mut self) -> Option<Command<'a>> {
        if self.remaining == 0 {
            return None;
        }
        self.remaining -= 1;

        let bytes = &self.buffer.buffer;
        let first = bytes[self.command_offset];
        let cmd = CmdBufferCmd::from_byte(first);

        let jump_signal = first & 0x3F;
        let jump = if jump_signal < MID_JUMP_SIGNAL {
            self.command_offset += 1;
            u32::from(jump_signal)
        } else if jump_signal == MID_JUMP_SIGNAL {
            let jump = u32::from(bytes[self.command_offset + 1])
                | u32::from(bytes[self.command_offset + 2]) << 8;
            self.command_offset += 3;
            jump
        } else {
            let jump = u32::from(bytes[self.command_offset + 1])
                | u32::from(bytes[self.command_offset + 2]) << 8
                | u32::from(bytes[self.command_offset + 3]) << 16;
            self.command_offset += 4;
            jump
        };

        let residuals = if cmd.has_residuals() {
            self.data_offset += self.buffer.layer_size();
            let start = bytes.len() - self.data_offset;
            Some(&bytes[start..start + self.buffer.layer_size()])
        } else {
            None
        };

        Some(Command {
            cmd,
            jump,
            residuals,
        })
    }
}

/// A command buffer together with the geometry of the tile it covers.
#[derive(Debug, Clone, Default)]
pub struct EnhancementTile {
    pub buffer: CmdBuffer,
    pub tile_x: u32,
    pub tile_y: u32,
    pub tile_width: u32,
    pub tile_height: u32,
    pub plane_width: u32,
    pub plane_height: u32,
}

impl EnhancementTile {
    /// A tile spanning a whole plane.
    pub fn whole_plane(width: u32, height: u32, num_entry_points: usize) -> Self {
        Self {
            buffer: CmdBuffer::new(num_entry_points),
            tile_x: 0,
            tile_y: 0,
            tile_width: width,
            tile_height: height,
            plane_width: width,
            plane_height: height,
        }
    }
}
