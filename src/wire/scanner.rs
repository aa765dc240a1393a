//! Low-level protobuf wire format scanning.
//!
//! [`WireScanner`] decodes the protobuf binary encoding in a single forward
//! pass: a virtual cursor, a stack of message-end positions for nested
//! length-delimited submessages, and typed primitives for pulling scalar
//! values out of the current field. Messages on the top level are framed by
//! a leading varint length.
//!
//! Wire types:
//! - 0: VARINT (int32, int64, uint32, uint64, sint32, sint64, bool, enum)
//! - 1: BITS64 (fixed64, sfixed64, double)
//! - 2: LENGTH_DELIMITED (string, bytes, embedded messages, packed fields)
//! - 3/4: GROUP_START / GROUP_END (legacy groups, skipped)
//! - 5: BITS32 (fixed32, sfixed32, float)

use thiserror::Error;

use crate::wire::ByteSource;

/// Errors raised while scanning the wire format.
#[derive(Debug, Error)]
pub enum ScanError {
    #[error("protobuf messages are corrupted or do not match the provided schema: {0}")]
    UnknownFormat(&'static str),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn unknown_format(detail: &'static str) -> ScanError {
    ScanError::UnknownFormat(detail)
}

/// Protobuf wire types, the low 3 bits of a field key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WireType {
    Varint = 0,
    Bits64 = 1,
    LengthDelimited = 2,
    GroupStart = 3,
    GroupEnd = 4,
    Bits32 = 5,
}

impl WireType {
    fn from_key(key: u64) -> Result<Self, ScanError> {
        match key & 0x07 {
            0 => Ok(WireType::Varint),
            1 => Ok(WireType::Bits64),
            2 => Ok(WireType::LengthDelimited),
            3 => Ok(WireType::GroupStart),
            4 => Ok(WireType::GroupEnd),
            5 => Ok(WireType::Bits32),
            _ => Err(unknown_format("unknown wire type")),
        }
    }
}

// Sentinel positions for `current_message_end` and `field_end`. The
// ordering REACHED_END < any live cursor < END_OF_GROUP < END_OF_VARINT
// lets `cursor >= end` answer "is this field/message consumed" for both
// definite and variable ends with a single comparison. The cursor itself
// starts at 1 so it is always strictly above REACHED_END.
const REACHED_END: u64 = 0;
const END_OF_GROUP: u64 = u64::MAX - 1;
const END_OF_VARINT: u64 = u64::MAX;

/// ZigZag decoding per the protobuf encoding rules.
fn decode_zig_zag(n: u64) -> i64 {
    ((n >> 1) as i64) ^ -((n & 1) as i64)
}

/// Streaming decoder for the protobuf wire format.
///
/// The scanner owns the byte source and tracks message framing; value
/// interpretation is left to the conversion layer. It is single-shot: a
/// format error leaves the stream unusable except for
/// [`end_root_message`](Self::end_root_message) resynchronization.
pub struct WireScanner<S> {
    source: S,
    cursor: u64,
    current_message_end: u64,
    field_end: u64,
    parent_message_ends: Vec<u64>,
}

impl<S: ByteSource> WireScanner<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            cursor: 1,
            current_message_end: REACHED_END,
            field_end: REACHED_END,
            parent_message_ends: Vec::new(),
        }
    }

    /// Current virtual cursor position.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }

    /// Begin a message.
    ///
    /// With no active frame this reads the varint length of the next root
    /// message, returning `false` on a clean end of stream. With an active
    /// frame it descends into the length-delimited (or group) field whose
    /// header was just read.
    pub fn start_message(&mut self) -> Result<bool, ScanError> {
        if self.current_message_end == REACHED_END && self.parent_message_ends.is_empty() {
            if self.source.eof()? {
                return Ok(false);
            }
            let size = self.read_varint()?;
            self.current_message_end = self.field_position(size)?;
        } else {
            if self.field_end < END_OF_GROUP
                && self.current_message_end < END_OF_GROUP
                && self.field_end > self.current_message_end
            {
                return Err(unknown_format("nested message extends past its parent"));
            }
            self.parent_message_ends.push(self.current_message_end);
            self.current_message_end = self.field_end;
        }
        self.field_end = REACHED_END;
        Ok(true)
    }

    /// Close the innermost frame, consuming any unread remainder.
    ///
    /// A group frame skips to its matching end tag. A frame whose cursor
    /// overshot its declared end is a format error for nested frames and a
    /// bounded rewind for the root.
    pub fn end_message(&mut self) -> Result<(), ScanError> {
        if self.current_message_end != REACHED_END {
            if self.current_message_end == END_OF_GROUP {
                self.ignore_group()?;
            } else if self.cursor < self.current_message_end {
                self.ignore(self.current_message_end - self.cursor)?;
            } else if self.cursor > self.current_message_end {
                if !self.parent_message_ends.is_empty() {
                    return Err(unknown_format("nested message extends past its parent"));
                }
                self.move_cursor_backward(self.cursor - self.current_message_end)?;
            }
            self.current_message_end = REACHED_END;
        }

        self.field_end = REACHED_END;
        if let Some(end) = self.parent_message_ends.pop() {
            self.current_message_end = end;
        }
        Ok(())
    }

    /// Unconditionally reset to the root frame, aligning the cursor to the
    /// root message end by forward skip or backward rewind. Abandons any
    /// partly consumed nested frames and fields.
    pub fn end_root_message(&mut self) -> Result<(), ScanError> {
        let message_end = self
            .parent_message_ends
            .first()
            .copied()
            .unwrap_or(self.current_message_end);
        if message_end != REACHED_END {
            if self.cursor < message_end {
                self.ignore(message_end - self.cursor)?;
            } else if self.cursor > message_end {
                self.move_cursor_backward(self.cursor - message_end)?;
            }
        }
        self.parent_message_ends.clear();
        self.current_message_end = REACHED_END;
        self.field_end = REACHED_END;
        Ok(())
    }

    /// Read the next field header in the current frame.
    ///
    /// Disposes of any previous field left partly consumed, then returns
    /// the field number, or `None` when the frame is exhausted (declared
    /// end reached, or the matching group end tag was seen).
    pub fn read_field_number(&mut self) -> Result<Option<u32>, ScanError> {
        if self.field_end != REACHED_END {
            if self.field_end == END_OF_VARINT {
                self.ignore_varint()?;
            } else if self.field_end == END_OF_GROUP {
                self.ignore_group()?;
            } else if self.cursor < self.field_end {
                self.ignore(self.field_end - self.cursor)?;
            }
            self.field_end = REACHED_END;
        }

        if self.cursor >= self.current_message_end {
            self.current_message_end = REACHED_END;
            return Ok(None);
        }

        let key = self.read_varint()?;
        if key & (0xFFFF_FFFFu64 << 32) != 0 {
            return Err(unknown_format("field key does not fit in 32 bits"));
        }
        let field_number = (key >> 3) as u32;
        match WireType::from_key(key)? {
            WireType::Bits64 => {
                self.field_end = self.field_position(8)?;
            }
            WireType::LengthDelimited => {
                let length = self.read_varint()?;
                self.field_end = self.field_position(length)?;
            }
            WireType::Varint => {
                self.field_end = END_OF_VARINT;
            }
            WireType::GroupStart => {
                self.field_end = END_OF_GROUP;
            }
            WireType::GroupEnd => {
                if self.current_message_end != END_OF_GROUP {
                    return Err(unknown_format("group end tag without a matching group start"));
                }
                self.current_message_end = REACHED_END;
                return Ok(None);
            }
            WireType::Bits32 => {
                self.field_end = self.field_position(4)?;
            }
        }
        Ok(Some(field_number))
    }

    /// Read a varint field as unsigned. Returns `None` once the current
    /// field has been consumed, so a non-packed field yields exactly one
    /// value and a packed payload yields one value per element.
    pub fn read_uint(&mut self) -> Result<Option<u64>, ScanError> {
        if self.cursor >= self.field_end {
            self.field_end = REACHED_END;
            return Ok(None);
        }
        let value = self.read_varint()?;
        if self.field_end == END_OF_VARINT || self.cursor >= self.field_end {
            self.field_end = REACHED_END;
        }
        Ok(Some(value))
    }

    /// Read a varint field as signed two's-complement.
    pub fn read_int(&mut self) -> Result<Option<i64>, ScanError> {
        Ok(self.read_uint()?.map(|v| v as i64))
    }

    /// Read a ZigZag-encoded varint field.
    pub fn read_sint(&mut self) -> Result<Option<i64>, ScanError> {
        Ok(self.read_uint()?.map(decode_zig_zag))
    }

    fn read_fixed_bytes<const N: usize>(&mut self) -> Result<Option<[u8; N]>, ScanError> {
        if self.cursor >= self.field_end {
            self.field_end = REACHED_END;
            return Ok(None);
        }
        let mut bytes = [0u8; N];
        self.read_binary(&mut bytes)?;
        if self.cursor >= self.field_end {
            self.field_end = REACHED_END;
        }
        Ok(Some(bytes))
    }

    pub fn read_fixed_u32(&mut self) -> Result<Option<u32>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(u32::from_le_bytes))
    }

    pub fn read_fixed_i32(&mut self) -> Result<Option<i32>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(i32::from_le_bytes))
    }

    pub fn read_fixed_u64(&mut self) -> Result<Option<u64>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(u64::from_le_bytes))
    }

    pub fn read_fixed_i64(&mut self) -> Result<Option<i64>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(i64::from_le_bytes))
    }

    pub fn read_fixed_f32(&mut self) -> Result<Option<f32>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(f32::from_le_bytes))
    }

    pub fn read_fixed_f64(&mut self) -> Result<Option<f64>, ScanError> {
        Ok(self.read_fixed_bytes()?.map(f64::from_le_bytes))
    }

    /// Append the remaining bytes of the current length-delimited field to
    /// `buf` and mark the field consumed. Returns `false` if the field has
    /// already been consumed.
    pub fn read_string_into(&mut self, buf: &mut Vec<u8>) -> Result<bool, ScanError> {
        if self.cursor > self.field_end {
            return Ok(false);
        }
        if self.field_end >= END_OF_GROUP {
            return Err(unknown_format("expected a length-delimited field"));
        }
        // Grow in bounded chunks so a hostile declared length hits the
        // stream's end before exhausting memory.
        let mut remaining = self.field_end - self.cursor;
        while remaining > 0 {
            let chunk = remaining.min(16 * 1024) as usize;
            let old_len = buf.len();
            buf.resize(old_len + chunk, 0);
            self.read_binary(&mut buf[old_len..])?;
            remaining -= chunk as u64;
        }
        self.field_end = REACHED_END;
        Ok(true)
    }

    fn read_binary(&mut self, dst: &mut [u8]) -> Result<(), ScanError> {
        self.source.read_strict(dst)?;
        self.cursor += dst.len() as u64;
        Ok(())
    }

    fn ignore(&mut self, num_bytes: u64) -> Result<(), ScanError> {
        self.source.ignore(num_bytes)?;
        self.cursor += num_bytes;
        Ok(())
    }

    fn move_cursor_backward(&mut self, num_bytes: u64) -> Result<(), ScanError> {
        if self.source.offset() < num_bytes {
            return Err(unknown_format("cannot rewind past the start of the buffer"));
        }
        self.source.rewind(num_bytes);
        self.cursor -= num_bytes;
        Ok(())
    }

    /// End position of a field `length` bytes past the cursor, kept
    /// strictly below the sentinel range.
    fn field_position(&self, length: u64) -> Result<u64, ScanError> {
        self.cursor
            .checked_add(length)
            .filter(|end| *end < END_OF_GROUP)
            .ok_or(unknown_format("declared field length is too large"))
    }

    /// Decode a base-128 varint of 1-10 bytes. The 10th byte, when present,
    /// must be exactly 0x01 (only the top value bit set).
    fn read_varint(&mut self) -> Result<u64, ScanError> {
        let mut result = 0u64;
        let mut byte = [0u8; 1];
        for i in 0..10u64 {
            self.source.read_strict(&mut byte)?;
            let b = byte[0];
            if i == 9 {
                if b != 1 {
                    return Err(unknown_format("malformed varint"));
                }
                self.cursor += 10;
                return Ok(result | 1 << 63);
            }
            result |= u64::from(b & 0x7F) << (7 * i);
            if b & 0x80 == 0 {
                self.cursor += i + 1;
                return Ok(result);
            }
        }
        unreachable!("varint loop returns within 10 bytes")
    }

    fn ignore_varint(&mut self) -> Result<(), ScanError> {
        let mut byte = [0u8; 1];
        for i in 0..10u64 {
            self.source.read_strict(&mut byte)?;
            let b = byte[0];
            if i == 9 {
                if b != 1 {
                    return Err(unknown_format("malformed varint"));
                }
                self.cursor += 10;
                return Ok(());
            }
            if b & 0x80 == 0 {
                self.cursor += i + 1;
                return Ok(());
            }
        }
        unreachable!("varint loop returns within 10 bytes")
    }

    /// Skip to the end tag of the current group, tolerating nested groups.
    fn ignore_group(&mut self) -> Result<(), ScanError> {
        let mut level = 1usize;
        while level > 0 {
            let key = self.read_varint()?;
            match WireType::from_key(key)? {
                WireType::Varint => self.ignore_varint()?,
                WireType::Bits64 => self.ignore(8)?,
                WireType::LengthDelimited => {
                    let length = self.read_varint()?;
                    self.ignore(length)?;
                }
                WireType::GroupStart => level += 1,
                WireType::GroupEnd => level -= 1,
                WireType::Bits32 => self.ignore(4)?,
            }
        }
        Ok(())
    }
}
