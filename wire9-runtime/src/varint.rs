// Copyright 2023 Google LLC
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     https://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use crate::{DecodeError, EncodeError, Wire};
use bytes::{Buf, BufMut};

/// Maximum encoded length of a 64-bit varint.
pub const MAX_VARINT_LEN: usize = 10;

/// Unsigned variable length integer, encoded in groups of 7 bits,
/// least significant group first.
///
/// `Varint` has no fixed width: use it as a field type without a
/// width, e.g. `v[,wire9_runtime.Varint]`. Signed values and zig-zag
/// encoding are not supported.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Varint(pub u64);

impl From<u64> for Varint {
    fn from(value: u64) -> Self {
        Varint(value)
    }
}

impl From<Varint> for u64 {
    fn from(value: Varint) -> Self {
        value.0
    }
}

impl Varint {
    /// Number of bytes taken by the encoded value.
    pub fn encoded_len(&self) -> usize {
        let bits = 64 - self.0.leading_zeros() as usize;
        std::cmp::max(1, (bits + 6) / 7)
    }
}

impl Wire for Varint {
    /// Reads exactly the bytes of the varint, never beyond.
    fn read_binary<B: Buf>(&mut self, buf: &mut B) -> Result<(), DecodeError> {
        let mut value: u64 = 0;
        for n in 0..MAX_VARINT_LEN {
            if !buf.has_remaining() {
                return Err(DecodeError::ShortRead {
                    record: "Varint",
                    field: "value",
                    actual: n,
                    expected: n + 1,
                });
            }
            let byte = buf.get_u8();
            let group = (byte & 0x7f) as u64;
            // The tenth group only has room for the most significant bit.
            if n == MAX_VARINT_LEN - 1 && group > 1 {
                return Err(DecodeError::Overflow { record: "Varint", field: "value" });
            }
            value |= group << (7 * n);
            if byte & 0x80 == 0 {
                self.0 = value;
                return Ok(());
            }
        }
        Err(DecodeError::Overflow { record: "Varint", field: "value" })
    }

    fn write_binary<B: BufMut>(&self, buf: &mut B) -> Result<(), EncodeError> {
        let len = self.encoded_len();
        if buf.remaining_mut() < len {
            return Err(EncodeError::ShortWrite {
                record: "Varint",
                field: "value",
                actual: buf.remaining_mut(),
                expected: len,
            });
        }
        let mut value = self.0;
        loop {
            let byte = (value & 0x7f) as u8;
            value >>= 7;
            if value == 0 {
                buf.put_u8(byte);
                return Ok(());
            }
            buf.put_u8(byte | 0x80);
        }
    }
}
