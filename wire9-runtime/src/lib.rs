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

//! Helper definitions used by the records generated by the wire9
//! compiler.

use bytes::{Buf, BufMut};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};

mod varint;

pub use varint::{Varint, MAX_VARINT_LEN};

/// Runtime fault caught at the boundary of a generated procedure.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
#[error("{record}: recovered from fault: {message}")]
pub struct Fault {
    pub record: &'static str,
    pub message: String,
}

/// Type of decoding errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("{record}.{field}: short read: {actual}/{expected}")]
    ShortRead { record: &'static str, field: &'static str, actual: usize, expected: usize },
    #[error("{record}.{field}: content mismatch: got {actual:02x?}, expected {expected:02x?}")]
    ContentMismatch {
        record: &'static str,
        field: &'static str,
        expected: Vec<u8>,
        actual: Vec<u8>,
    },
    #[error("{record}: decode into absent receiver")]
    NilReceiver { record: &'static str },
    #[error("{record}.{field}: varint overflows a 64-bit integer")]
    Overflow { record: &'static str, field: &'static str },
    #[error(transparent)]
    Fault(#[from] Fault),
}

/// Type of encoding errors.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("{record}.{field}: short write: {actual}/{expected}")]
    ShortWrite { record: &'static str, field: &'static str, actual: usize, expected: usize },
    #[error("{record}.{field}: stored data holds {actual} bytes or elements, {expected} required")]
    ShortBuffer { record: &'static str, field: &'static str, actual: usize, expected: usize },
    #[error(transparent)]
    Fault(#[from] Fault),
}

impl Fault {
    fn from_panic(record: &'static str, payload: Box<dyn Any + Send>) -> Fault {
        let message = if let Some(message) = payload.downcast_ref::<&str>() {
            message.to_string()
        } else if let Some(message) = payload.downcast_ref::<String>() {
            message.clone()
        } else {
            String::from("unknown panic")
        };
        Fault { record, message }
    }
}

/// Run the body of a generated procedure, converting any panic raised
/// while it executes into the procedure's error type.
///
/// The closure may be left in an inconsistent state by the panic: the
/// receiver of a failed decode must be considered garbage.
pub fn recover<T, E, F>(record: &'static str, body: F) -> Result<T, E>
where
    E: From<Fault>,
    F: FnOnce() -> Result<T, E>,
{
    match panic::catch_unwind(AssertUnwindSafe(body)) {
        Ok(result) => result,
        Err(payload) => Err(Fault::from_panic(record, payload).into()),
    }
}

/// Trait implemented for all generated records, and for the
/// self-decoding types that can be embedded in them.
pub trait Wire {
    /// Decode the fields of `self` from the buffer, in wire order.
    /// The buffer is advanced past the consumed bytes, also on failure.
    fn read_binary<B: Buf>(&mut self, buf: &mut B) -> Result<(), DecodeError>;

    /// Encode the fields of `self` to the buffer, in wire order.
    fn write_binary<B: BufMut>(&self, buf: &mut B) -> Result<(), EncodeError>;

    /// Decode into an optional receiver.
    /// An absent receiver is rejected before any byte is consumed.
    fn decode_into<B: Buf>(target: Option<&mut Self>, buf: &mut B) -> Result<(), DecodeError>
    where
        Self: Sized,
    {
        match target {
            Some(target) => target.read_binary(buf),
            None => Err(DecodeError::NilReceiver { record: std::any::type_name::<Self>() }),
        }
    }

    /// Decode a fresh instance of `Self` from the buffer.
    fn decode<B: Buf>(buf: &mut B) -> Result<Self, DecodeError>
    where
        Self: Default + Sized,
    {
        let mut value = Self::default();
        value.read_binary(buf)?;
        Ok(value)
    }

    /// Encode the value to a byte vector.
    fn encode_to_vec(&self) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::new();
        self.write_binary(&mut buf)?;
        Ok(buf)
    }
}
