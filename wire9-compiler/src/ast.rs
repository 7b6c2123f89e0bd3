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

use codespan_reporting::diagnostic;
use codespan_reporting::files;
#[cfg(feature = "serde")]
use serde::Serialize;
use std::fmt;

/// File identifier.
/// References a directive in the source database.
pub type FileId = usize;

/// Source database.
/// Stores the text of every parsed directive for reference.
pub type SourceDatabase = files::SimpleFiles<String, String>;

/// Name given to records declared without a name.
pub const ANONYMOUS_RECORD: &str = "_";

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SourceLocation {
    /// Byte offset into the directive (counted from zero).
    pub offset: usize,
    /// Line number (counted from zero).
    pub line: usize,
    /// Column number (counted from zero)
    pub column: usize,
}

#[derive(Default, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct SourceRange {
    pub file: FileId,
    pub start: SourceLocation,
    pub end: SourceLocation,
}

#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Endianness {
    #[default]
    LittleEndian,
    BigEndian,
}

/// Builtin integer types.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ScalarKind {
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub enum BinaryOp {
    #[cfg_attr(feature = "serde", serde(rename = "+"))]
    Add,
    #[cfg_attr(feature = "serde", serde(rename = "-"))]
    Sub,
    #[cfg_attr(feature = "serde", serde(rename = "*"))]
    Mul,
    #[cfg_attr(feature = "serde", serde(rename = "/"))]
    Div,
    #[cfg_attr(feature = "serde", serde(rename = "%"))]
    Rem,
}

/// Width of a field: byte length of byte runs, element count of
/// slices.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum WidthExpr {
    Literal { value: usize },
    FieldRef { id: String },
    BinaryOp { op: BinaryOp, lhs: Box<WidthExpr>, rhs: Box<WidthExpr> },
}

/// Type of a field as written in the directive.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TypeExpr {
    /// Builtin or record type path, e.g. `uint16`, `Ex2A` or
    /// `image.Point`. Path segments are stored separately.
    Named { path: Vec<String> },
    /// `[]T`
    Slice { element: Box<TypeExpr> },
    /// `[N]T`
    Array { len: usize, element: Box<TypeExpr> },
    /// `*T`
    Pointer { target: Box<TypeExpr> },
    /// `"text"`
    Literal { value: String },
}

/// Field as written in the directive.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FieldSyntax {
    pub loc: SourceRange,
    pub id: String,
    pub width: Option<WidthExpr>,
    pub type_expr: Option<TypeExpr>,
    pub endianness: Endianness,
}

/// Directive as written in the host source.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct Directive {
    pub loc: SourceRange,
    pub id: String,
    pub fields: Vec<FieldSyntax>,
}

/// Resolved field type.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(tag = "kind", rename_all = "snake_case"))]
pub enum TypeRef {
    Scalar { scalar: ScalarKind },
    FixedByteArray { len: usize },
    ByteSlice,
    SliceOf { element: Box<TypeRef> },
    /// Record declared by a directive, or external self-decoding type.
    /// The path is stored with Rust separators.
    NestedRecord { path: String },
    Boxed { target: Box<TypeRef> },
    /// Constant field: the value is checked on decode and written on
    /// encode, nothing is stored.
    Constant { value: String },
}

/// Kind of a field width.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum WidthKind {
    /// Known at compile time.
    Literal,
    /// Computed from fields decoded earlier.
    Dynamic,
    /// Self-decoding type without a width.
    Unresolved,
}

/// Per field metadata, recorded before the next field is resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FieldMeta {
    pub width: Option<WidthExpr>,
    pub endianness: Endianness,
    pub width_kind: WidthKind,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct FieldDecl {
    pub loc: SourceRange,
    pub id: String,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize))]
pub struct RecordDecl {
    pub loc: SourceRange,
    pub id: String,
    pub fields: Vec<FieldDecl>,
}

impl SourceLocation {
    /// Construct a new source location.
    ///
    /// The `line_starts` indicates the byte offsets where new lines
    /// start in the directive. The first element should thus be `0`.
    pub fn new(offset: usize, line_starts: &[usize]) -> SourceLocation {
        let mut loc = SourceLocation { offset, line: 0, column: offset };
        for (line, start) in line_starts.iter().enumerate() {
            if *start > offset {
                break;
            }
            loc = SourceLocation { offset, line, column: offset - start };
        }
        loc
    }
}

impl SourceRange {
    pub fn primary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::primary(self.file, self.start.offset..self.end.offset)
    }
    pub fn secondary(&self) -> diagnostic::Label<FileId> {
        diagnostic::Label::secondary(self.file, self.start.offset..self.end.offset)
    }
}

impl fmt::Display for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start.line == self.end.line {
            write!(f, "{}:{}-{}", self.start.line, self.start.column, self.end.column)
        } else {
            write!(
                f,
                "{}:{}-{}:{}",
                self.start.line, self.start.column, self.end.line, self.end.column
            )
        }
    }
}

impl fmt::Debug for SourceRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRange").finish_non_exhaustive()
    }
}

impl fmt::Display for Endianness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endianness::LittleEndian => write!(f, "LE"),
            Endianness::BigEndian => write!(f, "BE"),
        }
    }
}

impl ScalarKind {
    /// Look up a builtin type by name. Both the short Rust names and
    /// the long names (`uint16`, `int64`, ..) are accepted.
    pub fn from_name(name: &str) -> Option<ScalarKind> {
        Some(match name {
            "byte" | "uint8" | "u8" => ScalarKind::U8,
            "uint16" | "u16" => ScalarKind::U16,
            "uint32" | "u32" => ScalarKind::U32,
            "uint64" | "u64" => ScalarKind::U64,
            "int8" | "i8" => ScalarKind::I8,
            "int16" | "i16" => ScalarKind::I16,
            "int32" | "i32" => ScalarKind::I32,
            "int64" | "i64" => ScalarKind::I64,
            _ => return None,
        })
    }

    /// Unsigned scalar with the selected byte width.
    pub fn unsigned(width: usize) -> Option<ScalarKind> {
        match width {
            1 => Some(ScalarKind::U8),
            2 => Some(ScalarKind::U16),
            4 => Some(ScalarKind::U32),
            8 => Some(ScalarKind::U64),
            _ => None,
        }
    }

    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        match self {
            ScalarKind::U8 | ScalarKind::I8 => 1,
            ScalarKind::U16 | ScalarKind::I16 => 2,
            ScalarKind::U32 | ScalarKind::I32 => 4,
            ScalarKind::U64 | ScalarKind::I64 => 8,
        }
    }

    pub fn is_signed(&self) -> bool {
        matches!(self, ScalarKind::I8 | ScalarKind::I16 | ScalarKind::I32 | ScalarKind::I64)
    }

    /// Name of the matching Rust primitive type.
    pub fn rust_name(&self) -> &'static str {
        match self {
            ScalarKind::U8 => "u8",
            ScalarKind::U16 => "u16",
            ScalarKind::U32 => "u32",
            ScalarKind::U64 => "u64",
            ScalarKind::I8 => "i8",
            ScalarKind::I16 => "i16",
            ScalarKind::I32 => "i32",
            ScalarKind::I64 => "i64",
        }
    }
}

impl fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Rem => "%",
        })
    }
}

impl BinaryOp {
    fn apply(&self, lhs: usize, rhs: usize) -> Option<usize> {
        match self {
            BinaryOp::Add => lhs.checked_add(rhs),
            BinaryOp::Sub => lhs.checked_sub(rhs),
            BinaryOp::Mul => lhs.checked_mul(rhs),
            BinaryOp::Div => lhs.checked_div(rhs),
            BinaryOp::Rem => lhs.checked_rem(rhs),
        }
    }
}

impl WidthExpr {
    /// Iterate over the field identifiers referenced by the
    /// expression, left to right.
    pub fn field_refs(&self) -> Vec<&str> {
        match self {
            WidthExpr::Literal { .. } => vec![],
            WidthExpr::FieldRef { id } => vec![id.as_str()],
            WidthExpr::BinaryOp { lhs, rhs, .. } => {
                let mut refs = lhs.field_refs();
                refs.extend(rhs.field_refs());
                refs
            }
        }
    }

    /// Evaluate the expression if it only combines literals.
    /// Returns `None` for field references and arithmetic faults.
    pub fn fold(&self) -> Option<usize> {
        match self {
            WidthExpr::Literal { value } => Some(*value),
            WidthExpr::FieldRef { .. } => None,
            WidthExpr::BinaryOp { op, lhs, rhs } => op.apply(lhs.fold()?, rhs.fold()?),
        }
    }
}

impl fmt::Display for WidthExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WidthExpr::Literal { value } => write!(f, "{value}"),
            WidthExpr::FieldRef { id } => write!(f, "{id}"),
            WidthExpr::BinaryOp { op, lhs, rhs } => write!(f, "({lhs}{op}{rhs})"),
        }
    }
}

impl fmt::Display for TypeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeExpr::Named { path } => write!(f, "{}", path.join(".")),
            TypeExpr::Slice { element } => write!(f, "[]{element}"),
            TypeExpr::Array { len, element } => write!(f, "[{len}]{element}"),
            TypeExpr::Pointer { target } => write!(f, "*{target}"),
            TypeExpr::Literal { value } => write!(f, "{value:?}"),
        }
    }
}

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeRef::Scalar { scalar } => write!(f, "{}", scalar.rust_name()),
            TypeRef::FixedByteArray { len } => write!(f, "[u8; {len}]"),
            TypeRef::ByteSlice => write!(f, "Vec<u8>"),
            TypeRef::SliceOf { element } => write!(f, "Vec<{element}>"),
            TypeRef::NestedRecord { path } => write!(f, "{path}"),
            TypeRef::Boxed { target } => write!(f, "Box<{target}>"),
            TypeRef::Constant { value } => write!(f, "{value:?}"),
        }
    }
}

impl TypeRef {
    /// Return true if the field is stored in the generated struct.
    pub fn is_stored(&self) -> bool {
        !matches!(self, TypeRef::Constant { .. })
    }
}

impl Directive {
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_RECORD
    }
}

impl RecordDecl {
    pub fn is_anonymous(&self) -> bool {
        self.id == ANONYMOUS_RECORD
    }

    pub fn field(&self, id: &str) -> Option<&FieldDecl> {
        self.fields.iter().find(|field| field.id == id)
    }
}
