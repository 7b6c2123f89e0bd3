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

use codespan_reporting::diagnostic::Diagnostic;
use codespan_reporting::files;
use codespan_reporting::term;
use codespan_reporting::term::termcolor;
use std::collections::HashMap;
use std::fmt;

use crate::ast::*;

/// List of unique errors reported as compiler diagnostics.
#[repr(u16)]
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ErrorCode {
    SyntaxError = 1,
    EmptyWidthAndType = 2,
    InvalidEndianness = 3,
    MissingTerminator = 4,
    DuplicateRecordIdentifier = 5,
    DuplicateFieldIdentifier = 6,
    UndeclaredWidthIdentifier = 10,
    ForwardWidthReference = 11,
    InvalidWidthIdentifier = 12,
    WidthMismatch = 13,
    MissingSliceWidth = 14,
    InvalidDynamicWidth = 15,
    InvalidWidthExpression = 16,
    RecursiveRecord = 17,
    InvalidElementType = 18,
    InvalidPointerType = 19,
    MissingFieldMetadata = 20,
    SealedRecord = 21,
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "E{}", *self as u16)
    }
}

impl From<ErrorCode> for String {
    fn from(code: ErrorCode) -> Self {
        format!("{}", code)
    }
}

/// Aggregate compiler diagnostics.
#[derive(Debug, Default)]
pub struct Diagnostics {
    pub diagnostics: Vec<Diagnostic<FileId>>,
}

impl Diagnostics {
    pub fn is_empty(&self) -> bool {
        self.diagnostics.is_empty()
    }

    pub fn push(&mut self, diagnostic: Diagnostic<FileId>) {
        self.diagnostics.push(diagnostic)
    }

    fn err_or<T>(self, value: T) -> Result<T, Diagnostics> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }

    pub fn emit(
        &self,
        sources: &SourceDatabase,
        writer: &mut dyn termcolor::WriteColor,
    ) -> Result<(), files::Error> {
        let config = term::Config::default();
        for d in self.diagnostics.iter() {
            term::emit(writer, &config, sources, d)?;
        }
        Ok(())
    }
}

impl From<Diagnostic<FileId>> for Diagnostics {
    fn from(diagnostic: Diagnostic<FileId>) -> Self {
        Diagnostics { diagnostics: vec![diagnostic] }
    }
}

/// Emission shape of a field.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FieldKind {
    /// Fixed width integer transfer.
    Scalar(ScalarKind),
    /// Run of raw bytes with a fixed or dynamic length.
    ByteRun,
    /// Sequence of elements, each transferred with the element rules.
    Slice,
    /// Self-decoding type, invoked directly.
    Nested,
    /// Checked and written, never stored.
    Constant,
}

/// Select the emission shape of a resolved field type.
pub fn classify(ty: &TypeRef) -> FieldKind {
    match ty {
        TypeRef::Scalar { scalar } => FieldKind::Scalar(*scalar),
        TypeRef::FixedByteArray { .. } | TypeRef::ByteSlice => FieldKind::ByteRun,
        TypeRef::SliceOf { .. } => FieldKind::Slice,
        TypeRef::NestedRecord { .. } | TypeRef::Boxed { .. } => FieldKind::Nested,
        TypeRef::Constant { .. } => FieldKind::Constant,
    }
}

/// Type implied by a literal width when the type is elided.
/// Only plain literals of 1, 2, 4 or 8 bytes select a scalar;
/// other widths, and constant expressions, select a byte array.
pub fn infer_type(width: &WidthExpr, len: usize) -> TypeRef {
    match (width, ScalarKind::unsigned(len)) {
        (WidthExpr::Literal { .. }, Some(scalar)) => TypeRef::Scalar { scalar },
        _ => TypeRef::FixedByteArray { len },
    }
}

/// Return the builtin scalar named by a type path.
fn builtin_scalar(path: &[String]) -> Option<ScalarKind> {
    match path {
        [name] => ScalarKind::from_name(name),
        _ => None,
    }
}

#[derive(Debug)]
struct RecordEntry {
    loc: SourceRange,
    fields: Vec<FieldDecl>,
    meta: HashMap<String, FieldMeta>,
    sealed: bool,
    width: Option<usize>,
}

/// Field metadata table for one compilation run.
///
/// Entries are keyed by record and field identifier. The fields of a
/// record are recorded in wire order while its directive is analyzed;
/// the record is read-only once sealed.
#[derive(Debug, Default)]
pub struct Registry {
    records: HashMap<String, RecordEntry>,
}

impl Registry {
    pub fn new() -> Registry {
        Default::default()
    }

    /// Start recording the fields of a record.
    /// Anonymous records replace the previous anonymous record.
    pub fn open(&mut self, id: &str, loc: SourceRange) -> Result<(), Diagnostic<FileId>> {
        if id != ANONYMOUS_RECORD {
            if let Some(prev) = self.records.get(id) {
                return Err(Diagnostic::error()
                    .with_code(ErrorCode::DuplicateRecordIdentifier)
                    .with_message(format!("redeclaration of record identifier `{}`", id))
                    .with_labels(vec![
                        loc.primary(),
                        prev.loc.secondary().with_message(format!("`{id}` is first declared here")),
                    ]));
            }
        }
        self.records.insert(
            id.to_owned(),
            RecordEntry { loc, fields: vec![], meta: HashMap::new(), sealed: false, width: None },
        );
        Ok(())
    }

    /// Record a resolved field and its metadata.
    pub fn put(
        &mut self,
        record: &str,
        field: FieldDecl,
        meta: FieldMeta,
    ) -> Result<(), Diagnostic<FileId>> {
        let Some(entry) = self.records.get_mut(record) else {
            return Err(Diagnostic::error()
                .with_code(ErrorCode::MissingFieldMetadata)
                .with_message(format!("record `{record}` was not opened"))
                .with_labels(vec![field.loc.primary()]));
        };
        if entry.sealed {
            return Err(Diagnostic::error()
                .with_code(ErrorCode::SealedRecord)
                .with_message(format!("record `{record}` is already complete"))
                .with_labels(vec![field.loc.primary()]));
        }
        if let Some(prev) = entry.fields.iter().find(|f| f.id == field.id) {
            return Err(Diagnostic::error()
                .with_code(ErrorCode::DuplicateFieldIdentifier)
                .with_message(format!(
                    "redeclaration of field identifier `{}` in record `{}`",
                    field.id, record
                ))
                .with_labels(vec![
                    field.loc.primary(),
                    prev.loc
                        .secondary()
                        .with_message(format!("`{}` is first declared here", prev.id)),
                ]));
        }
        entry.meta.insert(field.id.clone(), meta);
        entry.fields.push(field);
        Ok(())
    }

    /// Look up the metadata of a field.
    pub fn get(&self, record: &str, field: &str) -> Result<&FieldMeta, Diagnostic<FileId>> {
        self.records.get(record).and_then(|entry| entry.meta.get(field)).ok_or_else(|| {
            Diagnostic::error()
                .with_code(ErrorCode::MissingFieldMetadata)
                .with_message(format!("no metadata recorded for field `{record}.{field}`"))
        })
    }

    /// Return the fields of a record, in wire order.
    pub fn record_shape(&self, record: &str) -> Option<&[FieldDecl]> {
        self.records.get(record).map(|entry| entry.fields.as_slice())
    }

    pub fn contains(&self, record: &str) -> bool {
        self.records.contains_key(record)
    }

    /// Return the encoded width of a record, if all its fields have a
    /// fixed width.
    pub fn record_width(&self, record: &str) -> Option<usize> {
        self.records.get(record).and_then(|entry| entry.width)
    }

    /// Complete a record. The record width is computed once here.
    pub fn seal(&mut self, record: &str) -> Option<RecordDecl> {
        let width = {
            let entry = self.records.get(record)?;
            entry
                .fields
                .iter()
                .map(|field| self.field_width(field, entry.meta.get(&field.id)?))
                .sum::<Option<usize>>()
        };
        let entry = self.records.get_mut(record)?;
        entry.sealed = true;
        entry.width = width;
        Some(RecordDecl { loc: entry.loc, id: record.to_owned(), fields: entry.fields.clone() })
    }

    /// Encoded width of one element of a slice.
    fn element_width(&self, ty: &TypeRef) -> Option<usize> {
        match ty {
            TypeRef::Scalar { scalar } => Some(scalar.width()),
            TypeRef::FixedByteArray { len } => Some(*len),
            TypeRef::NestedRecord { path } => self.record_width(path),
            _ => None,
        }
    }

    fn field_width(&self, field: &FieldDecl, meta: &FieldMeta) -> Option<usize> {
        let len = match (meta.width_kind, &meta.width) {
            (WidthKind::Literal, Some(width)) => width.fold()?,
            _ => return None,
        };
        match &field.ty {
            TypeRef::SliceOf { element } => self.element_width(element)?.checked_mul(len),
            _ => Some(len),
        }
    }
}

/// State of the record under analysis.
struct RecordContext<'d> {
    directive: &'d Directive,
    resolved: Vec<FieldDecl>,
}

fn error(code: ErrorCode, field: &FieldSyntax, message: String) -> Diagnostic<FileId> {
    Diagnostic::error()
        .with_code(code)
        .with_message(message)
        .with_labels(vec![field.loc.primary()])
}

impl<'d> RecordContext<'d> {
    fn record(&self) -> &str {
        &self.directive.id
    }

    /// Check that the width only references earlier integer fields.
    fn check_width_refs(
        &self,
        field: &FieldSyntax,
        width: &WidthExpr,
    ) -> Result<(), Diagnostic<FileId>> {
        for id in width.field_refs() {
            match self.resolved.iter().find(|f| f.id == id) {
                Some(FieldDecl { ty: TypeRef::Scalar { .. }, .. }) => (),
                Some(prev) => {
                    return Err(error(
                        ErrorCode::InvalidWidthIdentifier,
                        field,
                        format!(
                            "width of `{}` references `{}` which is not an integer",
                            field.id, id
                        ),
                    )
                    .with_labels(vec![prev.loc.secondary().with_message(format!(
                        "`{id}` is declared here with type {}",
                        prev.ty
                    ))]))
                }
                None if self.directive.fields.iter().any(|f| f.id == id) => {
                    return Err(error(
                        ErrorCode::ForwardWidthReference,
                        field,
                        format!(
                            "width of `{}` references `{}` which is not declared before it",
                            field.id, id
                        ),
                    ))
                }
                None => {
                    return Err(error(
                        ErrorCode::UndeclaredWidthIdentifier,
                        field,
                        format!("undeclared width identifier `{}` in field `{}`", id, field.id),
                    ))
                }
            }
        }
        Ok(())
    }

    /// Resolve a named non builtin type to a nested record.
    fn resolve_record_path(
        &self,
        field: &FieldSyntax,
        path: &[String],
    ) -> Result<String, Diagnostic<FileId>> {
        if let [name] = path {
            if name == self.record() {
                return Err(error(
                    ErrorCode::RecursiveRecord,
                    field,
                    format!("record `{}` cannot contain itself", name),
                ));
            }
        }
        Ok(path.join("::"))
    }

    /// Resolve the element type of a slice or array.
    fn resolve_element(
        &self,
        field: &FieldSyntax,
        element: &TypeExpr,
    ) -> Result<TypeRef, Diagnostic<FileId>> {
        match element {
            TypeExpr::Named { path } => Ok(match builtin_scalar(path) {
                Some(scalar) => TypeRef::Scalar { scalar },
                // A sequence of the record itself is finite.
                None => TypeRef::NestedRecord { path: path.join("::") },
            }),
            TypeExpr::Array { len, element } if is_byte(element) => {
                Ok(TypeRef::FixedByteArray { len: *len })
            }
            _ => Err(error(
                ErrorCode::InvalidElementType,
                field,
                format!("invalid element type `{}` for field `{}`", element, field.id),
            )),
        }
    }

    /// Resolve the width and type of one field.
    fn resolve_field(
        &self,
        field: &FieldSyntax,
        registry: &Registry,
    ) -> Result<(TypeRef, FieldMeta), Diagnostic<FileId>> {
        let endianness = field.endianness;
        let meta = |width: Option<WidthExpr>, width_kind: WidthKind| FieldMeta {
            width,
            endianness,
            width_kind,
        };
        let literal =
            |len: usize| meta(Some(WidthExpr::Literal { value: len }), WidthKind::Literal);

        let width = field.width.as_ref();
        if let Some(width) = width {
            self.check_width_refs(field, width)?;
        }
        let dynamic = width.filter(|w| !w.field_refs().is_empty());
        let fixed = match width {
            Some(w) if dynamic.is_none() => Some(w.fold().ok_or_else(|| {
                error(
                    ErrorCode::InvalidWidthExpression,
                    field,
                    format!("width `{}` of field `{}` cannot be evaluated", w, field.id),
                )
            })?),
            _ => None,
        };
        let reject_dynamic = |what: &str| -> Result<(), Diagnostic<FileId>> {
            match dynamic {
                Some(w) => Err(error(
                    ErrorCode::InvalidDynamicWidth,
                    field,
                    format!(
                        "dynamic width `{}` is not allowed for {} field `{}`",
                        w, what, field.id
                    ),
                )),
                None => Ok(()),
            }
        };
        let mismatch = |expected: usize, len: usize| -> Diagnostic<FileId> {
            error(
                ErrorCode::WidthMismatch,
                field,
                format!(
                    "width {} of field `{}` does not match the width {} of its type",
                    len, field.id, expected
                ),
            )
        };

        let Some(type_expr) = &field.type_expr else {
            return match (width, fixed) {
                (Some(w), Some(len)) => Ok((infer_type(w, len), literal(len))),
                (Some(w), None) => {
                    Ok((TypeRef::ByteSlice, meta(Some(w.clone()), WidthKind::Dynamic)))
                }
                (None, _) => Err(error(
                    ErrorCode::EmptyWidthAndType,
                    field,
                    "width and type cannot both be empty".to_owned(),
                )),
            };
        };

        match type_expr {
            TypeExpr::Literal { value } => {
                reject_dynamic("constant")?;
                let len = fixed.unwrap_or(value.len());
                Ok((TypeRef::Constant { value: value.clone() }, literal(len)))
            }
            TypeExpr::Named { path } => match builtin_scalar(path) {
                Some(scalar) => {
                    reject_dynamic("scalar")?;
                    match fixed {
                        Some(len) if len != scalar.width() => Err(mismatch(scalar.width(), len)),
                        _ => Ok((TypeRef::Scalar { scalar }, literal(scalar.width()))),
                    }
                }
                None => {
                    let path = self.resolve_record_path(field, path)?;
                    reject_dynamic("record")?;
                    let ty = TypeRef::NestedRecord { path: path.clone() };
                    self.resolve_nested(ty, &path, fixed, registry, &mismatch, &literal, &meta)
                }
            },
            TypeExpr::Pointer { target } => {
                let TypeExpr::Named { path } = target.as_ref() else {
                    return Err(error(
                        ErrorCode::InvalidPointerType,
                        field,
                        format!(
                            "pointer target `{}` of field `{}` is not a record",
                            target, field.id
                        ),
                    ));
                };
                if builtin_scalar(path).is_some() {
                    return Err(error(
                        ErrorCode::InvalidPointerType,
                        field,
                        format!(
                            "pointer target `{}` of field `{}` is not a record",
                            target, field.id
                        ),
                    ));
                }
                let path = self.resolve_record_path(field, path)?;
                reject_dynamic("pointer")?;
                let target = Box::new(TypeRef::NestedRecord { path: path.clone() });
                let ty = TypeRef::Boxed { target };
                self.resolve_nested(ty, &path, fixed, registry, &mismatch, &literal, &meta)
            }
            TypeExpr::Slice { element } => {
                let element = self.resolve_element(field, element)?;
                let Some(width) = width else {
                    return Err(error(
                        ErrorCode::MissingSliceWidth,
                        field,
                        format!("slice field `{}` requires a width", field.id),
                    ));
                };
                let meta = match fixed {
                    Some(len) => literal(len),
                    None => meta(Some(width.clone()), WidthKind::Dynamic),
                };
                Ok(match (element, fixed) {
                    (TypeRef::Scalar { scalar: ScalarKind::U8 }, Some(len)) => {
                        (TypeRef::FixedByteArray { len }, meta)
                    }
                    (TypeRef::Scalar { scalar: ScalarKind::U8 }, None) => {
                        (TypeRef::ByteSlice, meta)
                    }
                    (element, _) => (TypeRef::SliceOf { element: Box::new(element) }, meta),
                })
            }
            TypeExpr::Array { len, element } => {
                let element = self.resolve_element(field, element)?;
                reject_dynamic("array")?;
                match fixed {
                    Some(width) if width != *len => return Err(mismatch(*len, width)),
                    _ => (),
                }
                Ok(match element {
                    TypeRef::Scalar { scalar: ScalarKind::U8 } => {
                        (TypeRef::FixedByteArray { len: *len }, literal(*len))
                    }
                    element => (TypeRef::SliceOf { element: Box::new(element) }, literal(*len)),
                })
            }
        }
    }

    /// Resolve the width of a record or external type.
    /// Records declared earlier provide their own width; other types
    /// are trusted.
    #[allow(clippy::too_many_arguments)]
    fn resolve_nested(
        &self,
        ty: TypeRef,
        path: &str,
        fixed: Option<usize>,
        registry: &Registry,
        mismatch: &dyn Fn(usize, usize) -> Diagnostic<FileId>,
        literal: &dyn Fn(usize) -> FieldMeta,
        meta: &dyn Fn(Option<WidthExpr>, WidthKind) -> FieldMeta,
    ) -> Result<(TypeRef, FieldMeta), Diagnostic<FileId>> {
        if !registry.contains(path) {
            return Ok(match fixed {
                Some(len) => (ty, literal(len)),
                None => (ty, meta(None, WidthKind::Unresolved)),
            });
        }
        match (fixed, registry.record_width(path)) {
            (Some(len), Some(width)) if len != width => Err(mismatch(width, len)),
            (Some(len), None) => Err(Diagnostic::error()
                .with_code(ErrorCode::WidthMismatch)
                .with_message(format!(
                    "width {} is given for record `{}` which has no fixed width",
                    len, path
                ))),
            (_, Some(width)) => Ok((ty, literal(width))),
            (None, None) => Ok((ty, meta(None, WidthKind::Unresolved))),
        }
    }
}

fn is_byte(ty: &TypeExpr) -> bool {
    matches!(ty, TypeExpr::Named { path } if builtin_scalar(path) == Some(ScalarKind::U8))
}

/// Resolve the fields of a directive and record their metadata.
///
/// Fields are resolved in wire order; the metadata of each field is
/// recorded before the next one is resolved, so that width
/// expressions can refer to earlier fields. The record is sealed on
/// success.
pub fn analyze(directive: &Directive, registry: &mut Registry) -> Result<RecordDecl, Diagnostics> {
    registry.open(&directive.id, directive.loc)?;
    let mut context = RecordContext { directive, resolved: vec![] };
    let mut diagnostics = Diagnostics::default();

    for field in &directive.fields {
        match context.resolve_field(field, registry) {
            Ok((ty, meta)) => {
                let decl = FieldDecl { loc: field.loc, id: field.id.clone(), ty };
                if let Err(diagnostic) = registry.put(&directive.id, decl.clone(), meta) {
                    diagnostics.push(diagnostic);
                    break;
                }
                context.resolved.push(decl);
            }
            Err(diagnostic) => {
                diagnostics.push(diagnostic);
                break;
            }
        }
    }

    let record = registry.seal(&directive.id);
    diagnostics.err_or(())?;
    record.ok_or_else(|| {
        Diagnostics::from(
            Diagnostic::error()
                .with_code(ErrorCode::MissingFieldMetadata)
                .with_message(format!("record `{}` disappeared during analysis", directive.id)),
        )
    })
}

#[cfg(test)]
mod test {
    use crate::analyzer;
    use crate::ast;
    use crate::parser::parse_inline;
    use codespan_reporting::term::termcolor;

    use googletest::prelude::{assert_that, elements_are, eq, none, some};

    /// Analyze the directives in order with a shared registry.
    fn analyze_all(
        db: &mut ast::SourceDatabase,
        registry: &mut analyzer::Registry,
        text: &str,
    ) -> Result<Vec<ast::RecordDecl>, analyzer::Diagnostics> {
        let mut records = vec![];
        for line in text.lines().map(str::trim).filter(|l| !l.is_empty()) {
            let directive = parse_inline(db, "stdin", line.to_owned()).expect("parsing failure");
            records.push(analyzer::analyze(&directive, registry)?);
        }
        Ok(records)
    }

    macro_rules! raises {
        ($code:ident, $text:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let mut registry = analyzer::Registry::new();
            let result = analyze_all(&mut db, &mut registry, $text);
            assert!(matches!(result, Err(_)));
            let diagnostics = result.err().unwrap();
            let mut buffer = termcolor::Buffer::no_color();
            let _ = diagnostics.emit(&db, &mut buffer);
            println!("{}", std::str::from_utf8(buffer.as_slice()).unwrap());
            assert_eq!(diagnostics.diagnostics.len(), 1);
            assert_eq!(diagnostics.diagnostics[0].code, Some(analyzer::ErrorCode::$code.into()));
        }};
    }

    macro_rules! valid {
        ($text:literal) => {{
            let mut db = ast::SourceDatabase::new();
            let mut registry = analyzer::Registry::new();
            assert!(analyze_all(&mut db, &mut registry, $text).is_ok());
        }};
    }

    fn resolve(text: &str) -> (Vec<ast::RecordDecl>, analyzer::Registry) {
        let mut db = ast::SourceDatabase::new();
        let mut registry = analyzer::Registry::new();
        let records = analyze_all(&mut db, &mut registry, text).expect("analysis failure");
        (records, registry)
    }

    fn types(record: &ast::RecordDecl) -> Vec<ast::TypeRef> {
        record.fields.iter().map(|f| f.ty.clone()).collect()
    }

    fn scalar(scalar: ast::ScalarKind) -> ast::TypeRef {
        ast::TypeRef::Scalar { scalar }
    }

    #[test]
    fn test_scalar_classification() {
        let (records, registry) = resolve("Ex1A Time[8] IP[4] Port[2] n[1]");
        assert_that!(
            types(&records[0]),
            elements_are![
                eq(scalar(ast::ScalarKind::U64)),
                eq(scalar(ast::ScalarKind::U32)),
                eq(scalar(ast::ScalarKind::U16)),
                eq(scalar(ast::ScalarKind::U8))
            ]
        );
        for field in &records[0].fields {
            assert_eq!(analyzer::classify(&field.ty), analyzer::FieldKind::Scalar(match &field.ty {
                ast::TypeRef::Scalar { scalar } => *scalar,
                _ => unreachable!(),
            }));
        }
        assert_that!(registry.record_width("Ex1A"), some(eq(15usize)));
    }

    #[test]
    fn test_byte_run_classification() {
        let (records, registry) = resolve("Bstr n[2] data[n] pad[3] clip[4*4] tag[2*1]");
        assert_that!(
            types(&records[0]),
            elements_are![
                eq(scalar(ast::ScalarKind::U16)),
                eq(ast::TypeRef::ByteSlice),
                eq(ast::TypeRef::FixedByteArray { len: 3 }),
                eq(ast::TypeRef::FixedByteArray { len: 16 }),
                eq(ast::TypeRef::FixedByteArray { len: 2 })
            ]
        );
        let meta = registry.get("Bstr", "data").unwrap();
        assert_eq!(meta.width_kind, ast::WidthKind::Dynamic);
        assert_eq!(meta.width, Some(ast::WidthExpr::FieldRef { id: "n".to_owned() }));
        assert_eq!(registry.get("Bstr", "clip").unwrap().width_kind, ast::WidthKind::Literal);
        assert_that!(registry.record_width("Bstr"), none());
    }

    #[test]
    fn test_typed_fields() {
        let (records, registry) = resolve(
            r#"
            Point x[4] y[4]
            Rect min[,Point] max[,Point]
            Ex3A p[,image.Point] size[,int64] reply[8,Point] r[16,Rect]
            Many n[1] pts[n,[]Point] raw[n,[]byte] ids[3,[]uint16] fixed[,[2]uint32] key[,[4]byte]
            "#,
        );
        assert_that!(registry.record_width("Rect"), some(eq(16usize)));
        assert_that!(
            types(&records[2]),
            elements_are![
                eq(ast::TypeRef::NestedRecord { path: "image::Point".to_owned() }),
                eq(scalar(ast::ScalarKind::I64)),
                eq(ast::TypeRef::NestedRecord { path: "Point".to_owned() }),
                eq(ast::TypeRef::NestedRecord { path: "Rect".to_owned() })
            ]
        );
        assert_eq!(registry.get("Ex3A", "p").unwrap().width_kind, ast::WidthKind::Unresolved);
        assert_that!(
            types(&records[3]),
            elements_are![
                eq(scalar(ast::ScalarKind::U8)),
                eq(ast::TypeRef::SliceOf { element: Box::new(ast::TypeRef::NestedRecord {
                    path: "Point".to_owned()
                }) }),
                eq(ast::TypeRef::ByteSlice),
                eq(ast::TypeRef::SliceOf { element: Box::new(scalar(ast::ScalarKind::U16)) }),
                eq(ast::TypeRef::SliceOf { element: Box::new(scalar(ast::ScalarKind::U32)) }),
                eq(ast::TypeRef::FixedByteArray { len: 4 })
            ]
        );
        let meta = registry.get("Many", "fixed").unwrap();
        assert_eq!(meta.width, Some(ast::WidthExpr::Literal { value: 2 }));
    }

    #[test]
    fn test_constant_and_pointer_fields() {
        let (records, registry) = resolve(r#"Node magic[4,"WIRE"] next[,*Leaf] tag[,"ab"]"#);
        assert_that!(
            types(&records[0]),
            elements_are![
                eq(ast::TypeRef::Constant { value: "WIRE".to_owned() }),
                eq(ast::TypeRef::Boxed {
                    target: Box::new(ast::TypeRef::NestedRecord { path: "Leaf".to_owned() })
                }),
                eq(ast::TypeRef::Constant { value: "ab".to_owned() })
            ]
        );
        assert_eq!(
            registry.get("Node", "tag").unwrap().width,
            Some(ast::WidthExpr::Literal { value: 2 })
        );
    }

    #[test]
    fn test_endianness_recorded() {
        let (_, registry) = resolve("Git index[4,,BE] count[4]");
        assert_eq!(registry.get("Git", "index").unwrap().endianness, ast::Endianness::BigEndian);
        assert_eq!(registry.get("Git", "count").unwrap().endianness, ast::Endianness::LittleEndian);
    }

    #[test]
    fn test_registry_lookup() {
        let (_, mut registry) = resolve("A x[1] y[2]");
        let shape: Vec<_> =
            registry.record_shape("A").unwrap().iter().map(|f| f.id.as_str()).collect();
        assert_eq!(shape, vec!["x", "y"]);
        assert_eq!(
            registry.get("A", "z").err().and_then(|d| d.code),
            Some(analyzer::ErrorCode::MissingFieldMetadata.into())
        );
        let field = ast::FieldDecl {
            loc: Default::default(),
            id: "z".to_owned(),
            ty: scalar(ast::ScalarKind::U8),
        };
        let meta = ast::FieldMeta {
            width: None,
            endianness: Default::default(),
            width_kind: ast::WidthKind::Unresolved,
        };
        assert_eq!(
            registry.put("A", field, meta).err().and_then(|d| d.code),
            Some(analyzer::ErrorCode::SealedRecord.into())
        );
    }

    #[test]
    fn test_e5() {
        raises!(
            DuplicateRecordIdentifier,
            r#"
            A x[1]
            A y[2]
            "#
        );
    }

    #[test]
    fn test_e6() {
        raises!(DuplicateFieldIdentifier, "A x[1] x[2]");
        raises!(DuplicateFieldIdentifier, "Bstr n[2] n[n]");
    }

    #[test]
    fn test_e10() {
        raises!(UndeclaredWidthIdentifier, "A data[n]");
        raises!(UndeclaredWidthIdentifier, "A a[1] data[a*b]");
    }

    #[test]
    fn test_e11() {
        raises!(ForwardWidthReference, "A data[n] n[2]");
        raises!(ForwardWidthReference, "A n[n]");
    }

    #[test]
    fn test_e12() {
        raises!(InvalidWidthIdentifier, "A n[3] data[n]");
        raises!(InvalidWidthIdentifier, "A n[,Other] data[n]");
    }

    #[test]
    fn test_e13() {
        raises!(WidthMismatch, "A x[2,uint32]");
        raises!(WidthMismatch, "A x[3,[2]uint32]");
        raises!(
            WidthMismatch,
            r#"
            P x[4] y[4]
            A p[4,P]
            "#
        );
        raises!(
            WidthMismatch,
            r#"
            S n[1] data[n]
            A s[4,S]
            "#
        );
    }

    #[test]
    fn test_e14() {
        raises!(MissingSliceWidth, "A x[,[]byte]");
        raises!(MissingSliceWidth, "A x[,[]Point]");
    }

    #[test]
    fn test_e15() {
        raises!(InvalidDynamicWidth, "A n[1] x[n,uint32]");
        raises!(InvalidDynamicWidth, "A n[1] x[n,Point]");
        raises!(InvalidDynamicWidth, r#"A n[1] x[n,"abc"]"#);
        raises!(InvalidDynamicWidth, "A n[1] x[n,[4]byte]");
    }

    #[test]
    fn test_e16() {
        raises!(InvalidWidthExpression, "A x[4/0]");
        raises!(InvalidWidthExpression, "A x[1-2]");
    }

    #[test]
    fn test_e17() {
        raises!(RecursiveRecord, "A x[,A]");
        raises!(RecursiveRecord, "A x[,*A]");
        valid!("A n[1] children[n,[]A]");
    }

    #[test]
    fn test_e18() {
        raises!(InvalidElementType, "A n[1] x[n,[][]byte]");
        raises!(InvalidElementType, "A n[1] x[n,[]*B]");
        raises!(InvalidElementType, "A x[,[2][3]uint16]");
    }

    #[test]
    fn test_e19() {
        raises!(InvalidPointerType, "A x[,*uint32]");
        raises!(InvalidPointerType, "A x[,*[]byte]");
    }

    #[test]
    fn test_plan9_draw_directives() {
        valid!(
            r#"
            String data[11] z[1]
            DrawNew n[12,[]String]
            Point x[4] y[4]
            Rect min[,Point] max[,Point]
            Drawc dstid[4] repl[1] clipr[4*4]
            Drawd dstid[4] srcid[4] dstr[,Rect] srcp[,Point]
            DrawN id[4] in[1] j[1] name[j]
            Drawr id[16] r[256]
            "#
        );
    }
}
