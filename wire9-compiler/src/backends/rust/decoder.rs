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

use crate::analyzer::{classify, FieldKind};
use crate::ast;
use codespan_reporting::diagnostic::Diagnostic;
use quote::{format_ident, quote};

use super::{field_access, lower_width, missing_width, padded_constant, path_tokens, Generator};

/// Field decoder, emits the statements reading one field of a record
/// from `buf`.
struct FieldDecoder<'a> {
    record: &'a str,
    field: &'a ast::FieldDecl,
    meta: &'a ast::FieldMeta,
}

impl FieldDecoder<'_> {
    fn short_read(&self, expected: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let record = self.record;
        let field = &self.field.id;
        quote! {
            if buf.remaining() < #expected {
                return Err(DecodeError::ShortRead {
                    record: #record,
                    field: #field,
                    actual: buf.remaining(),
                    expected: #expected,
                });
            }
        }
    }

    fn width(&self) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
        match &self.meta.width {
            Some(width) => Ok(lower_width(width)),
            None => Err(missing_width(self.record, self.field)),
        }
    }

    /// Decode a value of type `ty` into the field, or into the current
    /// element of the field when `depth > 0`.
    fn decode(
        &self,
        generator: &Generator,
        ty: &ast::TypeRef,
        depth: usize,
    ) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
        let access = field_access(&self.field.id, depth);
        Ok(match (classify(ty), ty) {
            (FieldKind::Scalar(scalar), _) => {
                let width = proc_macro2::Literal::usize_unsuffixed(scalar.width());
                let suffix = match self.meta.endianness {
                    _ if scalar.width() == 1 => "",
                    ast::Endianness::LittleEndian => "_le",
                    ast::Endianness::BigEndian => "",
                };
                let get = format_ident!("get_{}{}", scalar.rust_name(), suffix);
                let check = self.short_read(quote!(#width));
                quote! {
                    #check
                    #access = buf.#get();
                }
            }
            (FieldKind::ByteRun, ast::TypeRef::FixedByteArray { len }) => {
                let len = proc_macro2::Literal::usize_unsuffixed(*len);
                let check = self.short_read(quote!(#len));
                quote! {
                    #check
                    buf.copy_to_slice(&mut #access);
                }
            }
            (FieldKind::ByteRun, _) => {
                let width = self.width()?;
                let check = self.short_read(quote!(len));
                quote! {
                    let len: usize = #width;
                    #check
                    #access = vec![0; len];
                    buf.copy_to_slice(&mut #access);
                }
            }
            (FieldKind::Slice, ast::TypeRef::SliceOf { element }) => {
                let count = self.width()?;
                // Reject truncated input before decoding the elements.
                let check = generator.element_width(element).map(|width| {
                    let width = proc_macro2::Literal::usize_unsuffixed(width);
                    let check = self.short_read(quote!(expected));
                    quote! {
                        let expected = count.saturating_mul(#width);
                        #check
                    }
                });
                let element_init = match element.as_ref() {
                    ast::TypeRef::FixedByteArray { len } => {
                        let len = proc_macro2::Literal::usize_unsuffixed(*len);
                        quote!([0; #len])
                    }
                    _ => quote!(Default::default()),
                };
                let element = self.decode(generator, element, depth + 1)?;
                // Capacity is bounded by the remaining input.
                quote! {
                    let count: usize = #count;
                    #check
                    #access = Vec::with_capacity(count.min(buf.remaining()));
                    for i in 0..count {
                        #access.push(#element_init);
                        #element
                    }
                }
            }
            (FieldKind::Nested, _) => quote! {
                #access.read_binary(buf)?;
            },
            (FieldKind::Constant, ast::TypeRef::Constant { value }) => {
                let width = match self.meta.width.as_ref().and_then(ast::WidthExpr::fold) {
                    Some(width) => width,
                    None => return Err(missing_width(self.record, self.field)),
                };
                let record = self.record;
                let field = &self.field.id;
                let expected = syn::LitByteStr::new(
                    &padded_constant(value, width),
                    proc_macro2::Span::call_site(),
                );
                let width = proc_macro2::Literal::usize_unsuffixed(width);
                let check = self.short_read(quote!(#width));
                quote! {
                    #check
                    let mut actual = [0u8; #width];
                    buf.copy_to_slice(&mut actual);
                    if actual != *#expected {
                        return Err(DecodeError::ContentMismatch {
                            record: #record,
                            field: #field,
                            expected: #expected.to_vec(),
                            actual: actual.to_vec(),
                        });
                    }
                }
            }
            _ => {
                return Err(Diagnostic::error()
                    .with_message(format!(
                        "cannot decode field `{}.{}` of type {}",
                        self.record, self.field.id, ty
                    ))
                    .with_labels(vec![self.field.loc.primary()]))
            }
        })
    }
}

impl Generator<'_> {
    /// Encoded width of a slice element, when known.
    pub(super) fn element_width(&self, ty: &ast::TypeRef) -> Option<usize> {
        match ty {
            ast::TypeRef::Scalar { scalar } => Some(scalar.width()),
            ast::TypeRef::FixedByteArray { len } => Some(*len),
            ast::TypeRef::NestedRecord { path } => self.compilation.registry.record_width(path),
            _ => None,
        }
    }
}

/// Generate the decode procedure of a record.
///
/// Fields are decoded in declaration order, each in its own scope.
/// The procedure body runs inside the fault boundary.
pub(super) fn generate(
    generator: &mut Generator,
    record: &ast::RecordDecl,
) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
    let name = path_tokens(&record.id);
    let record_id = record.id.as_str();
    let mut fields = vec![];
    for field in &record.fields {
        let meta = generator.compilation.registry.get(&record.id, &field.id)?;
        let decoder = FieldDecoder { record: record_id, field, meta };
        let body = decoder.decode(generator, &field.ty, 0)?;
        fields.push(quote!({ #body }));
    }
    let allow_unused = record.fields.is_empty().then(|| quote!(#[allow(unused_variables)]));

    Ok(quote! {
        impl #name {
            #allow_unused
            pub fn read_binary(&mut self, buf: &mut impl Buf) -> Result<(), DecodeError> {
                wire9_runtime::recover(#record_id, || -> Result<(), DecodeError> {
                    #(#fields)*
                    Ok(())
                })
            }
        }
    })
}
