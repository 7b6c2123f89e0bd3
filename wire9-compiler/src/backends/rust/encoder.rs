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

use super::{field_access, lower_width, missing_width, path_tokens, Generator, Helper};

struct FieldEncoder<'a> {
    record: &'a str,
    field: &'a ast::FieldDecl,
    meta: &'a ast::FieldMeta,
}

impl FieldEncoder<'_> {
    fn short_write(&self, expected: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let record = self.record;
        let field = &self.field.id;
        quote! {
            if buf.remaining_mut() < #expected {
                return Err(EncodeError::ShortWrite {
                    record: #record,
                    field: #field,
                    actual: buf.remaining_mut(),
                    expected: #expected,
                });
            }
        }
    }

    /// Check that the stored sequence holds at least `expected` items.
    fn short_buffer(&self, expected: proc_macro2::TokenStream) -> proc_macro2::TokenStream {
        let record = self.record;
        let field = &self.field.id;
        let access = field_access(field, 0);
        quote! {
            if #access.len() < #expected {
                return Err(EncodeError::ShortBuffer {
                    record: #record,
                    field: #field,
                    actual: #access.len(),
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

    /// Encode the field, or the current element of the field when
    /// `depth > 0`, as a value of type `ty`.
    fn encode(
        &self,
        generator: &mut Generator,
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
                let put = format_ident!("put_{}{}", scalar.rust_name(), suffix);
                let check = self.short_write(quote!(#width));
                quote! {
                    #check
                    buf.#put(#access);
                }
            }
            (FieldKind::ByteRun, ast::TypeRef::FixedByteArray { len }) => {
                let len = proc_macro2::Literal::usize_unsuffixed(*len);
                let check = self.short_write(quote!(#len));
                quote! {
                    #check
                    buf.put_slice(&#access);
                }
            }
            (FieldKind::ByteRun, _) => {
                let width = self.width()?;
                let stored = self.short_buffer(quote!(len));
                let check = self.short_write(quote!(len));
                quote! {
                    let len: usize = #width;
                    #stored
                    #check
                    buf.put_slice(&#access[..len]);
                }
            }
            (FieldKind::Slice, ast::TypeRef::SliceOf { element }) => {
                let count = self.width()?;
                let stored = self.short_buffer(quote!(count));
                let element = self.encode(generator, element, depth + 1)?;
                quote! {
                    let count: usize = #count;
                    #stored
                    for i in 0..count {
                        #element
                    }
                }
            }
            (FieldKind::Nested, _) => quote! {
                #access.write_binary(buf)?;
            },
            (FieldKind::Constant, ast::TypeRef::Constant { value }) => {
                let width = match self.meta.width.as_ref().and_then(ast::WidthExpr::fold) {
                    Some(width) => width,
                    None => return Err(missing_width(self.record, self.field)),
                };
                generator.helpers.insert(Helper::WritePadded);
                let value = syn::LitByteStr::new(value.as_bytes(), proc_macro2::Span::call_site());
                let width = proc_macro2::Literal::usize_unsuffixed(width);
                let check = self.short_write(quote!(#width));
                quote! {
                    #check
                    write_padded(buf, #value, #width);
                }
            }
            _ => {
                return Err(Diagnostic::error()
                    .with_message(format!(
                        "cannot encode field `{}.{}` of type {}",
                        self.record, self.field.id, ty
                    ))
                    .with_labels(vec![self.field.loc.primary()]))
            }
        })
    }
}

/// Generate the encode procedure of a record.
pub(super) fn generate(
    generator: &mut Generator,
    record: &ast::RecordDecl,
) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
    let compilation = generator.compilation;
    let name = path_tokens(&record.id);
    let record_id = record.id.as_str();
    let mut fields = vec![];
    for field in &record.fields {
        let meta = compilation.registry.get(&record.id, &field.id)?;
        let encoder = FieldEncoder { record: record_id, field, meta };
        let body = encoder.encode(generator, &field.ty, 0)?;
        fields.push(quote!({ #body }));
    }
    let allow_unused = record.fields.is_empty().then(|| quote!(#[allow(unused_variables)]));

    Ok(quote! {
        impl #name {
            #allow_unused
            pub fn write_binary(&self, buf: &mut impl BufMut) -> Result<(), EncodeError> {
                wire9_runtime::recover(#record_id, || -> Result<(), EncodeError> {
                    #(#fields)*
                    Ok(())
                })
            }
        }
    })
}
