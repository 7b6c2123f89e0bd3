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

use crate::ast;
use codespan_reporting::diagnostic::Diagnostic;
use quote::{format_ident, quote};

use super::{path_tokens, ToIdent};

/// Rust type of a stored field.
pub(super) fn rust_type(ty: &ast::TypeRef) -> proc_macro2::TokenStream {
    match ty {
        ast::TypeRef::Scalar { scalar } => {
            let id = format_ident!("{}", scalar.rust_name());
            quote!(#id)
        }
        ast::TypeRef::FixedByteArray { len } => {
            let len = proc_macro2::Literal::usize_unsuffixed(*len);
            quote!([u8; #len])
        }
        ast::TypeRef::ByteSlice => quote!(Vec<u8>),
        ast::TypeRef::SliceOf { element } => {
            let element = rust_type(element);
            quote!(Vec<#element>)
        }
        ast::TypeRef::NestedRecord { path } => path_tokens(path),
        ast::TypeRef::Boxed { target } => {
            let target = rust_type(target);
            quote!(Box<#target>)
        }
        // Constants are not stored.
        ast::TypeRef::Constant { .. } => quote!(()),
    }
}

/// Initial value of a stored field.
///
/// Byte arrays are spelled out since `Default` is not implemented for
/// arrays of every length.
pub(super) fn default_value(ty: &ast::TypeRef) -> proc_macro2::TokenStream {
    match ty {
        ast::TypeRef::FixedByteArray { len } => {
            let len = proc_macro2::Literal::usize_unsuffixed(*len);
            quote!([0; #len])
        }
        _ => quote!(Default::default()),
    }
}

/// Generate the struct declaration of a record and its `Default`
/// implementation.
pub(super) fn generate(
    record: &ast::RecordDecl,
    origin: Option<&str>,
) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
    let name = record.id.as_str().to_ident();
    let fields: Vec<_> = record.fields.iter().filter(|field| field.ty.is_stored()).collect();
    let ids = fields.iter().map(|field| field.id.as_str().to_ident()).collect::<Vec<_>>();
    let types = fields.iter().map(|field| rust_type(&field.ty));
    let defaults = fields.iter().map(|field| default_value(&field.ty));
    let doc = match origin {
        Some(origin) => format!(" Record `{}` declared at {origin}.", record.id),
        None => format!(" Record `{}`.", record.id),
    };

    Ok(quote! {
        #[doc = #doc]
        #[allow(non_camel_case_types, non_snake_case)]
        #[derive(Debug, Clone, PartialEq)]
        pub struct #name {
            #(pub #ids: #types,)*
        }

        impl Default for #name {
            fn default() -> Self {
                Self {
                    #(#ids: #defaults,)*
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rust_type() {
        let ty = ast::TypeRef::SliceOf {
            element: Box::new(ast::TypeRef::FixedByteArray { len: 16 }),
        };
        assert_eq!(rust_type(&ty).to_string(), quote!(Vec<[u8; 16]>).to_string());
        let ty = ast::TypeRef::Boxed {
            target: Box::new(ast::TypeRef::NestedRecord { path: String::from("image::Point") }),
        };
        assert_eq!(rust_type(&ty).to_string(), quote!(Box<image::Point>).to_string());
        let ty = ast::TypeRef::Scalar { scalar: ast::ScalarKind::I16 };
        assert_eq!(rust_type(&ty).to_string(), "i16");
    }

    #[test]
    fn test_default_value() {
        assert_eq!(
            default_value(&ast::TypeRef::FixedByteArray { len: 48 }).to_string(),
            quote!([0; 48]).to_string()
        );
        assert_eq!(
            default_value(&ast::TypeRef::ByteSlice).to_string(),
            quote!(Default::default()).to_string()
        );
    }
}
