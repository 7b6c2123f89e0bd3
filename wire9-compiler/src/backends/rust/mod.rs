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

//! Rust compiler backend.

use crate::analyzer::{Diagnostics, ErrorCode};
use crate::ast;
use crate::collision::SymbolKind;
use crate::compile::Compilation;
use codespan_reporting::diagnostic::Diagnostic;
use quote::{format_ident, quote, ToTokens};
use std::collections::BTreeSet;

mod decoder;
mod encoder;
pub mod flatten;
mod preamble;
mod types;

pub trait ToIdent {
    /// Generate a sanitized rust identifier.
    /// Rust specific keywords are renamed for validity.
    fn to_ident(self) -> proc_macro2::Ident;
}

impl ToIdent for &'_ str {
    fn to_ident(self) -> proc_macro2::Ident {
        match self {
            "as" | "break" | "const" | "continue" | "else" | "enum" | "extern" | "false" | "fn"
            | "for" | "if" | "impl" | "in" | "let" | "loop" | "match" | "mod" | "move" | "mut"
            | "pub" | "ref" | "return" | "static" | "struct" | "trait" | "true" | "type"
            | "unsafe" | "use" | "where" | "while" | "async" | "await" | "dyn" | "abstract"
            | "become" | "box" | "do" | "final" | "macro" | "override" | "priv" | "typeof"
            | "unsized" | "virtual" | "yield" | "try" => format_ident!("r#{}", self),
            _ => format_ident!("{}", self),
        }
    }
}

/// Shared routines emitted at most once per run.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord)]
enum Helper {
    WritePadded,
}

/// Lower a width expression to an expression of type `usize`.
///
/// Field references read the already decoded field of the current
/// record. The expression is lowered again at every point of use.
fn lower_width(width: &ast::WidthExpr) -> proc_macro2::TokenStream {
    match width {
        ast::WidthExpr::Literal { value } => {
            let value = proc_macro2::Literal::usize_unsuffixed(*value);
            quote!(#value)
        }
        ast::WidthExpr::FieldRef { id } => {
            let id = id.as_str().to_ident();
            quote!(self.#id as usize)
        }
        ast::WidthExpr::BinaryOp { op, lhs, rhs } => {
            let lhs = lower_operand(lhs);
            let rhs = lower_operand(rhs);
            let op = match op {
                ast::BinaryOp::Add => quote!(+),
                ast::BinaryOp::Sub => quote!(-),
                ast::BinaryOp::Mul => quote!(*),
                ast::BinaryOp::Div => quote!(/),
                ast::BinaryOp::Rem => quote!(%),
            };
            quote!(#lhs #op #rhs)
        }
    }
}

fn lower_operand(width: &ast::WidthExpr) -> proc_macro2::TokenStream {
    match width {
        ast::WidthExpr::Literal { .. } => lower_width(width),
        _ => {
            let width = lower_width(width);
            quote!((#width))
        }
    }
}

/// Select the place accessed by the field code.
/// Inside a slice loop (`depth > 0`) the current element is accessed.
fn field_access(id: &str, depth: usize) -> proc_macro2::TokenStream {
    let id = id.to_ident();
    if depth == 0 {
        quote!(self.#id)
    } else {
        quote!(self.#id[i])
    }
}

/// Tokens of a type or module path, e.g. `image::Point`.
fn path_tokens(path: &str) -> proc_macro2::TokenStream {
    let segments = path.split("::").map(|segment| match segment {
        "crate" | "self" | "super" | "Self" => format_ident!("{}", segment),
        _ => segment.to_ident(),
    });
    quote!(#(#segments)::*)
}

fn missing_width(record: &str, field: &ast::FieldDecl) -> Diagnostic<ast::FileId> {
    Diagnostic::error()
        .with_code(ErrorCode::MissingFieldMetadata)
        .with_message(format!("no width recorded for field `{}.{}`", record, field.id))
        .with_labels(vec![field.loc.primary()])
}

/// Bytes written for a constant field: the value truncated or padded
/// with zeros to the field width.
fn padded_constant(value: &str, width: usize) -> Vec<u8> {
    let mut bytes = value.as_bytes().to_vec();
    bytes.resize(width, 0);
    bytes
}

struct Generator<'a> {
    compilation: &'a Compilation,
    helpers: BTreeSet<Helper>,
}

impl<'a> Generator<'a> {
    fn new(compilation: &'a Compilation) -> Self {
        Generator { compilation, helpers: BTreeSet::new() }
    }

    fn is_declared(&self, record: &str, kind: SymbolKind) -> bool {
        self.compilation.collisions.contains(record, kind)
    }

    /// Emit an inert item in place of a declaration provided by the
    /// host.
    fn placeholder(&self, record: &str, kind: SymbolKind) -> proc_macro2::TokenStream {
        let origin = self
            .compilation
            .collisions
            .provenance(record, kind)
            .map(|p| p.to_string())
            .unwrap_or_else(|| String::from("host"));
        log::info!("skipping {} of `{}`: already declared in {}", kind, record, origin);
        let doc = format!(" wire9: {} of `{}` is declared in {}.", kind, record, origin);
        quote! {
            #[doc = #doc]
            const _: () = ();
        }
    }

    fn generate_procedures(
        &mut self,
        record: &ast::RecordDecl,
    ) -> Result<proc_macro2::TokenStream, Diagnostic<ast::FileId>> {
        let name = path_tokens(&record.id);
        let decode = !self.is_declared(&record.id, SymbolKind::DecodeProc);
        let encode = !self.is_declared(&record.id, SymbolKind::EncodeProc);

        let decoder = if decode {
            decoder::generate(self, record)?
        } else {
            self.placeholder(&record.id, SymbolKind::DecodeProc)
        };
        let encoder = if encode {
            encoder::generate(self, record)?
        } else {
            self.placeholder(&record.id, SymbolKind::EncodeProc)
        };
        // The trait can only be implemented when both procedures are
        // generated here.
        let wire = (decode && encode).then(|| {
            quote! {
                impl Wire for #name {
                    fn read_binary<B: Buf>(&mut self, buf: &mut B) -> Result<(), DecodeError> {
                        #name::read_binary(self, buf)
                    }

                    fn write_binary<B: BufMut>(&self, buf: &mut B) -> Result<(), EncodeError> {
                        #name::write_binary(self, buf)
                    }
                }
            }
        });
        Ok(quote! {
            #decoder
            #encoder
            #wire
        })
    }

    fn generate_helpers(&self) -> proc_macro2::TokenStream {
        let helpers = self.helpers.iter().map(|helper| match helper {
            Helper::WritePadded => quote! {
                /// Write `data` truncated or padded with zeros to `width` bytes.
                fn write_padded(buf: &mut impl BufMut, data: &[u8], width: usize) {
                    let len = std::cmp::min(data.len(), width);
                    buf.put_slice(&data[..len]);
                    buf.put_bytes(0, width - len);
                }
            },
        });
        quote!(#(#helpers)*)
    }

    fn generate(mut self) -> Result<proc_macro2::TokenStream, Diagnostics> {
        let records: Vec<_> = self
            .compilation
            .records
            .iter()
            .filter(|record| {
                if record.is_anonymous() {
                    log::warn!("skipping anonymous record with {} field(s)", record.fields.len());
                }
                !record.is_anonymous()
            })
            .collect();

        // Types are all declared before the procedures using them.
        let mut decls = vec![];
        for record in &records {
            if self.is_declared(&record.id, SymbolKind::RecordType) {
                decls.push(self.placeholder(&record.id, SymbolKind::RecordType));
            } else {
                decls.push(types::generate(record, self.compilation.origin(&record.id))?);
            }
        }
        for record in &records {
            decls.push(self.generate_procedures(record)?);
        }

        let preamble = preamble::generate();
        let helpers = self.generate_helpers();
        Ok(quote! {
            #preamble
            #(#decls)*
            #helpers
        })
    }
}

/// Generate the Rust syntax tree of the compiled records.
///
/// The scope flattening pass is applied to the procedure bodies when
/// `flatten` is set.
pub fn generate_file(compilation: &Compilation, flatten: bool) -> Result<syn::File, Diagnostics> {
    let tokens = Generator::new(compilation).generate()?;
    let mut file: syn::File = syn::parse2(tokens).map_err(|err| {
        Diagnostic::<ast::FileId>::error()
            .with_message(format!("could not parse generated code: {err}"))
    })?;
    if flatten {
        flatten::flatten_file(&mut file);
    }
    Ok(file)
}

/// Generate Rust code from the compiled records.
///
/// The code is not formatted, use [`generate`] to get readable source
/// code.
pub fn generate_tokens(
    compilation: &Compilation,
    flatten: bool,
) -> Result<proc_macro2::TokenStream, Diagnostics> {
    Ok(generate_file(compilation, flatten)?.into_token_stream())
}

/// Generate formatted Rust code from the compiled records.
pub fn generate(compilation: &Compilation, flatten: bool) -> Result<String, Diagnostics> {
    Ok(prettyplease::unparse(&generate_file(compilation, flatten)?))
}
