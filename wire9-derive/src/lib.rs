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

use codespan_reporting::term::termcolor;
use proc_macro2::{Span, TokenStream};
use quote::quote;
use std::env;
use std::path::Path;
use syn::parse_macro_input;
use syn::punctuated::Punctuated;

use wire9_compiler::analyzer::Diagnostics;
use wire9_compiler::ast::SourceDatabase;
use wire9_compiler::collision::{declarations_from_items, CollisionSet, Provenance, StaticHost};
use wire9_compiler::compile::{self, Config, DirectiveLine, Unit};

/// Directive literals of the `wire9_inline` attribute.
type Directives = Punctuated<syn::LitStr, syn::Token![,]>;

fn diagnostics_error(
    span: Span,
    sources: &SourceDatabase,
    diagnostics: &Diagnostics,
) -> TokenStream {
    let mut buffer = termcolor::Buffer::no_color();
    let message = match diagnostics.emit(sources, &mut buffer) {
        Ok(()) => String::from_utf8_lossy(&buffer.into_inner()).into_owned(),
        Err(err) => format!("error: could not emit diagnostics: {err}"),
    };
    syn::Error::new(span, message).to_compile_error()
}

/// Compile the directives and splice the generated code into the
/// module. Declarations already present in the module are not
/// generated again.
fn wire9_proc_macro(
    span: Span,
    name: &str,
    directives: Vec<DirectiveLine>,
    input: syn::ItemMod,
    dependency: Option<String>,
) -> TokenStream {
    let mod_items = input.content.map(|(_, items)| items).unwrap_or_default();
    let provenance = Provenance(format!("mod {}", input.ident));
    let host = StaticHost { declarations: declarations_from_items(&mod_items, &provenance) };
    let collisions = match CollisionSet::detect(&host) {
        Ok(collisions) => collisions,
        Err(err) => return syn::Error::new(span, err).to_compile_error(),
    };

    let config = Config::default();
    let unit = Unit { name: name.to_owned(), directives, collisions };
    let mut sources = SourceDatabase::new();
    let compilation = match compile::compile(&mut sources, &[unit], &config) {
        Ok(compilation) => compilation,
        Err(diagnostics) => return diagnostics_error(span, &sources, &diagnostics),
    };
    let generated =
        match wire9_compiler::backends::rust::generate_tokens(&compilation, config.flatten) {
            Ok(tokens) => tokens,
            Err(diagnostics) => return diagnostics_error(span, &sources, &diagnostics),
        };

    // Generate an include_bytes! statement to force a dependency
    // on the host source file.
    let dependency = dependency.map(|path| quote!(const _: &[u8] = include_bytes!(#path);));
    let mod_ident = input.ident;
    let mod_attrs = input.attrs;
    let mod_vis = input.vis;

    quote! {
        #(#mod_attrs)*
        #mod_vis mod #mod_ident {
            #dependency
            #generated
            #(#mod_items)*
        }
    }
}

fn wire9_file_proc_macro(path: syn::LitStr, input: syn::ItemMod) -> TokenStream {
    // Locate the host source file.
    let root = env::var("CARGO_MANIFEST_DIR").unwrap_or_else(|_| ".".into());
    let Some(host_path) =
        [Path::new(&root).join(path.value()), Path::new(&root).join("src").join(path.value())]
            .into_iter()
            .find(|path| path.exists())
    else {
        return syn::Error::new(path.span(), "error: unable to find file").to_compile_error();
    };
    let host_path = host_path.to_string_lossy().into_owned();
    let source = match std::fs::read_to_string(&host_path) {
        Ok(source) => source,
        Err(err) => {
            return syn::Error::new(path.span(), format!("error: unable to read file: {err}"))
                .to_compile_error()
        }
    };

    let directives = compile::extract_directives(&source, &Config::default().prefix);
    wire9_proc_macro(path.span(), &path.value(), directives, input, Some(host_path))
}

fn wire9_inline_proc_macro(directives: Directives, input: syn::ItemMod) -> TokenStream {
    let name = input.ident.to_string();
    let directives = directives
        .iter()
        .enumerate()
        .map(|(index, directive)| (index + 1, directive.value()))
        .collect();
    wire9_proc_macro(Span::call_site(), &name, directives, input, None)
}

/// Compile the `//wire9` directives of a host source file into the
/// annotated module.
///
/// ```ignore
/// #[wire9("src/draw.rs")]
/// mod draw {}
/// ```
#[proc_macro_attribute]
pub fn wire9(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr as syn::LitStr);
    let input = parse_macro_input!(input as syn::ItemMod);
    wire9_file_proc_macro(attr, input).into()
}

/// Compile directives given as string literals into the annotated
/// module.
///
/// ```ignore
/// #[wire9_inline("Bstr n[2] data[n]")]
/// mod bstr {}
/// ```
#[proc_macro_attribute]
pub fn wire9_inline(
    attr: proc_macro::TokenStream,
    input: proc_macro::TokenStream,
) -> proc_macro::TokenStream {
    let attr = parse_macro_input!(attr with Directives::parse_terminated);
    let input = parse_macro_input!(input as syn::ItemMod);
    wire9_inline_proc_macro(attr, input).into()
}
