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

//! Detection of declarations already present in the host sources.
//!
//! The generator must not emit a record type, decode procedure or
//! encode procedure that the host already declares. Host declarations
//! are enumerated by a [`HostEnvironment`] and collected into a
//! [`CollisionSet`].

use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Name of the generated decode procedure.
pub const DECODE_PROC: &str = "read_binary";
/// Name of the generated encode procedure.
pub const ENCODE_PROC: &str = "write_binary";

#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SymbolKind {
    RecordType,
    DecodeProc,
    EncodeProc,
}

/// Declaration kind attached to a subject name.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Symbol {
    pub subject: String,
    pub kind: SymbolKind,
}

/// Origin of a host declaration, used in diagnostic messages only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provenance(pub String);

/// Declaration enumerated from the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Declaration {
    pub symbol: Symbol,
    pub provenance: Provenance,
}

/// Source of existing host declarations.
pub trait HostEnvironment {
    /// Enumerate the record types and procedures declared by the host.
    fn declarations(&self) -> Result<Vec<Declaration>, String>;

    /// Return true if the declarations of the selected file are
    /// generated output, and must be ignored.
    fn is_regenerable(&self, provenance: &Provenance) -> bool;
}

/// Set of symbols the generator must not emit again.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CollisionSet {
    symbols: BTreeMap<Symbol, Provenance>,
}

impl fmt::Display for SymbolKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SymbolKind::RecordType => "type",
            SymbolKind::DecodeProc => "decode procedure",
            SymbolKind::EncodeProc => "encode procedure",
        })
    }
}

impl fmt::Display for Provenance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Symbol {
    pub fn new(subject: &str, kind: SymbolKind) -> Symbol {
        Symbol { subject: subject.to_owned(), kind }
    }
}

impl CollisionSet {
    pub fn new() -> CollisionSet {
        Default::default()
    }

    /// Collect the declarations of a host environment, skipping those
    /// found in regenerable files.
    pub fn detect(host: &dyn HostEnvironment) -> Result<CollisionSet, String> {
        let mut set = CollisionSet::new();
        for declaration in host.declarations()? {
            if host.is_regenerable(&declaration.provenance) {
                log::trace!(
                    "ignoring {} `{}` from regenerable file {}",
                    declaration.symbol.kind,
                    declaration.symbol.subject,
                    declaration.provenance
                );
                continue;
            }
            set.insert(declaration.symbol, declaration.provenance);
        }
        Ok(set)
    }

    pub fn insert(&mut self, symbol: Symbol, provenance: Provenance) {
        if let Some(prev) = self.symbols.insert(symbol.clone(), provenance) {
            log::debug!("{} `{}` first seen in {}, overwritten", symbol.kind, symbol.subject, prev);
        }
    }

    /// Merge two sets. Entries of `other` replace the entries of
    /// `self` with the same symbol.
    pub fn merge(mut self, other: CollisionSet) -> CollisionSet {
        for (symbol, provenance) in other.symbols {
            self.insert(symbol, provenance);
        }
        self
    }

    pub fn contains(&self, subject: &str, kind: SymbolKind) -> bool {
        self.provenance(subject, kind).is_some()
    }

    /// Return the origin of a declared symbol.
    pub fn provenance(&self, subject: &str, kind: SymbolKind) -> Option<&Provenance> {
        self.symbols.get(&Symbol::new(subject, kind))
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }
}

/// Name of the type implementing an `impl` block.
fn self_type_name(ty: &syn::Type) -> Option<String> {
    match ty {
        syn::Type::Path(path) => path.path.segments.last().map(|s| s.ident.to_string()),
        syn::Type::Group(group) => self_type_name(&group.elem),
        syn::Type::Paren(paren) => self_type_name(&paren.elem),
        _ => None,
    }
}

/// Enumerate the declarations of a list of Rust items.
///
/// Struct, enum and type alias items declare record types. Methods
/// named `read_binary` and `write_binary` declare the decode and
/// encode procedures of the type implementing them, whether inherent
/// or trait methods. Inline modules are scanned recursively.
pub fn declarations_from_items(items: &[syn::Item], provenance: &Provenance) -> Vec<Declaration> {
    let mut declarations = vec![];
    let mut declare = |subject: String, kind| {
        declarations.push(Declaration {
            symbol: Symbol { subject, kind },
            provenance: provenance.clone(),
        })
    };
    for item in items {
        match item {
            syn::Item::Struct(item) => declare(item.ident.to_string(), SymbolKind::RecordType),
            syn::Item::Enum(item) => declare(item.ident.to_string(), SymbolKind::RecordType),
            syn::Item::Type(item) => declare(item.ident.to_string(), SymbolKind::RecordType),
            syn::Item::Impl(item) => {
                let Some(subject) = self_type_name(&item.self_ty) else { continue };
                for impl_item in &item.items {
                    let syn::ImplItem::Fn(method) = impl_item else { continue };
                    if method.sig.ident == DECODE_PROC {
                        declare(subject.clone(), SymbolKind::DecodeProc);
                    } else if method.sig.ident == ENCODE_PROC {
                        declare(subject.clone(), SymbolKind::EncodeProc);
                    }
                }
            }
            syn::Item::Mod(syn::ItemMod { content: Some((_, items)), .. }) => {
                for declaration in declarations_from_items(items, provenance) {
                    declare(declaration.symbol.subject, declaration.symbol.kind);
                }
            }
            _ => (),
        }
    }
    declarations
}

/// Host environment made of Rust source files.
#[derive(Debug, Clone)]
pub struct RustHost {
    files: Vec<PathBuf>,
    generated_suffix: String,
}

impl RustHost {
    /// Files whose name ends with `generated_suffix` hold previously
    /// generated output.
    pub fn new(files: Vec<PathBuf>, generated_suffix: &str) -> RustHost {
        RustHost { files, generated_suffix: generated_suffix.to_owned() }
    }

    /// Host environment made of every `.rs` file in a directory.
    pub fn from_dir(dir: &Path, generated_suffix: &str) -> Result<RustHost, String> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| format!("failed to read directory '{}': {}", dir.display(), e))?;
        let mut files = vec![];
        for entry in entries {
            let path = entry.map_err(|e| e.to_string())?.path();
            if path.extension().is_some_and(|ext| ext == "rs") {
                files.push(path);
            }
        }
        files.sort();
        Ok(RustHost::new(files, generated_suffix))
    }
}

impl HostEnvironment for RustHost {
    fn declarations(&self) -> Result<Vec<Declaration>, String> {
        let mut declarations = vec![];
        for path in &self.files {
            let provenance = Provenance(path.display().to_string());
            let source = std::fs::read_to_string(path)
                .map_err(|e| format!("failed to read host file '{}': {}", provenance, e))?;
            let file = syn::parse_file(&source)
                .map_err(|e| format!("failed to parse host file '{}': {}", provenance, e))?;
            declarations.extend(declarations_from_items(&file.items, &provenance));
        }
        Ok(declarations)
    }

    fn is_regenerable(&self, provenance: &Provenance) -> bool {
        Path::new(&provenance.0)
            .file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| name.ends_with(&self.generated_suffix))
    }
}

/// Host environment with a fixed list of declarations.
#[derive(Debug, Clone, Default)]
pub struct StaticHost {
    pub declarations: Vec<Declaration>,
}

impl HostEnvironment for StaticHost {
    fn declarations(&self) -> Result<Vec<Declaration>, String> {
        Ok(self.declarations.clone())
    }

    fn is_regenerable(&self, _provenance: &Provenance) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn provenance(name: &str) -> Provenance {
        Provenance(name.to_owned())
    }

    fn set(entries: &[(&str, SymbolKind, &str)]) -> CollisionSet {
        let mut set = CollisionSet::new();
        for (subject, kind, file) in entries {
            set.insert(Symbol::new(subject, *kind), provenance(file));
        }
        set
    }

    #[test]
    fn test_declarations_from_items() {
        let file: syn::File = syn::parse_quote! {
            pub struct Foo { a: u8 }
            impl Foo {
                pub fn read_binary(&mut self) {}
                pub fn helper(&self) {}
            }
            impl wire9_runtime::Wire for Bar {
                fn write_binary(&self) {}
            }
            mod inner {
                pub enum Baz {}
            }
        };
        let declarations = declarations_from_items(&file.items, &provenance("host.rs"));
        let symbols: Vec<_> = declarations.into_iter().map(|d| d.symbol).collect();
        assert_eq!(
            symbols,
            vec![
                Symbol::new("Foo", SymbolKind::RecordType),
                Symbol::new("Foo", SymbolKind::DecodeProc),
                Symbol::new("Bar", SymbolKind::EncodeProc),
                Symbol::new("Baz", SymbolKind::RecordType),
            ]
        );
    }

    #[test]
    fn test_merge_is_right_biased() {
        let left = set(&[
            ("Foo", SymbolKind::RecordType, "a.rs"),
            ("Foo", SymbolKind::DecodeProc, "a.rs"),
        ]);
        let right = set(&[("Foo", SymbolKind::RecordType, "b.rs")]);
        let merged = left.merge(right);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.provenance("Foo", SymbolKind::RecordType), Some(&provenance("b.rs")));
        assert_eq!(merged.provenance("Foo", SymbolKind::DecodeProc), Some(&provenance("a.rs")));
        assert!(!merged.contains("Foo", SymbolKind::EncodeProc));
    }

    #[test]
    fn test_rust_host_skips_regenerable_files() {
        let dir = tempfile::tempdir().unwrap();
        let mut host_file = std::fs::File::create(dir.path().join("host.rs")).unwrap();
        writeln!(host_file, "pub struct Foo;").unwrap();
        let mut generated = std::fs::File::create(dir.path().join("records_wire9.rs")).unwrap();
        writeln!(generated, "pub struct Bar; impl Bar {{ fn read_binary(&mut self) {{}} }}")
            .unwrap();
        let mut other = std::fs::File::create(dir.path().join("notes.txt")).unwrap();
        writeln!(other, "struct Ignored;").unwrap();

        let host = RustHost::from_dir(dir.path(), "_wire9.rs").unwrap();
        let set = CollisionSet::detect(&host).unwrap();
        assert!(set.contains("Foo", SymbolKind::RecordType));
        assert!(!set.contains("Bar", SymbolKind::RecordType));
        assert!(!set.contains("Bar", SymbolKind::DecodeProc));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn test_rust_host_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("broken.rs");
        std::fs::write(&path, "pub struct {").unwrap();
        let host = RustHost::new(vec![path], "_wire9.rs");
        let err = CollisionSet::detect(&host).unwrap_err();
        assert!(err.contains("failed to parse host file"), "{err}");
    }

    #[test]
    fn test_static_host() {
        let host = StaticHost {
            declarations: vec![Declaration {
                symbol: Symbol::new("Foo", SymbolKind::EncodeProc),
                provenance: provenance("inline"),
            }],
        };
        let set = CollisionSet::detect(&host).unwrap();
        assert!(set.contains("Foo", SymbolKind::EncodeProc));
        assert!(!set.contains("Foo", SymbolKind::RecordType));
    }
}
