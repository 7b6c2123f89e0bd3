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

//! Compilation of the directives of a set of units.

use crate::analyzer::{self, Diagnostics, Registry};
use crate::ast::{self, SourceDatabase};
use crate::collision::CollisionSet;
use crate::parser;
use std::collections::HashMap;

/// Compiler options.
#[derive(Debug, Clone)]
pub struct Config {
    /// Comment prefix introducing a directive.
    pub prefix: String,
    /// Files whose name ends with this suffix hold generated code and
    /// are ignored by collision detection.
    pub generated_suffix: String,
    /// Run the scope flattening pass on the generated code.
    pub flatten: bool,
    /// Records skipped by the compiler.
    pub exclude_records: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            prefix: String::from("//wire9"),
            generated_suffix: String::from("_wire9.rs"),
            flatten: true,
            exclude_records: vec![],
        }
    }
}

/// Directive text tagged with its 1-based line number in the host
/// source.
pub type DirectiveLine = (usize, String);

/// Extract the directives of a host source file.
///
/// A directive is a line starting, after indentation, with `prefix`
/// followed by a blank. The prefix is stripped.
pub fn extract_directives(source: &str, prefix: &str) -> Vec<DirectiveLine> {
    source
        .lines()
        .enumerate()
        .filter_map(|(index, line)| {
            let text = line.trim_start().strip_prefix(prefix)?;
            if !text.starts_with(char::is_whitespace) {
                return None;
            }
            let text = text.trim();
            (!text.is_empty()).then(|| (index + 1, text.to_owned()))
        })
        .collect()
}

/// Compilation unit: the directives of one host source, and the
/// declarations already present in the host.
#[derive(Debug, Clone)]
pub struct Unit {
    pub name: String,
    pub directives: Vec<DirectiveLine>,
    pub collisions: CollisionSet,
}

impl Unit {
    pub fn from_source(
        name: &str,
        source: &str,
        config: &Config,
        collisions: CollisionSet,
    ) -> Unit {
        let directives = extract_directives(source, &config.prefix);
        Unit { name: name.to_owned(), directives, collisions }
    }

    /// Unit holding directives given without prefix, numbered from 1.
    pub fn inline(name: &str, directives: &[&str]) -> Unit {
        Unit {
            name: name.to_owned(),
            directives: directives
                .iter()
                .enumerate()
                .map(|(index, directive)| (index + 1, directive.to_string()))
                .collect(),
            collisions: CollisionSet::new(),
        }
    }
}

/// Result of a successful compilation.
#[derive(Debug)]
pub struct Compilation {
    /// Analyzed records, in directive order.
    pub records: Vec<ast::RecordDecl>,
    pub registry: Registry,
    /// Merged host declarations of all the units.
    pub collisions: CollisionSet,
    /// Source name (`unit:line`) of the directive declaring each record.
    pub origins: HashMap<String, String>,
}

impl Compilation {
    pub fn origin(&self, record: &str) -> Option<&str> {
        self.origins.get(record).map(String::as_str)
    }
}

/// Parse and analyze the directives of all the units.
///
/// The first failing directive aborts the compilation. The collision
/// sets of the units are merged, later units taking precedence.
pub fn compile(
    sources: &mut SourceDatabase,
    units: &[Unit],
    config: &Config,
) -> Result<Compilation, Diagnostics> {
    let mut registry = Registry::new();
    let mut records = vec![];
    let mut collisions = CollisionSet::new();
    let mut origins = HashMap::new();

    for unit in units {
        log::debug!("compiling {} directive(s) of {}", unit.directives.len(), unit.name);
        for (line, text) in &unit.directives {
            let name = format!("{}:{}", unit.name, line);
            let directive = parser::parse_inline(sources, &name, text.clone())?;
            if config.exclude_records.contains(&directive.id) {
                log::debug!("excluding record `{}` declared at {}", directive.id, name);
                continue;
            }
            records.push(analyzer::analyze(&directive, &mut registry)?);
            origins.insert(directive.id.clone(), name);
        }
        collisions = collisions.merge(unit.collisions.clone());
    }

    if records.is_empty() {
        log::warn!("no directive found");
    }
    Ok(Compilation { records, registry, collisions, origins })
}

/// Compile directives given without prefix, as a single unit.
pub fn compile_inline(
    sources: &mut SourceDatabase,
    name: &str,
    directives: &[&str],
    config: &Config,
) -> Result<Compilation, Diagnostics> {
    compile(sources, &[Unit::inline(name, directives)], config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::ErrorCode;
    use crate::backends;
    use crate::collision::{Provenance, Symbol, SymbolKind};
    use crate::test_utils::assert_contains;

    fn codes(diagnostics: Diagnostics) -> Vec<String> {
        diagnostics.diagnostics.into_iter().filter_map(|d| d.code).collect()
    }

    fn host(subject: &str, kind: SymbolKind, origin: &str) -> CollisionSet {
        let mut collisions = CollisionSet::new();
        collisions.insert(Symbol::new(subject, kind), Provenance(origin.to_owned()));
        collisions
    }

    #[test]
    fn test_extract_directives() {
        let source = "package draw\n\
                      //wire9 Point x[4] y[4]\n\
                      \t//wire9   Rect min[,Point] max[,Point]  \n\
                      //wire9x NotADirective a[1]\n\
                      // wire9 Commented a[1]\n\
                      //wire9\n";
        assert_eq!(
            extract_directives(source, "//wire9"),
            vec![
                (2, String::from("Point x[4] y[4]")),
                (3, String::from("Rect min[,Point] max[,Point]")),
            ]
        );
    }

    #[test]
    fn test_extract_custom_prefix() {
        let source = "/// msg: A a[1]\n//wire9 B b[1]\n";
        assert_eq!(extract_directives(source, "/// msg:"), vec![(1, String::from("A a[1]"))]);
    }

    #[test]
    fn test_compile_records_in_order() {
        let mut sources = SourceDatabase::new();
        let compilation = compile_inline(
            &mut sources,
            "draw",
            &["Point x[4] y[4]", "Rect min[,Point] max[,Point]"],
            &Config::default(),
        )
        .unwrap();
        let ids: Vec<_> = compilation.records.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["Point", "Rect"]);
        assert_eq!(compilation.registry.record_width("Rect"), Some(16));
    }

    #[test]
    fn test_compile_aborts_on_first_failure() {
        let mut sources = SourceDatabase::new();
        let directives = ["Z myint[2] bytething[]", "Y a[1]"];
        let result = compile_inline(&mut sources, "z", &directives, &Config::default());
        let diagnostics = result.unwrap_err();
        assert_eq!(codes(diagnostics), vec![String::from(ErrorCode::EmptyWidthAndType)]);
    }

    #[test]
    fn test_compile_rejects_duplicate_record() {
        let mut sources = SourceDatabase::new();
        let units = [Unit::inline("a.rs", &["A x[1]"]), Unit::inline("b.rs", &["A y[2]"])];
        let diagnostics = compile(&mut sources, &units, &Config::default()).unwrap_err();
        assert_eq!(codes(diagnostics), vec![String::from(ErrorCode::DuplicateRecordIdentifier)]);
    }

    #[test]
    fn test_compile_excludes_records() {
        let mut sources = SourceDatabase::new();
        let config = Config { exclude_records: vec![String::from("B")], ..Config::default() };
        let compilation =
            compile_inline(&mut sources, "t", &["A x[1]", "B y[2]"], &config).unwrap();
        assert_eq!(compilation.records.len(), 1);
        assert!(!compilation.registry.contains("B"));
        assert_eq!(compilation.origin("B"), None);
    }

    #[test]
    fn test_compile_merges_collisions() {
        let mut sources = SourceDatabase::new();
        let mut first = Unit::inline("a.rs", &["Foo a[2]"]);
        first.collisions = host("Foo", SymbolKind::RecordType, "a.rs");
        let mut second = Unit::inline("b.rs", &[]);
        second.collisions = host("Foo", SymbolKind::RecordType, "b.rs");
        let compilation = compile(&mut sources, &[first, second], &Config::default()).unwrap();
        assert_eq!(
            compilation.collisions.provenance("Foo", SymbolKind::RecordType),
            Some(&Provenance(String::from("b.rs")))
        );
    }

    #[test]
    fn test_compile_host_source() {
        let mut sources = SourceDatabase::new();
        let config = Config::default();
        let source = "//wire9 Bstr n[2] data[n]\nfn main() {}\n";
        let unit = Unit::from_source("bstr.rs", source, &config, CollisionSet::new());
        let compilation = compile(&mut sources, &[unit], &config).unwrap();
        let code = backends::rust::generate(&compilation, config.flatten).unwrap();
        assert_contains(&code, "pub struct Bstr {");
        assert_contains(&code, "pub data: Vec<u8>,");
        assert_eq!(compilation.origin("Bstr"), Some("bstr.rs:1"));
    }

    #[test]
    fn test_diagnostic_names_directive_line() {
        let mut sources = SourceDatabase::new();
        let config = Config::default();
        let source = "fn f() {}\n//wire9 A x[1]\n//wire9 B y[1] z[w]\n";
        let unit = Unit::from_source("host.rs", source, &config, CollisionSet::new());
        let diagnostics = compile(&mut sources, &[unit], &config).unwrap_err();
        let mut writer = codespan_reporting::term::termcolor::NoColor::new(vec![]);
        diagnostics.emit(&sources, &mut writer).unwrap();
        let rendered = String::from_utf8(writer.into_inner()).unwrap();
        assert_contains(&rendered, "host.rs:3");
        assert_contains(&rendered, "E10");
    }
}
