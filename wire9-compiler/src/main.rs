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

//! wire9 directive compiler.

use argh::FromArgs;
use codespan_reporting::term::termcolor;
use std::path::PathBuf;

use wire9_compiler::analyzer::Diagnostics;
use wire9_compiler::ast;
use wire9_compiler::backends;
use wire9_compiler::collision::{CollisionSet, RustHost};
use wire9_compiler::compile::{self, Config, Unit};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum OutputFormat {
    Json,
    Rust,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        match input.to_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "rust" => Ok(Self::Rust),
            _ => Err(format!("could not parse {input:?}, valid option are 'json', 'rust'.")),
        }
    }
}

#[derive(FromArgs, Debug)]
/// wire9 directive compiler.
/// Generates binary decode and encode procedures for the records
/// declared in `//wire9` comments.
struct Opt {
    #[argh(switch)]
    /// print tool version and exit.
    version: bool,

    #[argh(option, default = "OutputFormat::Rust")]
    /// generate output in this format ("rust", "json").
    output_format: OutputFormat,

    #[argh(positional)]
    /// host source files holding the directives.
    input_files: Vec<String>,

    #[argh(option)]
    /// additional host source files scanned for existing declarations.
    host: Vec<String>,

    #[argh(switch)]
    /// keep the per field scopes in the generated procedures.
    no_flatten: bool,

    #[argh(option)]
    /// exclude records from the generated output.
    exclude_record: Vec<String>,

    #[argh(option)]
    /// comment prefix introducing a directive (default "//wire9").
    prefix: Option<String>,

    #[argh(option)]
    /// write the generated code to this file instead of stdout.
    output: Option<String>,
}

impl Opt {
    fn config(&self) -> Config {
        let default = Config::default();
        Config {
            prefix: self.prefix.clone().unwrap_or(default.prefix),
            flatten: !self.no_flatten,
            exclude_records: self.exclude_record.clone(),
            ..default
        }
    }
}

/// Collect the declarations of one host file.
fn scan_host(path: &str, config: &Config) -> Result<CollisionSet, String> {
    CollisionSet::detect(&RustHost::new(vec![PathBuf::from(path)], &config.generated_suffix))
}

fn load_units(opt: &Opt, config: &Config) -> Result<Vec<Unit>, String> {
    let mut units = vec![];
    for path in &opt.input_files {
        let source = std::fs::read_to_string(path)
            .map_err(|err| format!("could not read {path}: {err}"))?;
        let collisions = scan_host(path, config)?;
        units.push(Unit::from_source(path, &source, config, collisions));
    }
    for path in &opt.host {
        let collisions = scan_host(path, config)?;
        units.push(Unit { name: path.clone(), directives: vec![], collisions });
    }
    Ok(units)
}

fn emit_diagnostics(sources: &ast::SourceDatabase, diagnostics: &Diagnostics) {
    let writer = termcolor::StandardStream::stderr(termcolor::ColorChoice::Auto);
    let mut lock = writer.lock();
    if let Err(err) = diagnostics.emit(sources, &mut lock) {
        eprintln!("could not print diagnostics: {err}");
    }
}

fn generate_backend(opt: &Opt) -> Result<(), String> {
    let config = opt.config();
    let units = load_units(opt, &config)?;
    let mut sources = ast::SourceDatabase::new();
    let compilation = compile::compile(&mut sources, &units, &config).map_err(|diagnostics| {
        emit_diagnostics(&sources, &diagnostics);
        String::from("Compilation failed")
    })?;
    log::info!("compiled {} record(s)", compilation.records.len());

    let output = match opt.output_format {
        #[cfg(feature = "serde")]
        OutputFormat::Json => backends::json::generate(&compilation)?,
        #[cfg(not(feature = "serde"))]
        OutputFormat::Json => {
            return Err(String::from("For JSON support, please recompile with the 'serde' feature"))
        }
        OutputFormat::Rust => backends::rust::generate(&compilation, config.flatten).map_err(
            |diagnostics| {
                emit_diagnostics(&sources, &diagnostics);
                String::from("Generation failed")
            },
        )?,
    };

    match &opt.output {
        Some(path) => std::fs::write(path, output)
            .map_err(|err| format!("could not write {path}: {err}")),
        None => {
            println!("{}", output);
            Ok(())
        }
    }
}

fn main() -> Result<(), String> {
    env_logger::init();
    let opt: Opt = argh::from_env();

    if opt.version {
        println!("wire9 {}\nCopyright (C) 2023 Google LLC", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    if opt.input_files.is_empty() {
        return Err("No input file is specified".to_owned());
    }

    generate_backend(&opt)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_emit_diagnostics() {
        let mut sources = ast::SourceDatabase::new();
        let config = Config::default();
        let diagnostics =
            compile::compile_inline(&mut sources, "t", &["Z myint[2] bytething[]"], &config)
                .unwrap_err();
        assert!(!diagnostics.is_empty());
        emit_diagnostics(&sources, &diagnostics);
    }

    #[test]
    fn test_config_from_flags() {
        let opt = Opt::from_args(
            &["wire9"],
            &["--no-flatten", "--exclude-record", "Scratch", "--prefix", "//w9", "draw.rs"],
        )
        .unwrap();
        let config = opt.config();
        assert!(!config.flatten);
        assert_eq!(config.exclude_records, vec![String::from("Scratch")]);
        assert_eq!(config.prefix, "//w9");
        assert_eq!(config.generated_suffix, Config::default().generated_suffix);
        assert_eq!(opt.input_files, vec![String::from("draw.rs")]);
        assert_eq!(opt.output_format, OutputFormat::Rust);
    }
}
