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

#![no_main]

use libfuzzer_sys::fuzz_target;
use wire9_compiler::compile::{self, Config, Unit};
use wire9_compiler::{ast, backends};

// Fuzz wire9_compiler::backends::json::generate over directive lines.
fuzz_target!(|source: String| {
    let config = Config::default();
    let directives: Vec<_> = source.lines().collect();
    let unit = Unit::inline("input", &directives);
    let mut sources = ast::SourceDatabase::new();
    let Ok(compilation) = compile::compile(&mut sources, &[unit], &config) else {
        return;
    };
    let _ = backends::json::generate(&compilation);
});
