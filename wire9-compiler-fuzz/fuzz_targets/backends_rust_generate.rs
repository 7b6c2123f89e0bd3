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

// Fuzz wire9_compiler::backends::rust::generate over a host source.
fuzz_target!(|source: String| {
    let config = Config::default();
    let unit = Unit::from_source("input.rs", &source, &config, Default::default());
    let mut sources = ast::SourceDatabase::new();
    let Ok(compilation) = compile::compile(&mut sources, &[unit], &config) else {
        return;
    };
    let _ = backends::rust::generate(&compilation, config.flatten);
});
