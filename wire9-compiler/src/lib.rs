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

//! wire9 directive parser, analyzer and code generator.

pub mod analyzer;
pub mod ast;
pub mod backends;
pub mod collision;
pub mod compile;
pub mod parser;
#[cfg(test)]
pub mod test_utils;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn rust_output_is_deterministic() {
        // The generated code should be deterministic, to avoid unnecessary rebuilds during
        // incremental builds.
        let directives = [
            "Point x[4] y[4]",
            "Rect min[,Point] max[,Point]",
            r#"Header magic[4,"DRAW"] n[2] rects[n,[]Rect] name[n*2] origin[,*Point]"#,
        ];

        let outputs: Vec<_> = (0..3)
            .map(|_| {
                let mut sources = ast::SourceDatabase::new();
                let compilation = compile::compile_inline(
                    &mut sources,
                    "draw",
                    &directives,
                    &compile::Config::default(),
                )
                .unwrap();
                backends::rust::generate(&compilation, true).unwrap()
            })
            .collect();

        assert_eq!(outputs[0], outputs[1]);
        assert_eq!(outputs[1], outputs[2]);
    }
}
