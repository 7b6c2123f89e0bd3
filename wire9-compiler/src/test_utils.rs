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

//! Various utility functions used in tests.

use std::io::Write;
use std::process::Command;
use tempfile::NamedTempFile;

/// Format a token stream holding a list of items.
///
/// # Panics
///
/// Panics if the tokens do not form a valid Rust file.
pub fn format_rust(tokens: proc_macro2::TokenStream) -> String {
    let file: syn::File = syn::parse2(tokens).expect("tokens are not a valid Rust file");
    prettyplease::unparse(&file)
}

/// Find the unified diff between two strings using `diff`.
///
/// # Panics
///
/// Panics if `diff` cannot be found on `$PATH` or if it returns an
/// error.
pub fn diff(left_label: &str, left: &str, right_label: &str, right: &str) -> String {
    let mut temp_left = NamedTempFile::new().unwrap();
    temp_left.write_all(left.as_bytes()).unwrap();
    let mut temp_right = NamedTempFile::new().unwrap();
    temp_right.write_all(right.as_bytes()).unwrap();

    let output = Command::new("diff")
        .arg("--unified")
        .arg("--label")
        .arg(left_label)
        .arg("--label")
        .arg(right_label)
        .arg(temp_left.path())
        .arg(temp_right.path())
        .output()
        .expect("failed to run diff");
    // Exit code 2 signals trouble, see diff(1).
    assert_ne!(output.status.code(), Some(2), "diff failed: {}", output.status);
    String::from_utf8(output.stdout).expect("diff output was not UTF-8")
}

/// Compare two strings and output a diff if they are not equal.
#[track_caller]
pub fn assert_eq_with_diff(left_label: &str, left: &str, right_label: &str, right: &str) {
    assert!(
        left == right,
        "texts did not match, diff:\n{}\n",
        diff(left_label, left, right_label, right)
    );
}

/// Check that `haystack` contains `needle`.
///
/// Panic with a nice message if not.
#[track_caller]
pub fn assert_contains(haystack: &str, needle: &str) {
    assert!(haystack.contains(needle), "Could not find {:?} in {:?}", needle, haystack);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_diff_labels() {
        let patch = diff("left 'record'", "n[2]\ndata[n]\n", "right", "n[2]\nlen[1]\ndata[n]\n");
        assert_contains(&patch, "left 'record'");
        assert_contains(&patch, "+len[1]");
    }

    #[test]
    #[should_panic]
    fn test_assert_eq_with_diff_on_diff() {
        assert_eq_with_diff("", "a[1]\n", "", "a[2]\n");
    }

    #[test]
    fn test_format_rust() {
        let code = format_rust(quote::quote!(
            fn f() {}
        ));
        assert_eq!(code, "fn f() {}\n");
    }
}
