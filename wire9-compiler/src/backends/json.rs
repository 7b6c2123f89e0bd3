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

//! JSON compiler backend.

use crate::ast;
use crate::compile::Compilation;
use serde::Serialize;

#[derive(Serialize)]
struct Field<'a> {
    id: &'a str,
    #[serde(rename = "type")]
    ty: &'a ast::TypeRef,
    meta: &'a ast::FieldMeta,
}

#[derive(Serialize)]
struct Record<'a> {
    id: &'a str,
    /// Encoded width, absent for records with dynamic fields.
    width: Option<usize>,
    fields: Vec<Field<'a>>,
}

/// Turn the analyzed records into a JSON representation.
///
/// Anonymous records are skipped.
pub fn generate(compilation: &Compilation) -> Result<String, String> {
    let mut records = vec![];
    for record in compilation.records.iter().filter(|record| !record.is_anonymous()) {
        let mut fields = vec![];
        for field in &record.fields {
            let meta = compilation
                .registry
                .get(&record.id, &field.id)
                .map_err(|diagnostic| diagnostic.message)?;
            fields.push(Field { id: &field.id, ty: &field.ty, meta });
        }
        records.push(Record {
            id: &record.id,
            width: compilation.registry.record_width(&record.id),
            fields,
        });
    }
    serde_json::to_string_pretty(&records)
        .map_err(|err| format!("could not JSON serialize records: {err}"))
}
