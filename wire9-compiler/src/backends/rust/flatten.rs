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

//! Scope flattening.
//!
//! Field code is generated in its own block so that the local
//! variables of one field never leak into the next. Blocks declaring
//! nothing are redundant and are spliced into the enclosing block.

use syn::visit_mut::{self, VisitMut};

struct Flatten;

impl VisitMut for Flatten {
    fn visit_item_fn_mut(&mut self, item: &mut syn::ItemFn) {
        flatten_block(&mut item.block);
        visit_mut::visit_item_fn_mut(self, item);
    }

    fn visit_impl_item_fn_mut(&mut self, item: &mut syn::ImplItemFn) {
        flatten_block(&mut item.block);
        visit_mut::visit_impl_item_fn_mut(self, item);
    }

    fn visit_expr_closure_mut(&mut self, closure: &mut syn::ExprClosure) {
        if let syn::Expr::Block(body) = closure.body.as_mut() {
            flatten_block(&mut body.block);
        }
        visit_mut::visit_expr_closure_mut(self, closure);
    }
}

/// A block can be spliced when none of its statements introduce a
/// name.
fn is_spliceable(block: &syn::Block) -> bool {
    block.stmts.iter().all(|stmt| matches!(stmt, syn::Stmt::Expr(..)))
}

/// Splice the plain inner blocks of `block`, innermost first.
///
/// Only unlabeled blocks appearing as statements are considered.
/// Blocks owned by control flow constructs are left unchanged.
pub fn flatten_block(block: &mut syn::Block) {
    let stmts = std::mem::take(&mut block.stmts);
    let count = stmts.len();
    let mut flat = Vec::with_capacity(count);

    for (index, stmt) in stmts.into_iter().enumerate() {
        let is_tail = index + 1 == count && matches!(stmt, syn::Stmt::Expr(_, None));
        match stmt {
            syn::Stmt::Expr(syn::Expr::Block(mut inner), semi)
                if inner.attrs.is_empty() && inner.label.is_none() =>
            {
                flatten_block(&mut inner.block);
                if !is_spliceable(&inner.block) {
                    flat.push(syn::Stmt::Expr(syn::Expr::Block(inner), semi));
                    continue;
                }
                let mut inner_stmts = inner.block.stmts;
                // The value of the inner block is only kept when the
                // block was the value of the outer block.
                if !is_tail {
                    if let Some(syn::Stmt::Expr(_, semi @ None)) = inner_stmts.last_mut() {
                        *semi = Some(Default::default());
                    }
                }
                flat.extend(inner_stmts);
            }
            stmt => flat.push(stmt),
        }
    }

    block.stmts = flat;
}

/// Flatten the bodies of all the functions and closures in `file`.
pub fn flatten_file(file: &mut syn::File) {
    Flatten.visit_file_mut(file);
}
