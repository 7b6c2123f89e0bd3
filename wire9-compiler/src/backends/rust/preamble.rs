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

use quote::quote;

/// Generate the imports shared by all the generated procedures.
pub(super) fn generate() -> proc_macro2::TokenStream {
    quote! {
        #[allow(unused_imports)]
        use bytes::{Buf, BufMut};
        #[allow(unused_imports)]
        use wire9_runtime::{DecodeError, EncodeError, Wire};
    }
}
