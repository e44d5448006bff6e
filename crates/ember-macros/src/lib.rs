// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! This crate provides procedural macros for the Ember event system.

use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, DeriveInput};

/// A derive macro that implements the `ember_core::event::Event` trait.
///
/// Two optional flags can be given through an `#[event(...)]` attribute:
///
/// * `async_dispatch` also implements `ember_core::event::AsyncEvent`, which
///   allows the payload to be queued with `notify_async`.
/// * `debug` renders the payload through its `Debug` implementation in
///   diagnostic traces instead of printing only the type name.
///
/// ```ignore
/// #[derive(Debug, Event)]
/// #[event(async_dispatch, debug)]
/// pub struct MouseMoved {
///     pub x: f32,
///     pub y: f32,
/// }
/// ```
#[proc_macro_derive(Event, attributes(event))]
pub fn derive_event(input: TokenStream) -> TokenStream {
    // Parse the input tokens into a syntax tree.
    let input = parse_macro_input!(input as DeriveInput);
    let name = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let mut async_dispatch = false;
    let mut debug = false;
    for attr in input.attrs.iter().filter(|a| a.path().is_ident("event")) {
        let parsed = attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("async_dispatch") {
                async_dispatch = true;
                Ok(())
            } else if meta.path.is_ident("debug") {
                debug = true;
                Ok(())
            } else {
                Err(meta.error("expected `async_dispatch` or `debug`"))
            }
        });
        if let Err(err) = parsed {
            return err.to_compile_error().into();
        }
    }

    let describe = if debug {
        quote! {
            fn describe(&self) -> ::std::string::String {
                ::std::format!("{:?}", self)
            }
        }
    } else {
        quote! {}
    };

    // `Send + 'static` is enforced by the supertraits of `Event`, so a payload
    // holding non-sendable data fails here rather than at the first `notify`.
    let async_impl = if async_dispatch {
        quote! {
            impl #impl_generics ::ember_core::event::AsyncEvent for #name #ty_generics #where_clause {}
        }
    } else {
        quote! {}
    };

    let expanded = quote! {
        impl #impl_generics ::ember_core::event::Event for #name #ty_generics #where_clause {
            #describe
        }
        #async_impl
    };

    TokenStream::from(expanded)
}
