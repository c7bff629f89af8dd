use quote::ToTokens;
use syn::{Attribute, Token, punctuated::Punctuated};

// 在 attrs 上合并派生：必需派生在前，已有派生去重后保留，其余属性原样保留
pub(crate) fn apply_derives(attrs: &mut Vec<Attribute>, required: Vec<syn::Path>) {
    let mut derives: Vec<syn::Path> = Vec::new();
    let mut retained: Vec<Attribute> = Vec::new();

    for attr in attrs.drain(..) {
        if !attr.path().is_ident("derive") {
            retained.push(attr);
            continue;
        }
        match attr.parse_args_with(Punctuated::<syn::Path, Token![,]>::parse_terminated) {
            Ok(list) => derives.extend(list),
            Err(_) => retained.push(attr),
        }
    }

    let mut seen = std::collections::HashSet::<String>::new();
    let merged: Vec<syn::Path> = required
        .into_iter()
        .chain(derives)
        .filter(|p| seen.insert(derive_key(p)))
        .collect();

    attrs.push(syn::parse_quote!(#[derive(#(#merged),*)]));
    attrs.extend(retained);
}

// `Serialize` 与 `serde::Serialize` 视为同一派生
fn derive_key(p: &syn::Path) -> String {
    match p.segments.last() {
        Some(last) => last.ident.to_string(),
        None => p.to_token_stream().to_string(),
    }
}
