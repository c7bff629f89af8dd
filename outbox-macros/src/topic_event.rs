use crate::utils::apply_derives;
use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Attribute, Expr, Ident, Item, ItemEnum, ItemStruct, LitStr, Meta, Result, Token, parse::Parse,
    parse::ParseStream, parse_macro_input,
};

/// #[event] 宏实现
/// - 结构体：`#[event(topic = "...")]` 必填
/// - 枚举：变体上的 `#[event(topic = "...")]` 覆写枚举级主题；两者都缺失时报错
/// - 追加派生 `serde::Serialize`，枚举额外追加 `#[serde(untagged)]` 使载荷保持扁平
///   （已写 `#[serde(tag = ..)]` 等标签属性时保留用户选择）
/// - 生成 `::outbox_domain::event::{TopicEvent, EventSupplier}` 实现
pub(crate) fn expand(attr: TokenStream, item: TokenStream) -> TokenStream {
    let cfg = parse_macro_input!(attr as EventAttrConfig);
    let input = parse_macro_input!(item as Item);

    let result = match input {
        Item::Struct(st) => expand_struct(cfg, st),
        Item::Enum(en) => expand_enum(cfg, en),
        other => Err(syn::Error::new(
            other.span(),
            "#[event] can only be used on struct or enum types",
        )),
    };

    match result {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_struct(cfg: EventAttrConfig, mut st: ItemStruct) -> Result<proc_macro2::TokenStream> {
    let topic = cfg.topic.ok_or_else(|| {
        syn::Error::new(st.ident.span(), "missing `topic`, e.g. #[event(topic = \"order.created\")]")
    })?;
    check_topic(&topic)?;

    apply_derives(&mut st.attrs, vec![syn::parse_quote!(serde::Serialize)]);

    let ident = &st.ident;
    let (impl_generics, ty_generics, where_clause) = st.generics.split_for_impl();
    let supplier = supplier_impl(ident, &st.generics);

    Ok(quote! {
        #st

        impl #impl_generics ::outbox_domain::event::TopicEvent for #ident #ty_generics #where_clause {
            fn topic(&self) -> &str { #topic }
        }

        #supplier
    })
}

fn expand_enum(cfg: EventAttrConfig, mut en: ItemEnum) -> Result<proc_macro2::TokenStream> {
    if let Some(lit) = &cfg.topic {
        check_topic(lit)?;
    }

    let mut arms = Vec::with_capacity(en.variants.len());
    for v in &mut en.variants {
        let mut topic: Option<LitStr> = None;
        let mut retained = Vec::with_capacity(v.attrs.len());
        for attr in v.attrs.drain(..) {
            if attr.path().is_ident("event") {
                if topic.is_some() {
                    return Err(syn::Error::new(
                        attr.span(),
                        "duplicate #[event] on this variant",
                    ));
                }
                topic = Some(parse_variant_topic(&attr)?);
            } else {
                retained.push(attr);
            }
        }
        v.attrs = retained;

        let topic = match topic.or_else(|| cfg.topic.clone()) {
            Some(lit) => lit,
            None => {
                return Err(syn::Error::new(
                    v.ident.span(),
                    "missing topic: add #[event(topic = \"...\")] to the variant or the enum",
                ));
            }
        };
        check_topic(&topic)?;

        let v_ident = &v.ident;
        arms.push(match &v.fields {
            syn::Fields::Named(_) => quote! { Self::#v_ident { .. } => #topic },
            syn::Fields::Unnamed(_) => quote! { Self::#v_ident(..) => #topic },
            syn::Fields::Unit => quote! { Self::#v_ident => #topic },
        });
    }

    apply_derives(&mut en.attrs, vec![syn::parse_quote!(serde::Serialize)]);
    if !has_serde_tagging(&en.attrs) {
        en.attrs.push(syn::parse_quote!(#[serde(untagged)]));
    }

    let ident = &en.ident;
    let (impl_generics, ty_generics, where_clause) = en.generics.split_for_impl();
    let supplier = supplier_impl(ident, &en.generics);

    Ok(quote! {
        #en

        impl #impl_generics ::outbox_domain::event::TopicEvent for #ident #ty_generics #where_clause {
            fn topic(&self) -> &str {
                match self { #( #arms, )* }
            }
        }

        #supplier
    })
}

fn supplier_impl(ident: &Ident, generics: &syn::Generics) -> proc_macro2::TokenStream {
    let (impl_generics, ty_generics, where_clause) = generics.split_for_impl();
    quote! {
        impl #impl_generics ::outbox_domain::event::EventSupplier for #ident #ty_generics #where_clause {
            fn supply(&self) -> ::outbox_domain::error::OutboxResult<::outbox_domain::event::Event> {
                ::outbox_domain::event::TopicEvent::to_event(self)
            }
        }
    }
}

fn check_topic(lit: &LitStr) -> Result<()> {
    if lit.value().trim().is_empty() {
        return Err(syn::Error::new(lit.span(), "topic must not be blank"));
    }
    Ok(())
}

// 仅当用户已指定枚举标签方式（untagged / tag / content）时不再追加 untagged
fn has_serde_tagging(attrs: &[Attribute]) -> bool {
    attrs
        .iter()
        .filter(|a| a.path().is_ident("serde"))
        .filter_map(|a| {
            a.parse_args_with(Punctuated::<Meta, Token![,]>::parse_terminated)
                .ok()
        })
        .flatten()
        .any(|meta| {
            let path = meta.path();
            path.is_ident("untagged") || path.is_ident("tag") || path.is_ident("content")
        })
}

// -------- parsing --------

fn parse_variant_topic(attr: &Attribute) -> Result<LitStr> {
    let cfg: EventAttrConfig = attr.parse_args()?;
    cfg.topic
        .ok_or_else(|| syn::Error::new(attr.span(), "expected #[event(topic = \"...\")]"))
}

struct EventAttrKv {
    key: Ident,
    #[allow(dead_code)]
    eq: Token![=],
    value: Expr,
}

impl Parse for EventAttrKv {
    fn parse(input: ParseStream) -> Result<Self> {
        Ok(Self {
            key: input.parse()?,
            eq: input.parse()?,
            value: input.parse()?,
        })
    }
}

// 主题配置：`topic = "..."`
struct EventAttrConfig {
    topic: Option<LitStr>,
}

impl Parse for EventAttrConfig {
    fn parse(input: ParseStream) -> Result<Self> {
        let mut topic: Option<LitStr> = None;

        let pairs: Punctuated<EventAttrKv, Token![,]> =
            Punctuated::<EventAttrKv, Token![,]>::parse_terminated(input)?;

        for kv in pairs {
            match kv.key.to_string().as_str() {
                "topic" => {
                    if topic.is_some() {
                        return Err(syn::Error::new(
                            kv.key.span(),
                            "duplicate key 'topic' in attribute",
                        ));
                    }
                    let lit = match kv.value {
                        Expr::Lit(syn::ExprLit {
                            lit: syn::Lit::Str(lit),
                            ..
                        }) => lit,
                        other => {
                            return Err(syn::Error::new(
                                other.span(),
                                "expected string literal for 'topic'",
                            ));
                        }
                    };
                    topic = Some(lit);
                }
                _ => {
                    return Err(syn::Error::new(
                        kv.key.span(),
                        "unknown key; expected 'topic'",
                    ));
                }
            }
        }

        Ok(Self { topic })
    }
}
