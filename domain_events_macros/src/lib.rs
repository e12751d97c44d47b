use proc_macro::TokenStream;
use quote::quote;
use syn::{parse_macro_input, Data, DeriveInput, Fields, Ident, LitStr};

// ============================================================================
// #[derive(DomainEvent)]
// ============================================================================

/// Derive macro that implements `domain_events::DomainEvent`.
///
/// # Usage
///
/// The event name defaults to the type name:
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize, DomainEvent)]
/// struct TodoCompleted {
///     id: String,
/// }
/// ```
///
/// With an explicit name and owning aggregate:
/// ```ignore
/// #[derive(Debug, Serialize, Deserialize, DomainEvent)]
/// #[domain_event(name = "orders.placed", aggregate_id = order_id)]
/// struct OrderPlaced {
///     order_id: String,
///     total: u64,
/// }
/// ```
///
/// The macro supports:
/// - `name = "..."`: the stable name stored with the event
/// - `aggregate_id = field`: a named field that derefs to `str`
#[proc_macro_derive(DomainEvent, attributes(domain_event))]
pub fn derive_domain_event(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);

    match expand_domain_event(&input) {
        Ok(tokens) => TokenStream::from(tokens),
        Err(err) => TokenStream::from(err.to_compile_error()),
    }
}

struct EventArgs {
    name: Option<LitStr>,
    aggregate_id: Option<Ident>,
}

fn parse_event_args(input: &DeriveInput) -> syn::Result<EventArgs> {
    let mut args = EventArgs {
        name: None,
        aggregate_id: None,
    };

    for attr in &input.attrs {
        if !attr.path().is_ident("domain_event") {
            continue;
        }

        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("name") {
                args.name = Some(meta.value()?.parse()?);
                Ok(())
            } else if meta.path.is_ident("aggregate_id") {
                args.aggregate_id = Some(meta.value()?.parse()?);
                Ok(())
            } else {
                Err(meta.error("expected `name = \"...\"` or `aggregate_id = field`"))
            }
        })?;
    }

    Ok(args)
}

fn expand_domain_event(input: &DeriveInput) -> syn::Result<proc_macro2::TokenStream> {
    let args = parse_event_args(input)?;
    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    let name = args
        .name
        .unwrap_or_else(|| LitStr::new(&ident.to_string(), ident.span()));

    let aggregate_fn = match &args.aggregate_id {
        None => quote! {},
        Some(field) => {
            ensure_named_field(input, field)?;
            quote! {
                fn aggregate_id(&self) -> ::core::option::Option<&str> {
                    ::core::option::Option::Some(::core::convert::AsRef::<str>::as_ref(&self.#field))
                }
            }
        }
    };

    Ok(quote! {
        impl #impl_generics ::domain_events::DomainEvent for #ident #ty_generics #where_clause {
            fn event_name(&self) -> &'static str {
                #name
            }

            #aggregate_fn
        }
    })
}

fn ensure_named_field(input: &DeriveInput, field: &Ident) -> syn::Result<()> {
    let Data::Struct(data) = &input.data else {
        return Err(syn::Error::new_spanned(
            field,
            "`aggregate_id` is only supported on structs",
        ));
    };

    let Fields::Named(fields) = &data.fields else {
        return Err(syn::Error::new_spanned(
            field,
            "`aggregate_id` requires a struct with named fields",
        ));
    };

    let found = fields
        .named
        .iter()
        .any(|f| f.ident.as_ref().is_some_and(|name| name == field));

    if found {
        Ok(())
    } else {
        Err(syn::Error::new_spanned(
            field,
            format!("no field named `{}`", field),
        ))
    }
}
