use proc_macro::TokenStream;
use proc_macro2::{Literal, Span, TokenStream as TokenStream2};
use quote::quote;
use syn::meta::ParseNestedMeta;
use syn::{Error, Ident, Item, LitInt, LitStr, Result, Token, parse_macro_input, spanned::Spanned};

/// Registers a migration type with docshift's build-time inventory.
///
/// ```text
/// #[migration(number = 3, description = "Add is_active to continent codes", collection = "continent_codes")]
/// #[derive(Default)]
/// struct AddIsActive;
/// ```
///
/// `number` and a non-empty `description` are required; `collection` sets the scope and is
/// omitted for global migrations. The type must implement `docshift::Migration` (directly or
/// through `DocumentMigration`) and `Default`, which builds a fresh instance per call.
#[proc_macro_attribute]
pub fn migration(attr: TokenStream, item: TokenStream) -> TokenStream {
    let mut args = MigrationArgs::default();
    let parser = syn::meta::parser(|meta| args.parse(meta));
    parse_macro_input!(attr with parser);
    let item = parse_macro_input!(item as Item);

    match expand(args, item) {
        Ok(tokens) => tokens.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

#[derive(Default)]
struct MigrationArgs {
    number: Option<i64>,
    description: Option<LitStr>,
    collection: Option<LitStr>,
}

impl MigrationArgs {
    fn parse(&mut self, meta: ParseNestedMeta) -> Result<()> {
        if meta.path.is_ident("number") {
            if self.number.is_some() {
                return Err(meta.error("duplicate `number`"));
            }
            self.number = Some(parse_signed_number(&meta)?);
        } else if meta.path.is_ident("description") {
            if self.description.is_some() {
                return Err(meta.error("duplicate `description`"));
            }
            self.description = Some(meta.value()?.parse()?);
        } else if meta.path.is_ident("collection") {
            if self.collection.is_some() {
                return Err(meta.error("duplicate `collection`"));
            }
            self.collection = Some(meta.value()?.parse()?);
        } else {
            return Err(meta.error("unknown migration attribute; expected `number`, `description` or `collection`"));
        }
        Ok(())
    }
}

/// Parses `= 12` or `= -3` into an `i64`.
fn parse_signed_number(meta: &ParseNestedMeta) -> Result<i64> {
    let value = meta.value()?;
    let negative = value.peek(Token![-]);
    if negative {
        value.parse::<Token![-]>()?;
    }
    let lit: LitInt = value.parse()?;
    let magnitude: i128 = lit.base10_parse()?;
    let signed = if negative { -magnitude } else { magnitude };
    i64::try_from(signed).map_err(|_| Error::new(lit.span(), "migration number must fit in an i64"))
}

fn expand(args: MigrationArgs, item: Item) -> Result<TokenStream2> {
    let (ident, generics) = match &item {
        Item::Struct(item) => (&item.ident, &item.generics),
        Item::Enum(item) => (&item.ident, &item.generics),
        other => {
            return Err(Error::new(
                other.span(),
                "#[migration] can only be applied to a struct or enum",
            ));
        }
    };
    if !generics.params.is_empty() {
        return Err(Error::new(generics.span(), "#[migration] types cannot be generic"));
    }

    let number = args.number.ok_or_else(|| {
        Error::new(
            Span::call_site(),
            "#[migration] requires `number = N`; there is no default version",
        )
    })?;

    let description = args.description.ok_or_else(|| {
        Error::new(Span::call_site(), "#[migration] requires `description = \"...\"`")
    })?;
    if description.value().trim().is_empty() {
        return Err(Error::new(description.span(), "migration description cannot be empty"));
    }

    let collection = match &args.collection {
        Some(collection) => {
            check_collection(collection)?;
            quote! { ::core::option::Option::Some(#collection) }
        }
        None => quote! { ::core::option::Option::None },
    };

    let magnitude = Literal::u64_unsuffixed(number.unsigned_abs());
    let number = if number < 0 { quote!(-#magnitude) } else { quote!(#magnitude) };
    let type_name = LitStr::new(&ident.to_string(), ident.span());
    let factory = Ident::new("__docshift_migration_factory", Span::call_site());

    Ok(quote! {
        #item

        const _: () = {
            fn #factory() -> ::std::boxed::Box<dyn ::docshift::Migration> {
                ::std::boxed::Box::new(<#ident as ::core::default::Default>::default())
            }

            ::docshift::inventory::submit! {
                ::docshift::MigrationRegistration {
                    type_name: #type_name,
                    number: #number,
                    collection: #collection,
                    description: #description,
                    factory: #factory,
                }
            }
        };
    })
}

/// Same rules the store applies to key segments, checked at compile time.
fn check_collection(collection: &LitStr) -> Result<()> {
    let value = collection.value();
    if value.is_empty() {
        return Err(Error::new(collection.span(), "collection cannot be empty"));
    }
    if value.contains(':') {
        return Err(Error::new(collection.span(), "collection cannot contain ':'"));
    }
    if value.chars().any(char::is_whitespace) {
        return Err(Error::new(collection.span(), "collection cannot contain whitespace"));
    }
    Ok(())
}
