use proc_macro::TokenStream;
use proc_macro2::{Span, TokenStream as TokenStream2};
use quote::{format_ident, quote};
use syn::{
    parse_macro_input, spanned::Spanned, FnArg, GenericArgument, Ident, ItemFn, Pat, PathArguments,
    Signature, Type, TypePath,
};

/// Run an asynchronous test against a live MongoDB, in a database of its own
/// that is dropped however the test ends.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`mongodb::Database`], and [`crate::model::mongodb::Coll<T>`]. The client's
/// rocket has the full route table, with doubles standing in for the ledger,
/// biometric engine and key vault.
///
/// When no database is reachable the test is skipped, unless
/// `EVOTING_REQUIRE_DB` is set.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    if !args.is_empty() {
        return syn::Error::new(Span::call_site(), "`backend_test` takes no arguments")
            .into_compile_error()
            .into();
    }
    let mut item_fn = parse_macro_input!(input as ItemFn);

    let injected = match check_sig(&item_fn.sig) {
        Ok(injected) => injected,
        Err(err) => return err.into_compile_error().into(),
    };
    let bindings = injected.iter().map(Injection::binding);
    let test_args = injected.iter().map(Injection::ident);

    // The future gets a new name so that the test keeps the original one.
    let name = item_fn.sig.ident.clone();
    let fut_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = fut_name.clone();

    quote! {
        #[test]
        fn #name() {
            #item_fn

            async fn cleanup(db: mongodb::Database) {
                db.drop(None).await.unwrap();
            }

            // Setup and cleanup run outside the `catch_unwind`, the test inside.
            let outer_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("test-setup-cleanup")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();
            let inner_runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            let Some((rocket_client, db)) = outer_runtime.block_on(crate::testing::live_setup()) else {
                return;
            };

            // `Client` is not `UnwindSafe`, so it crosses over in a mutex.
            let client_mutex = std::sync::Mutex::new(rocket_client);
            let db_mutex = std::sync::Mutex::new(db.clone());
            let runtime_mutex = std::sync::Mutex::new(inner_runtime);
            let result = std::panic::catch_unwind(|| {
                let rocket_client = client_mutex.into_inner().unwrap();
                let db = db_mutex.into_inner().unwrap();
                let runtime = runtime_mutex.into_inner().unwrap();

                #(#bindings)*

                runtime.block_on(#fut_name(#(#test_args),*));
            });

            outer_runtime.block_on(cleanup(db));

            if let Err(cause) = result {
                std::panic::resume_unwind(cause);
            }
        }
    }
    .into()
}

/// A parameter the wrapper knows how to supply.
enum Injection {
    Client(Ident),
    Database(Ident),
    Collection(Ident, Ident),
}

impl Injection {
    fn ident(&self) -> &Ident {
        match self {
            Self::Client(ident) | Self::Database(ident) | Self::Collection(ident, _) => ident,
        }
    }

    fn binding(&self) -> TokenStream2 {
        match self {
            Self::Client(ident) => quote! { let #ident = rocket_client; },
            Self::Database(ident) => quote! { let #ident = db.clone(); },
            Self::Collection(ident, ty) => quote! {
                let #ident = crate::model::mongodb::Coll::<#ty>::from_db(&db);
            },
        }
    }
}

/// The `T` of a `Coll<T>` parameter type.
fn collection_type(type_path: &TypePath) -> Option<Ident> {
    let last = type_path.path.segments.last()?;
    if last.ident != "Coll" {
        return None;
    }
    let PathArguments::AngleBracketed(generics) = &last.arguments else {
        return None;
    };
    match generics.args.first() {
        Some(GenericArgument::Type(Type::Path(inner))) => inner.path.get_ident().cloned(),
        _ => None,
    }
}

/// Ensure the test is async and that every parameter can be injected.
fn check_sig(sig: &Signature) -> Result<Vec<Injection>, syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut injected = Vec::new();
    for input in &sig.inputs {
        let parsed = match input {
            FnArg::Typed(pat_type) => match (&*pat_type.pat, &*pat_type.ty) {
                (Pat::Ident(pat_ident), Type::Path(type_path)) => {
                    let ident = pat_ident.ident.clone();
                    match type_path.path.get_ident() {
                        Some(ty) if ty == "Client" => Some(Injection::Client(ident)),
                        Some(ty) if ty == "Database" => Some(Injection::Database(ident)),
                        _ => collection_type(type_path).map(|ty| Injection::Collection(ident, ty)),
                    }
                }
                _ => None,
            },
            FnArg::Receiver(_) => None,
        };
        let Some(parsed) = parsed else {
            return Err(syn::Error::new(
                input.span(),
                "Expected one of `client_ident: Client`, `db_ident: Database` or `collection_ident: Coll<T>`",
            ));
        };
        let duplicate = injected.iter().any(|seen| {
            matches!(
                (seen, &parsed),
                (Injection::Client(_), Injection::Client(_))
                    | (Injection::Database(_), Injection::Database(_))
            )
        });
        if duplicate {
            return Err(syn::Error::new(
                input.span(),
                "Test cannot accept more than one `Client` or `Database`",
            ));
        }
        injected.push(parsed);
    }
    Ok(injected)
}
