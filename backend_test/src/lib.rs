use proc_macro::TokenStream;
use proc_macro2::TokenStream as TokenStream2;
use quote::{format_ident, quote};
use syn::{parse_macro_input, spanned::Spanned, FnArg, Ident, ItemFn, Pat, Signature, Type};

/// Transform an asynchronous test into a synchronous one running against a
/// fresh server instance, and inject dependencies.
///
/// Injectable dependencies are [`rocket::local::asynchronous::Client`],
/// [`crate::model::ledger::Ledger`] and [`crate::model::vote_log::VoteLog`],
/// all backed by the same instance.
///
/// `#[backend_test(poll)]` additionally creates the example poll (ID 0),
/// owned by `EXAMPLE_OWNER`, before the test runs.
#[proc_macro_attribute]
pub fn backend_test(args: TokenStream, input: TokenStream) -> TokenStream {
    let mut item_fn = parse_macro_input!(input as ItemFn);

    // Extract type information and reject invalid function signatures.
    let (test_args, state_idents, state_types) = match check_sig(item_fn.sig.clone()) {
        Ok(args) => args,
        Err(err) => {
            return err.into_compile_error().into();
        }
    };

    // Rename the future so the test can have its original name.
    let name = item_fn.sig.ident.clone();
    let new_name = format_ident!("{}_fut", name);
    item_fn.sig.ident = new_name.clone();

    // Create the example poll if needed.
    let maybe_poll = match parse_macro_input!(args as Option<Ident>) {
        None => quote! {},
        Some(arg) if arg == "poll" => quote! {{
            let config = rocket_client.rocket().state::<crate::Config>().unwrap();
            let response = rocket_client
                .post("/polls")
                .header(rocket::http::ContentType::JSON)
                .header(rocket::http::Header::new(
                    config.identity_header().to_string(),
                    crate::model::api::poll::examples::EXAMPLE_OWNER,
                ))
                .body(rocket::serde::json::json!(crate::model::api::poll::PollSpec::example()).to_string())
                .dispatch()
                .await;
            assert_eq!(response.status(), rocket::http::Status::Ok, "failed to create example poll");
        }},
        Some(arg) => {
            return syn::Error::new(arg.span(), "Expected no argument or `poll`")
                .into_compile_error()
                .into();
        }
    };

    // Rewrite the test function.
    quote! {
        #[test]
        fn #name() {
            /// Test setup.
            async fn setup() -> rocket::local::asynchronous::Client {
                let rocket_client = rocket::local::asynchronous::Client::tracked(crate::build())
                    .await
                    .unwrap();

                #maybe_poll

                rocket_client
            }

            /// The test itself.
            #item_fn

            let runtime = rocket::tokio::runtime::Builder::new_multi_thread()
                .thread_name("rocket-worker-test-thread")
                .worker_threads(1)
                .enable_all()
                .build()
                .unwrap();

            runtime.block_on(async {
                let rocket_client = setup().await;

                #(
                    let #state_idents = rocket_client
                        .rocket()
                        .state::<#state_types>()
                        .expect("missing managed state")
                        .clone();
                )*

                #new_name(#(#test_args),*).await;
            });
        }
    }
    .into()
}

/// Ensure the wrapped test is async, extract parameters to inject, and reject unknown parameters.
#[allow(clippy::type_complexity)]
fn check_sig(sig: Signature) -> Result<(Vec<TokenStream2>, Vec<Ident>, Vec<TokenStream2>), syn::Error> {
    if sig.asyncness.is_none() {
        return Err(syn::Error::new(sig.span(), "Test must be marked `async`"));
    }

    let mut has_client = false;
    let mut args = vec![];
    let mut state_idents: Vec<Ident> = vec![];
    let mut state_types = vec![];

    for input in &sig.inputs {
        if let FnArg::Typed(pat_type) = input {
            if let Pat::Ident(pat_ident) = &*pat_type.pat {
                if let Type::Path(type_path) = &*pat_type.ty {
                    if let Some(type_ident) = type_path.path.get_ident() {
                        let ident = pat_ident.ident.clone();
                        if type_ident == "Client" {
                            if has_client {
                                return Err(syn::Error::new(input.span(), "Test cannot accept more than one `rocket::local::asynchronous::Client`"));
                            }
                            has_client = true;
                            args.push(quote! { rocket_client });
                            continue;
                        } else if type_ident == "Ledger" || type_ident == "VoteLog" {
                            let state_type = if type_ident == "Ledger" {
                                quote! { crate::model::ledger::Ledger }
                            } else {
                                quote! { crate::model::vote_log::VoteLog }
                            };
                            // Give the binding a private name to avoid clashing with the client.
                            let binding = format_ident!("__injected_{}", ident);
                            args.push(quote! { #binding });
                            state_idents.push(binding);
                            state_types.push(state_type);
                            continue;
                        }
                    }
                }
            }
        }

        return Err(syn::Error::new(
            input.span(),
            "Expected one of `client_ident: Client`, `ledger_ident: Ledger` or `log_ident: VoteLog`",
        ));
    }

    Ok((args, state_idents, state_types))
}
