//! Implementation of the procedural macros re-exported by `slipstream-macros`.

use proc_macro::TokenStream;
use quote::quote;
use syn::{
    parse_macro_input, punctuated::Punctuated, Expr, ExprLit, Ident, ItemFn, Lit, MetaNameValue,
    Token,
};

const LEVELS: [&str; 5] = ["TRACE", "DEBUG", "INFO", "WARN", "ERROR"];

/// Run a test function with a tracing subscriber that writes to the test output.
///
/// The maximum level defaults to `DEBUG` and can be set with `level = "..."` (one of `TRACE`,
/// `DEBUG`, `INFO`, `WARN`, or `ERROR`).
///
/// # Example
/// ```rust,ignore
/// use slipstream_macros::test_traced;
/// use tracing::{debug, info};
///
/// #[test_traced(level = "INFO")]
/// fn test_info_level() {
///     info!("shown");
///     debug!("not shown");
/// }
/// ```
#[proc_macro_attribute]
pub fn test_traced(attr: TokenStream, item: TokenStream) -> TokenStream {
    let args = parse_macro_input!(attr with Punctuated::<MetaNameValue, Token![,]>::parse_terminated);
    let input = parse_macro_input!(item as ItemFn);

    let mut level = String::from("DEBUG");
    for arg in args {
        if !arg.path.is_ident("level") {
            return syn::Error::new_spanned(arg.path, "expected `level`")
                .to_compile_error()
                .into();
        }
        match &arg.value {
            Expr::Lit(ExprLit {
                lit: Lit::Str(value),
                ..
            }) => {
                let value = value.value().to_uppercase();
                if !LEVELS.contains(&value.as_str()) {
                    return syn::Error::new_spanned(
                        &arg.value,
                        "level must be one of TRACE, DEBUG, INFO, WARN, or ERROR",
                    )
                    .to_compile_error()
                    .into();
                }
                level = value;
            }
            other => {
                return syn::Error::new_spanned(other, "level must be a string literal")
                    .to_compile_error()
                    .into();
            }
        }
    }
    let level = Ident::new(&level, proc_macro2::Span::call_site());

    let attrs = &input.attrs;
    let vis = &input.vis;
    let sig = &input.sig;
    let block = &input.block;
    let expanded = quote! {
        #[test]
        #(#attrs)*
        #vis #sig {
            // Other tests in the same binary may have installed a subscriber already.
            let _ = ::slipstream_macros::tracing_subscriber::fmt()
                .with_test_writer()
                .with_max_level(::slipstream_macros::tracing::Level::#level)
                .try_init();

            #block
        }
    };
    TokenStream::from(expanded)
}
