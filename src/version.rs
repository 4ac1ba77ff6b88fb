pub const VERSION: &str = match option_env!("MORTGAGE_CLIENT_BUILD_VERSION") {
    Some(v) => v,
    None => env!("CARGO_PKG_VERSION"),
};
