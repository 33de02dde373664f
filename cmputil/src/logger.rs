/// Intercept messages using the `log` crate and print them to STDOUT, with an
/// "info" default filter. Override per-module with the usual RUST_LOG syntax.
pub fn setup() {
    use env_logger::{Builder, Env};
    Builder::from_env(Env::default().default_filter_or("info")).init();
}
