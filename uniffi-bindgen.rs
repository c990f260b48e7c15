//! Generates Kotlin/Swift bindings for the `ffi` exports.
//!
//! Run with: cargo run --features ffi --bin uniffi-bindgen -- generate --library <lib> --language kotlin --out-dir <dir>

fn main() {
    uniffi::uniffi_bindgen_main()
}
