use std::borrow::Cow;

use geotrack_app_lib::mk_specta;
use specta_typescript::Typescript;

/// Writes TypeScript bindings for the tracker commands and events
pub fn main() {
    let Some(out_file) = std::env::args().nth(1) else {
        eprintln!("Usage: export-types OUT_FILE");
        std::process::exit(1);
    };

    let mut lang = Typescript::new();
    lang.header = Cow::Borrowed("/* Generated by export-types, do not edit */");

    mk_specta()
        .export(lang, &out_file)
        .expect("Failed to export bindings");
    println!("Wrote tracker bindings to {out_file}");
}
