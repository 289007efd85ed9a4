use proc_macro2::TokenStream;
use quote::quote;
use std::error::Error;
use std::path::{Path, PathBuf};
use std::{env, fs};
use walkdir::WalkDir;

const FIXTURES_DIR: &str = "tests/data";

fn main() -> Result<(), Box<dyn Error>> {
    println!("cargo:rerun-if-changed={FIXTURES_DIR}");
    generate_fixture_tests()
}

/// Writes one `test_case` per JSON fixture, so that each consent string shows up as its own test.
fn generate_fixture_tests() -> Result<(), Box<dyn Error>> {
    let test_cases = fixture_test_cases();
    let token_stream = quote! {
        use test_case::test_case;
        #(#test_cases)*
        fn test_fixture(filename: &str) {
            let fixture = crate::common::Fixture::load_from_file(filename).unwrap();
            fixture.assert_decodes_to_expected_record();
            fixture.assert_encodes_back();
        }
    };
    let syntax_tree = syn::parse2(token_stream)?;
    let pretty = prettyplease::unparse(&syntax_tree);

    let out_dir = env::var("OUT_DIR")?;
    fs::write(Path::new(&out_dir).join("fixture_tests.rs"), pretty)?;

    Ok(())
}

fn fixture_files() -> impl Iterator<Item = PathBuf> {
    WalkDir::new(FIXTURES_DIR)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| {
            entry.file_type().is_file()
                && entry
                    .file_name()
                    .to_str()
                    .is_some_and(|s| s.ends_with(".json"))
        })
        .map(|e| e.into_path())
}

fn fixture_test_cases() -> impl Iterator<Item = TokenStream> {
    fixture_files().filter_map(|entry| {
        let path = entry.to_str()?.to_string();
        let name = entry.file_stem()?.to_str()?.to_string();
        Some(quote! {
            #[test_case(#path ; #name)]
        })
    })
}
