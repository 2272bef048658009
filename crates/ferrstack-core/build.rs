//! Build script for ferrstack-core
//!
//! Checks the toolchain before compilation:
//! - Minimum Rust version (let-else and `Option::is_some_and` need 1.70)
//! - Platform support: live processes need Linux, core files work anywhere

fn main()
{
    match rustc_version::version() {
        Ok(found) => {
            let minimum = rustc_version::Version::new(1, 70, 0);
            if found < minimum {
                panic!("ferrstack-core requires Rust {minimum} or newer, found {found}");
            }
        }
        // Some build environments hide the compiler version.
        Err(_) => println!("cargo:warning=could not verify Rust version"),
    }

    let os = std::env::var("CARGO_CFG_TARGET_OS").unwrap_or_default();
    if os != "linux" {
        println!("cargo:warning=ferrstack-core: live process support needs Linux; only core files will work on {os}");
    }
}
