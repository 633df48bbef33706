//! Build script for glint-core
//!
//! Checks system requirements before compilation:
//! - Minimum Rust version (Edition 2021 = Rust 1.56.0+)
//! - Target platform (the runtime half needs `dladdr` and ELF/DWARF)

fn main()
{
    // Check minimum Rust version
    // Edition 2021 requires Rust 1.56.0
    if let Ok(rustc_version) = rustc_version::version() {
        let min_rust_version = rustc_version::Version::parse("1.56.0").unwrap();

        if rustc_version < min_rust_version {
            panic!(
                "glint-core requires Rust {} or newer (Edition 2021), found {}",
                min_rust_version, rustc_version
            );
        }
    } else {
        // If we can't get version (e.g., in some build environments), just warn
        println!("cargo:warning=could not verify Rust version");
    }

    // The build-time half (tables, builder, wire format) is portable; the
    // runtime half resolves modules through `dladdr`, so non-Unix builds
    // get the build-time surface only.
    #[cfg(not(unix))]
    println!("cargo:warning=glint-core's runtime resolver needs a Unix dynamic loader; this build gets the build-time surface only");
}
