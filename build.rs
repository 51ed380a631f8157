fn main() {
    // Only the FFI backend needs the vendor library. VIMBA_LIB_DIR points at
    // the directory holding libVimbaC (or VimbaC.lib on Windows).
    println!("cargo:rerun-if-env-changed=VIMBA_LIB_DIR");

    if std::env::var_os("CARGO_FEATURE_VIMBA").is_none() {
        return;
    }

    println!("cargo:rustc-link-lib=dylib=VimbaC");

    if let Some(libdir) = std::env::var_os("VIMBA_LIB_DIR") {
        println!("cargo:rustc-link-search=native={}", libdir.to_string_lossy());
    }
}
