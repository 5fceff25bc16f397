fn main() {
    // The webview shell needs tauri's generated context; the library alone does not.
    #[cfg(feature = "desktop")]
    tauri_build::build();
}
