fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use the vendored protoc unless the environment points at one.
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }
    let include = protoc_bin_vendored::include_path()?;

    tonic_build::configure()
        .build_client(false)
        .compile_protos(&["proto/tfplugin6.9.proto"], &[std::path::Path::new("proto"), &include])?;

    println!("cargo:rerun-if-changed=proto/tfplugin6.9.proto");
    Ok(())
}
