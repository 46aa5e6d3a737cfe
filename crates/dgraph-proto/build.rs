use std::io::{Error, ErrorKind, Result};

fn main() -> Result<()> {
    // Fall back to the bundled protoc so the crate builds without a system install.
    if std::env::var_os("PROTOC").is_none() {
        let protoc = protoc_bin_vendored::protoc_bin_path()
            .map_err(|e| Error::new(ErrorKind::NotFound, e.to_string()))?;
        std::env::set_var("PROTOC", protoc);
    }

    tonic_build::configure()
        .build_server(false)
        .build_client(true)
        .compile_protos(&["proto/api.proto"], &["proto"])?;
    Ok(())
}
