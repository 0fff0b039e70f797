fn main() -> Result<(), Box<dyn std::error::Error>> {
    if std::env::var_os("PROTOC").is_none() {
        std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);
    }

    let proto_root = "proto";
    let negotiation_proto = format!("{proto_root}/aura/negotiation/v1/negotiation.proto");

    // Server code for the core, client code for the gateway.
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .compile_protos(&[negotiation_proto], &[proto_root.to_string()])?;

    Ok(())
}
