fn main() {
    tonic_build::configure()
        .build_server(true)
        .build_client(true)
        .out_dir("src/proto")
        .compile(&["proto/lock.proto"], &["proto"])
        .unwrap();
}
