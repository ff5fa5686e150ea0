use std::fs;
use std::io;

use tonic::transport::{Certificate, ClientTlsConfig, Identity, ServerTlsConfig};

use crate::config::PemSource;

/// Resolves a [`PemSource`] to its PEM bytes, reading from disk when the
/// source names a path and returning the inline bytes otherwise.
pub fn resolve(source: &PemSource) -> io::Result<Vec<u8>> {
    match source {
        PemSource::Path(path) => fs::read(path),
        PemSource::Inline(data) => Ok(data.clone()),
    }
}

/// Builds the server-side TLS config for the gRPC listener from a
/// [`crate::config::MtlsSpec`]: server identity plus, when present, the CA
/// bundle used to verify client certificates.
pub fn server_tls_config(spec: &crate::config::MtlsSpec) -> anyhow::Result<ServerTlsConfig> {
    let cert = resolve(&spec.cert)?;
    let key = resolve(&spec.key)?;
    let mut config = ServerTlsConfig::new().identity(Identity::from_pem(cert, key));
    if let Some(ca) = &spec.client_ca {
        let ca = resolve(ca)?;
        config = config.client_ca_root(Certificate::from_pem(ca));
    }
    Ok(config)
}

/// Builds the client-side TLS config used by `dlockctl`/`nodectl` when the
/// server advertises mTLS.
pub fn client_tls_config(spec: &crate::config::MtlsSpec) -> anyhow::Result<ClientTlsConfig> {
    let ca = spec
        .client_ca
        .as_ref()
        .ok_or_else(|| anyhow::anyhow!("client tls config requires a CA bundle"))?;
    let ca = resolve(ca)?;
    let cert = resolve(&spec.cert)?;
    let key = resolve(&spec.key)?;
    Ok(ClientTlsConfig::new()
        .ca_certificate(Certificate::from_pem(ca))
        .identity(Identity::from_pem(cert, key)))
}
