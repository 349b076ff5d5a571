//! TLS certificate loading.

use axum_server::tls_rustls::RustlsConfig;
use std::io;
use std::path::Path;

use crate::config::TlsConfig;

/// Load a rustls config from PEM certificate and key files.
pub async fn load_tls_config(tls: &TlsConfig) -> io::Result<RustlsConfig> {
    let cert = Path::new(&tls.cert_path);
    let key = Path::new(&tls.key_path);
    ensure_exists(cert, "Certificate")?;
    ensure_exists(key, "Private key")?;

    let config = RustlsConfig::from_pem_file(cert, key).await?;
    tracing::info!(cert = %tls.cert_path, "TLS certificate loaded");
    Ok(config)
}

fn ensure_exists(path: &Path, what: &str) -> io::Result<()> {
    if path.exists() {
        Ok(())
    } else {
        Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} file not found: {}", what, path.display()),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_missing_certificate() {
        let tls = TlsConfig {
            cert_path: "/nonexistent/registry.crt".to_string(),
            key_path: "/nonexistent/registry.key".to_string(),
        };
        let err = load_tls_config(&tls).await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
        assert!(err.to_string().contains("Certificate"));
    }
}
