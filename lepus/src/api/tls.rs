//! TLS configuration for connections, behind the `tls` cargo feature.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use native_tls::{Certificate, Identity, TlsConnector};

use super::error::{Error, Result};

/// Wraps a [`TlsConnector`] plus the server name to verify.
#[derive(Clone)]
pub struct TlsAdaptor {
    connector: TlsConnector,
    domain: String,
}

impl TlsAdaptor {
    /// Use a pre-built connector.
    pub fn new(connector: TlsConnector, domain: String) -> Self {
        Self { connector, domain }
    }

    /// Server-authenticated TLS against a custom root CA.
    pub fn without_client_auth(root_ca_cert: &Path, domain: String) -> Result<Self> {
        let connector = TlsConnector::builder()
            .add_root_certificate(Self::read_certificate(root_ca_cert)?)
            .build()
            .map_err(|err| Error::Network(err.to_string()))?;
        Ok(Self { connector, domain })
    }

    /// Mutual TLS: custom root CA plus a PKCS#8 client identity.
    pub fn with_client_auth(
        root_ca_cert: &Path,
        client_cert: &Path,
        client_private_key: &Path,
        domain: String,
    ) -> Result<Self> {
        let identity = Identity::from_pkcs8(
            &Self::read_file(client_cert)?,
            &Self::read_file(client_private_key)?,
        )
        .map_err(|err| Error::Network(err.to_string()))?;
        let connector = TlsConnector::builder()
            .add_root_certificate(Self::read_certificate(root_ca_cert)?)
            .identity(identity)
            .build()
            .map_err(|err| Error::Network(err.to_string()))?;
        Ok(Self { connector, domain })
    }

    pub(crate) fn connector(&self) -> &TlsConnector {
        &self.connector
    }

    pub(crate) fn domain(&self) -> &str {
        &self.domain
    }

    fn read_certificate(path: &Path) -> Result<Certificate> {
        Certificate::from_pem(&Self::read_file(path)?)
            .map_err(|err| Error::Network(err.to_string()))
    }

    fn read_file(path: &Path) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        File::open(path)
            .and_then(|mut file| file.read_to_end(&mut bytes))
            .map_err(|err| Error::Network(err.to_string()))?;
        Ok(bytes)
    }
}
