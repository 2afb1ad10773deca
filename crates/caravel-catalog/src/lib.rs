use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::json;
use url::Url;

use caravel_domain::{Installation, InstallationName};

mod config;
mod error;

pub use config::{CONFIG_ENV, CatalogConfig};
pub use error::{CatalogError, CatalogErrorKind, ConfigError};

/// The installation registry, seen through its narrow contract.
///
/// Implementations are pure queries plus two mutations used by destroy
/// workflows. Nothing is cached across runs.
pub trait Catalog {
    /// Every installation registered for the current account, in catalog
    /// declaration order.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry cannot be reached or returns a
    /// malformed or rejected response.
    fn installations(&self) -> Result<Vec<Installation>, CatalogError>;

    /// Remove one installation record from the registry.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry rejects the mutation; the error
    /// kind distinguishes missing records from transport failures.
    fn delete_installation(&self, name: &InstallationName) -> Result<(), CatalogError>;

    /// Release cluster-level reservations (ACME/EAB credentials) after a
    /// full-workspace destroy.
    ///
    /// # Errors
    ///
    /// Returns an error when the registry rejects the mutation.
    fn release_reservations(&self) -> Result<(), CatalogError>;
}

/// Open the catalog described by `config`.
///
/// HTTP(S) sources talk GraphQL to the registry; `file://` URLs and plain
/// paths read a JSON snapshot instead.
///
/// # Errors
///
/// Returns an error when the source is neither a supported URL nor a path.
pub fn open_catalog(config: &CatalogConfig) -> Result<Box<dyn Catalog>, CatalogError> {
    match Url::parse(&config.source) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => {
            Ok(Box::new(HttpCatalog::new(url, config.token.clone())))
        }
        Ok(url) if url.scheme() == "file" => {
            let path = url
                .to_file_path()
                .map_err(|()| CatalogError::SourceNotAPath {
                    source_value: config.source.clone(),
                })?;
            Ok(Box::new(SnapshotCatalog::new(path)))
        }
        Ok(url) => Err(CatalogError::UnsupportedSourceScheme {
            scheme: url.scheme().to_string(),
        }),
        // Plain paths ("./catalog.json") are snapshot sources.
        Err(url::ParseError::RelativeUrlWithoutBase) => {
            Ok(Box::new(SnapshotCatalog::new(PathBuf::from(&config.source))))
        }
        Err(source) => Err(CatalogError::InvalidSource {
            source_value: config.source.clone(),
            source,
        }),
    }
}

const INSTALLATIONS_QUERY: &str =
    "query { installations { name dependencies minClientVersion protected } }";
const DELETE_MUTATION: &str =
    "mutation DeleteInstallation($name: String!) { deleteInstallation(name: $name) }";
const RELEASE_MUTATION: &str = "mutation { releaseClusterReservations }";

/// GraphQL-over-HTTP registry client.
pub struct HttpCatalog {
    agent: ureq::Agent,
    endpoint: Url,
    token: Option<String>,
}

impl HttpCatalog {
    #[must_use]
    pub fn new(endpoint: Url, token: Option<String>) -> Self {
        Self {
            agent: ureq::Agent::new_with_defaults(),
            endpoint,
            token,
        }
    }

    fn post<T: for<'de> Deserialize<'de>>(
        &self,
        operation: &'static str,
        body: &serde_json::Value,
    ) -> Result<T, CatalogError> {
        let url = self.endpoint.as_str();
        let mut request = self.agent.post(url).header("Accept", "application/json");
        if let Some(token) = &self.token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let mut response = request.send_json(body).map_err(|source| {
            if let ureq::Error::StatusCode(401 | 403) = source {
                CatalogError::Remote {
                    operation,
                    message: "authentication rejected by the registry".to_string(),
                    kind: CatalogErrorKind::Unauthorized,
                }
            } else {
                CatalogError::Transport {
                    url: url.to_string(),
                    source: Box::new(source),
                }
            }
        })?;

        let envelope: Envelope<T> =
            response
                .body_mut()
                .read_json()
                .map_err(|source| CatalogError::DecodeResponse {
                    url: url.to_string(),
                    source: Box::new(source),
                })?;

        if let Some(remote) = envelope.errors.into_iter().next() {
            return Err(CatalogError::Remote {
                operation,
                kind: remote.kind(),
                message: remote.message,
            });
        }

        envelope
            .data
            .ok_or(CatalogError::MissingData { operation })
    }
}

impl Catalog for HttpCatalog {
    fn installations(&self) -> Result<Vec<Installation>, CatalogError> {
        let data: InstallationsData = self.post(
            "installations query",
            &json!({ "query": INSTALLATIONS_QUERY }),
        )?;
        Ok(data.installations)
    }

    fn delete_installation(&self, name: &InstallationName) -> Result<(), CatalogError> {
        let _: serde_json::Value = self.post(
            "installation deletion",
            &json!({
                "query": DELETE_MUTATION,
                "variables": { "name": name.as_str() },
            }),
        )?;
        Ok(())
    }

    fn release_reservations(&self) -> Result<(), CatalogError> {
        let _: serde_json::Value =
            self.post("reservation release", &json!({ "query": RELEASE_MUTATION }))?;
        Ok(())
    }
}

/// Read-only catalog backed by a JSON file.
///
/// Not a cache: the engine never writes it. It exists for air-gapped
/// planning and for tests.
pub struct SnapshotCatalog {
    path: PathBuf,
}

impl SnapshotCatalog {
    #[must_use]
    pub const fn new(path: PathBuf) -> Self {
        Self { path }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Catalog for SnapshotCatalog {
    fn installations(&self) -> Result<Vec<Installation>, CatalogError> {
        let raw = fs::read_to_string(&self.path).map_err(|source| CatalogError::SnapshotRead {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| CatalogError::SnapshotDecode {
            path: self.path.clone(),
            source,
        })
    }

    fn delete_installation(&self, _name: &InstallationName) -> Result<(), CatalogError> {
        Err(CatalogError::SnapshotUnsupported {
            operation: "installation deletion",
        })
    }

    fn release_reservations(&self) -> Result<(), CatalogError> {
        Err(CatalogError::SnapshotUnsupported {
            operation: "reservation release",
        })
    }
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<RemoteError>,
}

#[derive(Debug, Deserialize)]
struct RemoteError {
    message: String,
    #[serde(default)]
    extensions: RemoteErrorExtensions,
}

#[derive(Debug, Default, Deserialize)]
struct RemoteErrorExtensions {
    #[serde(default)]
    code: Option<String>,
}

impl RemoteError {
    fn kind(&self) -> CatalogErrorKind {
        match self.extensions.code.as_deref() {
            Some("NOT_FOUND") => CatalogErrorKind::NotFound,
            Some("ALREADY_EXISTS" | "CONFLICT") => CatalogErrorKind::AlreadyExists,
            Some("UNAUTHENTICATED" | "UNAUTHORIZED" | "FORBIDDEN") => {
                CatalogErrorKind::Unauthorized
            }
            _ => CatalogErrorKind::Protocol,
        }
    }
}

#[derive(Debug, Deserialize)]
struct InstallationsData {
    installations: Vec<Installation>,
}
