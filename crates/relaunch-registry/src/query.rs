use relaunch_core::VersionSet;
use serde::Deserialize;
use serde_json::{json, Value};
use thiserror::Error;

const VERSIONS_QUERY: &str = "query($owner: String!, $repository: String!, $package: String!) { \
repository(owner: $owner, name: $repository) { \
packages(names: [$package], first: 10) { \
nodes { name versions(first: 100) { nodes { version } } } } } }";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("registry request failed")]
    Transport(#[from] reqwest::Error),
    #[error("registry returned HTTP {0}")]
    Status(u16),
    #[error("registry rejected query: {0}")]
    Query(String),
    #[error("failed to parse registry response")]
    Parse(#[from] serde_json::Error),
    #[error("repository '{owner}/{repository}' not found in registry")]
    RepositoryNotFound { owner: String, repository: String },
    #[error("package '{0}' not found in registry")]
    PackageNotFound(String),
}

pub fn build_versions_query(owner: &str, repository: &str, package: &str) -> Value {
    json!({
        "query": VERSIONS_QUERY,
        "variables": {
            "owner": owner,
            "repository": repository,
            "package": package,
        }
    })
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    data: Option<QueryData>,
    #[serde(default)]
    errors: Vec<QueryError>,
}

#[derive(Debug, Deserialize)]
struct QueryError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct QueryData {
    repository: Option<RepositoryNode>,
}

#[derive(Debug, Deserialize)]
struct RepositoryNode {
    packages: Connection<PackageNode>,
}

#[derive(Debug, Deserialize)]
struct PackageNode {
    name: String,
    versions: Connection<VersionNode>,
}

#[derive(Debug, Deserialize)]
struct VersionNode {
    version: String,
}

#[derive(Debug, Deserialize)]
struct Connection<T> {
    #[serde(default = "Vec::new")]
    nodes: Vec<T>,
}

/// Extracts the version listing for `package`, in the order the registry
/// returned it.
pub fn parse_package_versions(
    body: &str,
    owner: &str,
    repository: &str,
    package: &str,
) -> Result<VersionSet, RegistryError> {
    let response: QueryResponse = serde_json::from_str(body)?;
    if !response.errors.is_empty() {
        let messages = response
            .errors
            .into_iter()
            .map(|error| error.message)
            .collect::<Vec<_>>();
        return Err(RegistryError::Query(messages.join("; ")));
    }

    let repository_node = response
        .data
        .and_then(|data| data.repository)
        .ok_or_else(|| RegistryError::RepositoryNotFound {
            owner: owner.to_string(),
            repository: repository.to_string(),
        })?;

    let package_node = repository_node
        .packages
        .nodes
        .into_iter()
        .find(|node| node.name == package)
        .ok_or_else(|| RegistryError::PackageNotFound(package.to_string()))?;

    Ok(package_node
        .versions
        .nodes
        .into_iter()
        .map(|node| node.version)
        .collect())
}
