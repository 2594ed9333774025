use std::time::Duration;

use anyhow::{Context, Result};
use relaunch_core::{RegistryConfig, VersionSet};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, AUTHORIZATION, USER_AGENT};
use tracing::{debug, warn};

use crate::query::{build_versions_query, parse_package_versions, RegistryError};
use crate::VersionRegistry;

const PACKAGES_PREVIEW_ACCEPT: &str = "application/vnd.github.packages-preview+json";

/// GitHub Packages listing queried through the GraphQL API.
#[derive(Debug, Clone)]
pub struct GithubPackagesRegistry {
    client: Client,
    endpoint: String,
    owner: String,
    repository: String,
    launcher_repository: String,
    launcher_package: String,
    token: Option<String>,
}

impl GithubPackagesRegistry {
    pub fn from_config(config: &RegistryConfig, token: Option<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .connect_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("failed to build registry HTTP client")?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            owner: config.owner.clone(),
            repository: config.repository.clone(),
            launcher_repository: config.launcher_repository.clone(),
            launcher_package: config.launcher_package.clone(),
            token: token.filter(|value| !value.trim().is_empty()),
        })
    }

    pub fn list_published_versions(
        &self,
        owner: &str,
        repository: &str,
        package: &str,
    ) -> Result<VersionSet, RegistryError> {
        let mut request = self
            .client
            .post(&self.endpoint)
            .header(USER_AGENT, concat!("relaunch/", env!("CARGO_PKG_VERSION")))
            .header(ACCEPT, PACKAGES_PREVIEW_ACCEPT)
            .json(&build_versions_query(owner, repository, package));
        if let Some(token) = &self.token {
            request = request.header(AUTHORIZATION, format!("bearer {token}"));
        }

        let response = request.send()?;
        let status = response.status();
        if !status.is_success() {
            return Err(RegistryError::Status(status.as_u16()));
        }

        let body = response.text()?;
        let versions = parse_package_versions(&body, owner, repository, package)?;
        debug!(
            package,
            count = versions.len(),
            versions = ?versions.as_slice(),
            "found published versions"
        );
        Ok(versions)
    }

    fn versions_or_empty(&self, repository: &str, package: &str) -> VersionSet {
        match self.list_published_versions(&self.owner, repository, package) {
            Ok(versions) => versions,
            Err(err) => {
                warn!(
                    package,
                    error = %error_chain(&err),
                    "registry unavailable; treating as offline"
                );
                VersionSet::empty()
            }
        }
    }
}

impl VersionRegistry for GithubPackagesRegistry {
    fn published_versions(&self, package: &str) -> VersionSet {
        self.versions_or_empty(&self.repository, package)
    }

    fn launcher_versions(&self) -> VersionSet {
        self.versions_or_empty(&self.launcher_repository, &self.launcher_package)
    }
}

fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut parts = vec![err.to_string()];
    let mut source = err.source();
    while let Some(cause) = source {
        parts.push(cause.to_string());
        source = cause.source();
    }
    parts.join(": ")
}
