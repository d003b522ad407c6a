//! Settings picked up from the deployment environment.
//!
//! Nothing in this crate reads the environment implicitly. Callers resolve
//! these settings once, either through [`BuilderEnvironmentOptions`] in their
//! CLI or through [`retrieve_namespace_domain`], and hand them to the builders.
use std::{env, fmt::Display, ops::Deref, str::FromStr};

use snafu::{ResultExt, Snafu};
use tracing::instrument;

use crate::validation;

pub const NAMESPACE_DOMAIN_ENV: &str = "IGZ_NAMESPACE_DOMAIN";

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("failed to parse {namespace_domain:?} as domain name"))]
    ParseDomainName {
        source: validation::Errors,
        namespace_domain: String,
    },
}

/// A validated domain name, such as `default-tenant.app.example.com`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct DomainName(String);

impl FromStr for DomainName {
    type Err = validation::Errors;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        validation::is_domain(value)?;
        Ok(Self(value.to_owned()))
    }
}

impl TryFrom<String> for DomainName {
    type Error = validation::Errors;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DomainName> for String {
    fn from(value: DomainName) -> Self {
        value.0
    }
}

impl Display for DomainName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl Deref for DomainName {
    type Target = str;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

#[cfg_attr(
    feature = "clap",
    derive(clap::Args),
    command(next_help_heading = "Function Builder Options")
)]
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BuilderEnvironmentOptions {
    /// Domain appended to the host of every HTTP ingress, e.g. `default-tenant.app.example.com`.
    #[cfg_attr(feature = "clap", arg(long, env = NAMESPACE_DOMAIN_ENV))]
    pub namespace_domain: Option<DomainName>,
}

/// Tries to retrieve the domain that ingress hosts are qualified with.
///
/// Returns the value of `IGZ_NAMESPACE_DOMAIN` if it is set and not empty.
#[instrument]
pub fn retrieve_namespace_domain() -> Result<Option<DomainName>, Error> {
    tracing::debug!("Trying to determine the namespace domain...");

    match env::var(NAMESPACE_DOMAIN_ENV) {
        Ok(namespace_domain) if !namespace_domain.is_empty() => {
            let namespace_domain = DomainName::from_str(&namespace_domain)
                .context(ParseDomainNameSnafu { namespace_domain })?;
            tracing::info!(
                %namespace_domain,
                "Using namespace domain from {NAMESPACE_DOMAIN_ENV:?} environment variable"
            );
            Ok(Some(namespace_domain))
        }
        _ => {
            tracing::info!(
                "Leaving ingress hosts unqualified as {NAMESPACE_DOMAIN_ENV:?} environment variable is not set"
            );
            Ok(None)
        }
    }
}
