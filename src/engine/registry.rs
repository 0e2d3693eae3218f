use crate::config::ProviderConfig;
use rustc_hash::FxHashSet;
use thiserror::Error;

/// Built-in crawler operators and the domains their crawlers resolve under.
pub const DEFAULT_PROVIDERS: &[(&str, &[&str])] = &[
    ("Google", &["google.com", "googlebot.com"]),
    ("Yahoo", &["yahoo.com"]),
    ("Bing", &["search.msn.com"]),
    ("Baidu", &["crawl.baidu.com"]),
];

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RegistryError {
    #[error("provider table is empty")]
    Empty,

    #[error("provider name cannot be empty")]
    EmptyName,

    #[error("provider '{0}' has no domains")]
    NoDomains(String),

    #[error("provider '{0}' is defined more than once")]
    DuplicateProvider(String),

    #[error("provider '{provider}' lists domain '{domain}' more than once")]
    DuplicateDomain { provider: String, domain: String },
}

#[derive(Debug, Clone)]
pub struct Provider {
    name: String,
    domains: FxHashSet<String>,
}

impl Provider {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn owns_domain(&self, domain: &str) -> bool {
        self.domains.contains(domain)
    }

    pub fn domains(&self) -> impl Iterator<Item = &str> {
        self.domains.iter().map(String::as_str)
    }
}

/// Read-only table of trusted providers, built once at startup.
#[derive(Debug, Clone)]
pub struct ProviderRegistry {
    providers: Vec<Provider>,
}

impl ProviderRegistry {
    pub fn new<N, D, I>(table: I) -> Result<Self, RegistryError>
    where
        N: Into<String>,
        D: AsRef<str>,
        I: IntoIterator<Item = (N, Vec<D>)>,
    {
        let mut providers: Vec<Provider> = Vec::new();

        for (name, domains) in table {
            let name = name.into().trim().to_string();
            if name.is_empty() {
                return Err(RegistryError::EmptyName);
            }
            if providers
                .iter()
                .any(|p| p.name.eq_ignore_ascii_case(&name))
            {
                return Err(RegistryError::DuplicateProvider(name));
            }
            if domains.is_empty() {
                return Err(RegistryError::NoDomains(name));
            }

            let mut set = FxHashSet::default();
            for domain in domains {
                let domain = normalize_domain(domain.as_ref());
                if domain.is_empty() {
                    return Err(RegistryError::NoDomains(name));
                }
                if !set.insert(domain.clone()) {
                    return Err(RegistryError::DuplicateDomain {
                        provider: name,
                        domain,
                    });
                }
            }

            providers.push(Provider { name, domains: set });
        }

        if providers.is_empty() {
            return Err(RegistryError::Empty);
        }

        Ok(Self { providers })
    }

    pub fn builtin() -> Result<Self, RegistryError> {
        Self::new(
            DEFAULT_PROVIDERS
                .iter()
                .map(|(name, domains)| (*name, domains.to_vec())),
        )
    }

    /// The configured table, or the built-in one when none is configured.
    pub fn from_config(providers: &[ProviderConfig]) -> Result<Self, RegistryError> {
        if providers.is_empty() {
            return Self::builtin();
        }
        Self::new(
            providers
                .iter()
                .map(|p| (p.name.clone(), p.domains.clone())),
        )
    }

    pub fn lookup(&self, name: &str) -> Option<&Provider> {
        self.providers
            .iter()
            .find(|p| p.name.eq_ignore_ascii_case(name))
    }

    pub fn all(&self) -> &[Provider] {
        &self.providers
    }
}

fn normalize_domain(domain: &str) -> String {
    domain.trim().trim_end_matches('.').to_ascii_lowercase()
}
