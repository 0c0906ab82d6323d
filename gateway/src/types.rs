use serde::{Deserialize, Serialize};

/// License attached to a repository, as reported by the upstream API.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct License {
    pub key: String,
    pub name: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub login: String,
    #[serde(rename = "type")]
    pub kind: String,
}

/// One upstream repository. Records are only created by decoding upstream
/// responses and are passed through to callers unchanged.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRecord {
    /// `owner/repo`, unique per repository.
    pub full_name: String,
    pub description: Option<String>,
    pub html_url: String,
    pub language: Option<String>,
    pub license: Option<License>,
    pub owner: Owner,
    #[serde(default)]
    pub stargazers_count: u64,
    pub created_at: String,
}

impl RepositoryRecord {
    pub fn license_key(&self) -> Option<&str> {
        self.license.as_ref().map(|l| l.key.as_str())
    }
}

/// Caller supplied filters for one repositories request.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FilterSpec {
    pub language: Option<String>,
    pub license: Option<String>,
    pub organization: Option<String>,
}

impl FilterSpec {
    /// Builds a filter from raw query values. Empty values count as absent.
    pub fn new(
        language: Option<String>,
        license: Option<String>,
        organization: Option<String>,
    ) -> Self {
        fn non_empty(value: Option<String>) -> Option<String> {
            value.filter(|v| !v.is_empty())
        }

        FilterSpec {
            language: non_empty(language),
            license: non_empty(license),
            organization: non_empty(organization),
        }
    }

    /// Returns true if the record passes the language and license filters.
    /// A record without a language or license never matches a filter on it.
    pub fn matches(&self, record: &RepositoryRecord) -> bool {
        let language_ok = match &self.language {
            Some(language) => record.language.as_deref() == Some(language.as_str()),
            None => true,
        };
        let license_ok = match &self.license {
            Some(license) => record.license_key() == Some(license.as_str()),
            None => true,
        };

        language_ok && license_ok
    }
}
