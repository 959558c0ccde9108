//! Crawl settings and the submission form they are validated from.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use url::Url;

use super::schedule::ScheduleCadence;

/// Characters that stay live inside a double-quoted STANDARD argument.
///
/// Everything else (`&`, `?`, `*`, `;` ...) is neutralized by quoting when
/// the command line is built.
const SHELL_META: &[char] = &['"', '`', '$', '\\'];

/// Highest accepted `-N` structure option.
pub const MAX_STRUCTURE: u8 = 5;

/// Which half of the form a submission populated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SettingType {
    #[default]
    Standard,
    Advanced,
}

impl SettingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SettingType::Standard => "standard",
            SettingType::Advanced => "advanced",
        }
    }
}

/// How the crawler treats robots.txt and meta robots tags (`-s` flag).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RobotsPolicy {
    /// Ignore all metadata and robots.txt.
    Ignore = 0,
    /// Check all file types without directories.
    Files = 1,
    /// Check all file types including directories.
    Full = 2,
}

impl RobotsPolicy {
    pub fn flag_value(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for RobotsPolicy {
    type Error = ValidationError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(RobotsPolicy::Ignore),
            1 => Ok(RobotsPolicy::Files),
            2 => Ok(RobotsPolicy::Full),
            other => Err(ValidationError::RobotsOutOfRange(other)),
        }
    }
}

impl From<RobotsPolicy> for u8 {
    fn from(policy: RobotsPolicy) -> u8 {
        policy.flag_value()
    }
}

/// Settings for a STANDARD crawl.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StandardSettings {
    pub url: String,
    pub include_domains: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    pub robots: RobotsPolicy,
    /// Local site structure (`-N` flag), 0 = default structure.
    pub structure: u8,
}

/// Validated crawl settings. Exactly one mode is populated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum CrawlSettings {
    Standard(StandardSettings),
    /// Raw crawler arguments passed through verbatim.
    Advanced { arguments: String },
}

impl CrawlSettings {
    pub fn setting_type(&self) -> SettingType {
        match self {
            CrawlSettings::Standard(_) => SettingType::Standard,
            CrawlSettings::Advanced { .. } => SettingType::Advanced,
        }
    }

    /// URL to show the user in listings and emails.
    pub fn display_url(&self) -> String {
        match self {
            CrawlSettings::Standard(s) => s.url.clone(),
            CrawlSettings::Advanced { arguments } => crate::crawler::command::extract_urls(arguments)
                .into_iter()
                .next()
                .map(|u| u.to_string())
                .unwrap_or_else(|| arguments.clone()),
        }
    }
}

/// A validation failure, reported synchronously to the submitter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("A URL to archive is required")]
    MissingUrl,

    #[error("Not a valid http(s) URL: {0}")]
    InvalidUrl(String),

    #[error("At least one domain to include is required")]
    MissingIncludeDomains,

    #[error("Invalid characters in {field}: {value}")]
    UnsafeValue { field: &'static str, value: String },

    #[error("Robots policy must be between 0 and 2, got {0}")]
    RobotsOutOfRange(u8),

    #[error("Structure option must be between 0 and 5, got {0}")]
    StructureOutOfRange(u8),

    #[error("Advanced settings require crawler arguments")]
    MissingAdvancedArguments,

    #[error("Advanced settings are disabled on this server")]
    AdvancedDisabled,

    #[error("Not a valid email address: {0}")]
    InvalidEmail(String),
}

/// Raw archive submission as posted by a client.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ArchiveRequest {
    #[serde(default)]
    pub setting_type: SettingType,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub include_domains: Vec<String>,
    #[serde(default)]
    pub exclude_paths: Vec<String>,
    #[serde(default)]
    pub robots: u8,
    #[serde(default)]
    pub structure: u8,
    #[serde(default)]
    pub advanced_setting: Option<String>,
    pub email: String,
    /// Set to create a recurring job instead of running once.
    #[serde(default)]
    pub schedule: Option<ScheduleCadence>,
}

/// Output of a successful validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub settings: CrawlSettings,
    pub email: String,
    pub schedule: Option<ScheduleCadence>,
}

impl ArchiveRequest {
    /// Validate the submission into typed crawl settings.
    pub fn validate(&self) -> Result<ValidatedRequest, ValidationError> {
        let email = validate_email(&self.email)?;

        let settings = match self.setting_type {
            SettingType::Standard => CrawlSettings::Standard(self.validate_standard()?),
            SettingType::Advanced => {
                let arguments = self
                    .advanced_setting
                    .as_deref()
                    .map(str::trim)
                    .unwrap_or_default();
                if arguments.is_empty() {
                    return Err(ValidationError::MissingAdvancedArguments);
                }
                CrawlSettings::Advanced {
                    arguments: arguments.to_string(),
                }
            }
        };

        Ok(ValidatedRequest {
            settings,
            email,
            schedule: self.schedule,
        })
    }

    fn validate_standard(&self) -> Result<StandardSettings, ValidationError> {
        let url = self
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or(ValidationError::MissingUrl)?;

        match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") && parsed.host().is_some() => {}
            _ => return Err(ValidationError::InvalidUrl(url.to_string())),
        }
        check_shell_safe("url", url)?;

        let include_domains = non_empty(&self.include_domains);
        if include_domains.is_empty() {
            return Err(ValidationError::MissingIncludeDomains);
        }
        for domain in &include_domains {
            check_shell_safe("include_domains", domain)?;
        }

        // Trailing slashes are dropped so "/private/" and "/private" build the same filter.
        let exclude_paths: Vec<String> = non_empty(&self.exclude_paths)
            .into_iter()
            .map(|p| p.trim_end_matches('/').to_string())
            .filter(|p| !p.is_empty())
            .collect();
        for path in &exclude_paths {
            check_shell_safe("exclude_paths", path)?;
        }

        let robots = RobotsPolicy::try_from(self.robots)?;
        if self.structure > MAX_STRUCTURE {
            return Err(ValidationError::StructureOutOfRange(self.structure));
        }

        Ok(StandardSettings {
            url: url.to_string(),
            include_domains,
            exclude_paths,
            robots,
            structure: self.structure,
        })
    }
}

fn non_empty(values: &[String]) -> Vec<String> {
    values
        .iter()
        .map(|v| v.trim())
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .collect()
}

fn check_shell_safe(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value
        .chars()
        .any(|c| c.is_whitespace() || c.is_control() || SHELL_META.contains(&c))
    {
        return Err(ValidationError::UnsafeValue {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<String, ValidationError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if valid {
        Ok(email.to_string())
    } else {
        Err(ValidationError::InvalidEmail(email.to_string()))
    }
}
