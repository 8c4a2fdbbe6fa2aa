//! Configuration loading and compilation.
//!
//! Configuration is read from TOML and compiled once at startup into a
//! [`CategoryRegistry`] and [`PlanSettings`]. Problems that only affect a
//! single rule (a regex that does not compile, an unknown template
//! placeholder) become [`ConfigWarning`]s; everything else is a
//! [`ConfigError`] and aborts the run.
//!
//! # Configuration File Format
//!
//! ```toml
//! [organization]
//! destination_root = "Organized"
//! folder_structure = "{category}/{year}/{month}"
//! date_field = "created"
//! history_dir = ".cloudtidy/history"
//!
//! [limits]
//! max_files_per_run = 500
//! exclude_extensions = [".tmp", "part"]
//! exclude_patterns = ["**/node_modules/**"]
//! min_age_days = 7
//!
//! [categories]
//! default_category = "Other"
//!
//! [categories.definitions.Finance]
//! keywords = ["invoice", "receipt"]
//! patterns = ['(?:USD|EUR|\$)\s*\d+']
//! priority = 60
//! ```
//!
//! Category definitions keep their declaration order, which is the final
//! tie-break between equally scored categories. When `definitions` is absent
//! the built-in set is used.

use crate::file_category::{CategoryDefinition, CategoryRegistry};
use crate::file_record::{DateField, normalize_extension};
use crate::path_template::{join_path, unknown_placeholders};
use crate::planner::{PlanLimits, PlanSettings};
use glob::Pattern;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};

/// Errors that abort configuration loading.
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    /// Configuration file not found at the specified path.
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),
    /// Invalid TOML syntax or structure.
    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),
    /// IO error while reading configuration.
    #[error("IO error reading configuration: {0}")]
    IoError(String),
    /// Invalid exclude glob pattern.
    #[error("Invalid glob pattern '{pattern}': {reason}")]
    InvalidGlobPattern { pattern: String, reason: String },
    /// Category priority must be positive.
    #[error("Category '{category}' has invalid priority {priority}: must be greater than 0")]
    InvalidPriority { category: String, priority: u32 },
    /// Category declares no keywords, extensions or patterns.
    #[error("Category '{0}' has no keywords, extensions or patterns")]
    EmptyCategory(String),
    /// The same category name was declared twice.
    #[error("Category '{0}' is defined more than once")]
    DuplicateCategory(String),
    /// `destination_root` names no folder.
    #[error("destination_root must name a folder")]
    EmptyDestinationRoot,
}

/// Non-fatal configuration problems, reported once at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigWarning {
    /// A regex pattern failed to compile and was dropped from its category.
    DroppedPattern {
        category: String,
        pattern: String,
        reason: String,
    },
    /// The folder template uses a placeholder that is left literal.
    UnknownPlaceholder(String),
}

impl fmt::Display for ConfigWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigWarning::DroppedPattern {
                category,
                pattern,
                reason,
            } => write!(
                f,
                "Dropped pattern '{}' from category '{}': {}",
                pattern, category, reason
            ),
            ConfigWarning::UnknownPlaceholder(name) => write!(
                f,
                "Unknown placeholder '{{{}}}' in folder structure will be kept literally",
                name
            ),
        }
    }
}

/// Root configuration document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub organization: OrganizationConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub categories: CategoriesConfig,
}

/// Where and how organized files are laid out.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrganizationConfig {
    #[serde(default = "default_destination_root")]
    pub destination_root: String,
    #[serde(default = "default_folder_structure")]
    pub folder_structure: String,
    #[serde(default)]
    pub date_field: DateField,
    /// History directory, relative to the organized directory.
    #[serde(default = "default_history_dir")]
    pub history_dir: String,
}

fn default_destination_root() -> String {
    "Organized".to_string()
}

fn default_folder_structure() -> String {
    "{category}/{year}/{month}".to_string()
}

fn default_history_dir() -> String {
    ".cloudtidy/history".to_string()
}

impl Default for OrganizationConfig {
    fn default() -> Self {
        Self {
            destination_root: default_destination_root(),
            folder_structure: default_folder_structure(),
            date_field: DateField::default(),
            history_dir: default_history_dir(),
        }
    }
}

/// Per-run limits and filters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LimitsConfig {
    /// Maximum number of moves per run; unlimited when absent.
    #[serde(default)]
    pub max_files_per_run: Option<usize>,
    /// Extensions never moved (e.g. ".tmp" or "tmp").
    #[serde(default)]
    pub exclude_extensions: Vec<String>,
    /// Glob patterns matched against the source path.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Files younger than this many days are left alone.
    #[serde(default)]
    pub min_age_days: u32,
}

/// Category rule sets, keyed by category name in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesConfig {
    #[serde(default = "default_category_name")]
    pub default_category: String,
    #[serde(default = "builtin_definitions")]
    pub definitions: toml::Table,
}

fn default_category_name() -> String {
    "Other".to_string()
}

impl Default for CategoriesConfig {
    fn default() -> Self {
        Self {
            default_category: default_category_name(),
            definitions: builtin_definitions(),
        }
    }
}

/// One category entry as written in the configuration file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryRule {
    #[serde(default)]
    pub keywords: Vec<String>,
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub patterns: Vec<String>,
    #[serde(default = "default_priority")]
    pub priority: u32,
}

fn default_priority() -> u32 {
    50
}

impl CategoryRule {
    fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.extensions.is_empty() && self.patterns.is_empty()
    }
}

/// The validated, immutable result of [`Config::compile`].
#[derive(Debug, Clone)]
pub struct CompiledConfig {
    pub registry: CategoryRegistry,
    pub settings: PlanSettings,
    /// History directory, relative to the organized directory.
    pub history_dir: PathBuf,
    pub warnings: Vec<ConfigWarning>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.cloudtidy.toml` in the current directory
    /// 3. Look for `~/.config/cloudtidy/config.toml` in home directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file exists but cannot be read or
    /// parsed, or if an explicitly provided file does not exist.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(".cloudtidy.toml");
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config")
                .join("cloudtidy")
                .join("config.toml");
            if home_config.exists() {
                return Self::load_from_file(&home_config);
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::IoError(e.to_string()))?;
        debug!(path = %path.display(), "Loaded configuration file");
        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validate the configuration and build the runtime structures.
    ///
    /// # Errors
    ///
    /// Returns an error for malformed category entries, non-positive
    /// priorities, empty rule sets, duplicate names and invalid glob patterns.
    /// Regexes that do not compile only produce warnings.
    pub fn compile(self) -> Result<CompiledConfig, ConfigError> {
        if join_path([self.organization.destination_root.as_str()]).is_empty() {
            return Err(ConfigError::EmptyDestinationRoot);
        }

        let mut warnings = Vec::new();
        let registry = compile_categories(&self.categories, &mut warnings)?;

        for name in unknown_placeholders(&self.organization.folder_structure) {
            let warning = ConfigWarning::UnknownPlaceholder(name);
            warn!("{}", warning);
            warnings.push(warning);
        }

        let exclude_patterns = self
            .limits
            .exclude_patterns
            .iter()
            .map(|pattern| {
                Pattern::new(pattern).map_err(|e| ConfigError::InvalidGlobPattern {
                    pattern: pattern.clone(),
                    reason: e.to_string(),
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let exclude_extensions: HashSet<String> = self
            .limits
            .exclude_extensions
            .iter()
            .map(|ext| normalize_extension(ext))
            .filter(|ext| !ext.is_empty())
            .collect();

        let settings = PlanSettings::new(
            self.organization.destination_root,
            self.organization.folder_structure,
        )
        .with_date_field(self.organization.date_field)
        .with_limits(PlanLimits {
            max_files_per_run: self.limits.max_files_per_run,
            exclude_extensions,
            exclude_patterns,
            min_age_days: self.limits.min_age_days,
        });

        Ok(CompiledConfig {
            registry,
            settings,
            history_dir: PathBuf::from(self.organization.history_dir),
            warnings,
        })
    }
}

fn compile_categories(
    config: &CategoriesConfig,
    warnings: &mut Vec<ConfigWarning>,
) -> Result<CategoryRegistry, ConfigError> {
    let mut registry = CategoryRegistry::new(config.default_category.clone());

    for (name, value) in &config.definitions {
        let rule: CategoryRule = value
            .clone()
            .try_into()
            .map_err(|e| ConfigError::ConfigInvalid(format!("category '{}': {}", name, e)))?;

        if rule.is_empty() {
            if *name == config.default_category {
                // the default category is reached by elimination only
                continue;
            }
            return Err(ConfigError::EmptyCategory(name.clone()));
        }

        let (definition, dropped) = CategoryDefinition::new(name.clone(), rule.priority)?
            .with_keywords(&rule.keywords)
            .with_extensions(&rule.extensions)
            .with_patterns(&rule.patterns);
        warnings.extend(dropped);
        registry.push(definition)?;
    }

    debug!(
        categories = registry.definitions().len(),
        default = registry.default_category(),
        "Category registry built"
    );
    Ok(registry)
}

/// Parses the built-in category table.
pub fn builtin_definitions() -> toml::Table {
    toml::from_str(BUILTIN_CATEGORIES).expect("built-in category table is valid TOML")
}

const BUILTIN_CATEGORIES: &str = r#"
[Finance]
keywords = [
    "invoice", "receipt", "bill", "payment", "transaction", "bank", "statement",
    "tax", "expense", "budget", "payroll", "salary", "credit", "debit",
    "financial", "accounting", "quickbooks", "mint", "venmo", "paypal",
]
patterns = ['\d{4}[-_]?\d{2}[-_]?\d{2}.*(?:invoice|receipt|bill)', '(?:USD|EUR|GBP|\$)\s*\d+']
priority = 60

[Pictures]
keywords = ["photo", "image", "picture", "img", "pic", "camera", "screenshot", "wallpaper", "avatar"]
extensions = [".jpg", ".jpeg", ".png", ".gif", ".bmp", ".tiff", ".heic", ".webp", ".svg", ".raw", ".cr2", ".nef"]
patterns = ['IMG_\d+', 'DSC\d+', 'DCIM', '\d{8}_\d{6}']
priority = 70

[Videos]
keywords = ["video", "movie", "film", "clip", "recording"]
extensions = [".mp4", ".avi", ".mov", ".wmv", ".flv", ".mkv", ".webm", ".m4v", ".mpg", ".mpeg"]
patterns = ['VID_\d+']
priority = 70

[Traffic_Tickets]
keywords = ["ticket", "citation", "violation", "speeding", "parking", "traffic", "fine", "dmv", "vehicle", "court"]
patterns = ['ticket.*\d+', 'citation.*\d+', 'violation.*\d+']
priority = 80

[Government_Documents]
keywords = [
    "passport", "license", "ssn", "birth certificate", "marriage", "divorce",
    "deed", "title", "registration", "visa", "permit", "tax return", "w2", "w-2",
    "1099", "social security", "medicare", "voter", "legal", "court", "contract",
    "government", "official", "dmv", "irs", "state", "federal",
]
patterns = ['w[-_]?2', '1099', 'tax.*return', 'form.*\d+']
priority = 90

[Medical]
keywords = [
    "medical", "health", "doctor", "hospital", "prescription", "insurance",
    "claim", "diagnosis", "lab", "results", "appointment", "vaccine",
    "immunization", "patient", "medication", "pharmacy", "eob", "billing",
]
patterns = ['medical.*record', 'lab.*result']
priority = 75

[Insurance]
keywords = [
    "insurance", "policy", "coverage", "claim", "premium", "deductible",
    "beneficiary", "auto insurance", "home insurance", "life insurance",
    "health insurance",
]
patterns = ['policy.*\d+', 'claim.*\d+']
priority = 75

[Work]
keywords = [
    "work", "project", "presentation", "meeting", "report", "proposal",
    "contract", "agreement", "memo", "employee", "employer", "job", "resume",
    "cv", "offer letter",
]
extensions = [".pptx", ".ppt", ".xlsx", ".xls", ".docx", ".doc"]
priority = 55

[Education]
keywords = [
    "school", "university", "college", "course", "homework", "assignment",
    "lecture", "notes", "syllabus", "grade", "transcript", "diploma", "degree",
    "certificate", "student", "textbook", "exam", "test", "quiz",
]
priority = 60

[Personal]
keywords = ["personal", "private", "family", "journal", "diary", "letter", "card", "note", "memory", "keepsake"]
priority = 50

[Travel]
keywords = [
    "travel", "trip", "vacation", "hotel", "flight", "booking", "reservation",
    "itinerary", "boarding pass", "passport", "visa", "destination", "tour",
    "ticket",
]
patterns = ['booking.*\d+', 'confirmation.*\d+']
priority = 65

[Utilities]
keywords = [
    "utility", "electric", "gas", "water", "internet", "phone", "cable", "bill",
    "pg&e", "comcast", "att", "verizon", "spectrum",
]
priority = 60

[Real_Estate]
keywords = [
    "property", "house", "apartment", "lease", "rent", "mortgage", "deed",
    "title", "closing", "escrow", "inspection", "appraisal", "real estate",
    "realtor", "landlord", "tenant",
]
priority = 70
"#;
