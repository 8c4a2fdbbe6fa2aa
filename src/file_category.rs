//! Rule-based file categorization.
//!
//! Every [`CategoryDefinition`] scores a file independently from its extension,
//! keywords found in the name or path, and regex patterns matched against the
//! name. The [`Categorizer`] picks a single winner per file.
//!
//! # Examples
//!
//! ```
//! use chrono::Utc;
//! use cloudtidy::file_category::{Categorizer, CategoryDefinition, CategoryRegistry, DiagnosticLine};
//! use cloudtidy::file_record::FileRecord;
//!
//! let mut registry = CategoryRegistry::new("Other");
//! registry
//!     .push(CategoryDefinition::new("Finance", 60).unwrap().with_keywords(["invoice"]))
//!     .unwrap();
//!
//! let now = Utc::now();
//! let file = FileRecord::new("1", "invoice-2024-01-15.pdf", 0, now, now);
//! let mut lines: Vec<DiagnosticLine> = Vec::new();
//! let result = Categorizer::new(&registry).classify(&file, &mut lines);
//!
//! assert_eq!(result.category, "Finance");
//! assert_eq!(result.score, 60.0);
//! assert_eq!(lines.len(), 1);
//! ```

use crate::config::{ConfigError, ConfigWarning};
use crate::file_record::{FileRecord, normalize_extension, split_name};
use regex::{Regex, RegexBuilder};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use tracing::{debug, warn};

/// Points for an extension match.
pub const EXTENSION_POINTS: u64 = 100;
/// Points per distinct keyword match.
pub const KEYWORD_POINTS: u64 = 50;
/// Points per distinct pattern match.
pub const PATTERN_POINTS: u64 = 75;
/// Priority at which the raw score is left unscaled.
pub const PRIORITY_BASELINE: u64 = 50;

/// A named rule set used to classify files.
#[derive(Debug, Clone)]
pub struct CategoryDefinition {
    name: String,
    keywords: Vec<String>,
    extensions: Vec<String>,
    patterns: Vec<Regex>,
    priority: u32,
}

impl CategoryDefinition {
    /// Creates an empty definition.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidPriority`] when `priority` is zero.
    pub fn new(name: impl Into<String>, priority: u32) -> Result<Self, ConfigError> {
        let name = name.into();
        if priority == 0 {
            return Err(ConfigError::InvalidPriority {
                category: name,
                priority,
            });
        }

        Ok(Self {
            name,
            keywords: Vec::new(),
            extensions: Vec::new(),
            patterns: Vec::new(),
            priority,
        })
    }

    /// Adds keywords, lower-cased and de-duplicated.
    pub fn with_keywords<I, S>(mut self, keywords: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for keyword in keywords {
            let keyword = keyword.as_ref().trim().to_lowercase();
            if !keyword.is_empty() && !self.keywords.contains(&keyword) {
                self.keywords.push(keyword);
            }
        }
        self
    }

    /// Adds extensions, normalized to the `.ext` form.
    pub fn with_extensions<I, S>(mut self, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for ext in extensions {
            let ext = normalize_extension(ext.as_ref());
            if !ext.is_empty() && !self.extensions.contains(&ext) {
                self.extensions.push(ext);
            }
        }
        self
    }

    /// Compiles and adds case-insensitive patterns.
    ///
    /// A pattern that does not compile is dropped and reported as a warning;
    /// the remaining rules stay usable.
    pub fn with_patterns<I, S>(mut self, patterns: I) -> (Self, Vec<ConfigWarning>)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut warnings = Vec::new();
        for pattern in patterns {
            let pattern = pattern.as_ref();
            match RegexBuilder::new(pattern).case_insensitive(true).build() {
                Ok(regex) => self.patterns.push(regex),
                Err(e) => {
                    let warning = ConfigWarning::DroppedPattern {
                        category: self.name.clone(),
                        pattern: pattern.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{}", warning);
                    warnings.push(warning);
                }
            }
        }
        (self, warnings)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn priority(&self) -> u32 {
        self.priority
    }

    pub fn keywords(&self) -> &[String] {
        &self.keywords
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Returns the source text of the compiled patterns.
    pub fn patterns(&self) -> impl Iterator<Item = &str> {
        self.patterns.iter().map(Regex::as_str)
    }

    /// True when the definition has no rule that could ever match.
    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty() && self.extensions.is_empty() && self.patterns.is_empty()
    }

    /// Computes the unscaled score of a file against this definition.
    fn raw_score(&self, file: &FileView<'_>) -> RuleMatch {
        let mut matched = RuleMatch::default();

        if !file.extension.is_empty() && self.extensions.iter().any(|e| e == file.extension) {
            matched.raw += EXTENSION_POINTS;
            matched.rules.push(format!("extension:{}", file.extension));
        }

        for keyword in &self.keywords {
            let in_name = file.lower_name.contains(keyword.as_str());
            if in_name || file.segments.iter().any(|s| s.contains(keyword.as_str())) {
                matched.raw += KEYWORD_POINTS;
                matched.rules.push(format!("keyword:{}", keyword));
            }
        }

        for pattern in &self.patterns {
            if pattern.is_match(file.name) {
                matched.raw += PATTERN_POINTS;
                matched.rules.push(format!("pattern:{}", pattern.as_str()));
            }
        }

        matched
    }
}

#[derive(Debug, Default)]
struct RuleMatch {
    raw: u64,
    rules: Vec<String>,
}

/// Lower-cased views of a file, computed once per classification.
struct FileView<'f> {
    name: &'f str,
    lower_name: String,
    extension: &'f str,
    segments: Vec<String>,
}

impl<'f> FileView<'f> {
    fn new(file: &'f FileRecord) -> Self {
        Self {
            name: &file.name,
            lower_name: file.name.to_lowercase(),
            extension: &file.extension,
            segments: file
                .path
                .split('/')
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase)
                .collect(),
        }
    }
}

/// The immutable set of category definitions, in declaration order.
#[derive(Debug, Clone)]
pub struct CategoryRegistry {
    definitions: Vec<CategoryDefinition>,
    default_category: String,
}

impl CategoryRegistry {
    /// Creates a registry with no definitions.
    pub fn new(default_category: impl Into<String>) -> Self {
        Self {
            definitions: Vec::new(),
            default_category: default_category.into(),
        }
    }

    /// Appends a definition while the registry is being built.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::DuplicateCategory`] if the name is taken.
    pub fn push(&mut self, definition: CategoryDefinition) -> Result<(), ConfigError> {
        if self.get(definition.name()).is_some() {
            return Err(ConfigError::DuplicateCategory(definition.name));
        }
        self.definitions.push(definition);
        Ok(())
    }

    pub fn definitions(&self) -> &[CategoryDefinition] {
        &self.definitions
    }

    pub fn default_category(&self) -> &str {
        &self.default_category
    }

    pub fn get(&self, name: &str) -> Option<&CategoryDefinition> {
        self.definitions.iter().find(|d| d.name == name)
    }

    /// True for any defined category and for the default category.
    pub fn contains(&self, name: &str) -> bool {
        name == self.default_category || self.get(name).is_some()
    }

    /// All category names, default last.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.definitions.iter().map(|d| d.name()).collect();
        if !names.contains(&self.default_category.as_str()) {
            names.push(&self.default_category);
        }
        names
    }

    fn known_keywords(&self) -> HashSet<&str> {
        self.definitions
            .iter()
            .flat_map(|d| d.keywords.iter().map(String::as_str))
            .collect()
    }
}

/// Outcome of classifying one file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategorizationResult {
    pub file_id: String,
    pub category: String,
    /// Priority-scaled score; zero for the default category.
    pub score: f64,
    /// Human-readable rules that contributed, e.g. `keyword:invoice`.
    pub matched_rules: Vec<String>,
}

/// One categorization decision, as handed to a [`DiagnosticSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DiagnosticLine {
    pub file_name: String,
    pub category: String,
    pub score: f64,
    pub matched_rules: Vec<String>,
}

/// Receives one line per classified file.
pub trait DiagnosticSink {
    fn emit(&mut self, line: DiagnosticLine);
}

impl DiagnosticSink for Vec<DiagnosticLine> {
    fn emit(&mut self, line: DiagnosticLine) {
        self.push(line);
    }
}

/// Forwards decisions to `tracing` under the `cloudtidy::decisions` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&mut self, line: DiagnosticLine) {
        debug!(
            target: "cloudtidy::decisions",
            category = %line.category,
            score = line.score,
            rules = ?line.matched_rules,
            "{}",
            line.file_name
        );
    }
}

/// Discards every line.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl DiagnosticSink for NullSink {
    fn emit(&mut self, _line: DiagnosticLine) {}
}

/// Scores files against a [`CategoryRegistry`].
#[derive(Debug, Clone, Copy)]
pub struct Categorizer<'a> {
    registry: &'a CategoryRegistry,
}

impl<'a> Categorizer<'a> {
    pub fn new(registry: &'a CategoryRegistry) -> Self {
        Self { registry }
    }

    /// Classifies a file and emits its diagnostic line.
    ///
    /// The winner has the highest priority-scaled score. Ties go to the higher
    /// priority, then to the earlier declared category. Scores are compared as
    /// exact integers (`raw * priority`) before scaling.
    pub fn classify(&self, file: &FileRecord, sink: &mut dyn DiagnosticSink) -> CategorizationResult {
        let view = FileView::new(file);
        let mut best: Option<(&CategoryDefinition, u64, RuleMatch)> = None;

        for definition in &self.registry.definitions {
            let matched = definition.raw_score(&view);
            if matched.raw == 0 {
                continue;
            }
            let weighted = matched.raw * u64::from(definition.priority);

            let wins = match &best {
                None => true,
                Some((current, current_weighted, _)) => {
                    weighted > *current_weighted
                        || (weighted == *current_weighted && definition.priority > current.priority)
                }
            };
            if wins {
                best = Some((definition, weighted, matched));
            }
        }

        let result = match best {
            Some((definition, weighted, matched)) => CategorizationResult {
                file_id: file.id.clone(),
                category: definition.name.clone(),
                score: weighted as f64 / PRIORITY_BASELINE as f64,
                matched_rules: matched.rules,
            },
            None => CategorizationResult {
                file_id: file.id.clone(),
                category: self.registry.default_category.clone(),
                score: 0.0,
                matched_rules: Vec::new(),
            },
        };

        sink.emit(DiagnosticLine {
            file_name: file.name.clone(),
            category: result.category.clone(),
            score: result.score,
            matched_rules: result.matched_rules.clone(),
        });

        result
    }

    /// Counts how many files land in each category.
    ///
    /// Every known category appears in the result, including empty ones.
    pub fn category_statistics(&self, files: &[FileRecord]) -> BTreeMap<String, usize> {
        let mut stats: BTreeMap<String, usize> = self
            .registry
            .names()
            .into_iter()
            .map(|name| (name.to_string(), 0))
            .collect();

        for file in files {
            let result = self.classify(file, &mut NullSink);
            *stats.entry(result.category).or_insert(0) += 1;
        }
        stats
    }

    /// Suggests candidate keywords from a sample of file names.
    ///
    /// File stems are split on non-alphanumeric characters. Tokens shorter than
    /// three characters and tokens that already are a keyword somewhere are
    /// dropped. The rest are ranked by frequency, ties by first appearance.
    /// The registry is never modified.
    pub fn suggest<S: AsRef<str>>(&self, filenames: &[S]) -> Vec<(String, usize)> {
        let known = self.registry.known_keywords();
        // token -> (count, first seen)
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut seen = 0usize;

        for filename in filenames {
            let (stem, _) = split_name(filename.as_ref());
            for token in stem
                .to_lowercase()
                .split(|c: char| !c.is_alphanumeric())
                .filter(|t| t.chars().count() >= 3)
            {
                if known.contains(token) {
                    continue;
                }
                let entry = counts.entry(token.to_string()).or_insert((0, seen));
                entry.0 += 1;
                seen += 1;
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1.0.cmp(&a.1.0).then(a.1.1.cmp(&b.1.1)));
        ranked
            .into_iter()
            .map(|(token, (count, _))| (token, count))
            .collect()
    }
}
