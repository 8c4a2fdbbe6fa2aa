//! Destination folder templates.
//!
//! A template such as `{category}/{year}/{month}` is expanded per file into a
//! `/`-separated folder path. Recognized placeholders:
//!
//! | placeholder  | expands to                     |
//! |--------------|--------------------------------|
//! | `{year}`     | `2024`                         |
//! | `{month}`    | `01_January`                   |
//! | `{day}`      | `05`                           |
//! | `{quarter}`  | `Q1` .. `Q4`                   |
//! | `{category}` | the category name, verbatim    |
//!
//! Anything else in braces is left untouched.

use chrono::{DateTime, Datelike, Utc};
use regex::{Captures, Regex};
use std::sync::LazyLock;

static PLACEHOLDER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{(\w+)\}").expect("placeholder regex is valid"));

/// Placeholders understood by [`build_path`].
pub const KNOWN_PLACEHOLDERS: [&str; 5] = ["year", "month", "day", "quarter", "category"];

/// Expands `template` for one file.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use cloudtidy::path_template::build_path;
///
/// let ts = Utc.with_ymd_and_hms(2024, 8, 3, 0, 0, 0).unwrap();
/// assert_eq!(
///     build_path("Finance", ts, "{category}//{year}/{quarter}/{month}"),
///     "Finance/2024/Q3/08_August"
/// );
/// ```
pub fn build_path(category: &str, timestamp: DateTime<Utc>, template: &str) -> String {
    let expanded = PLACEHOLDER.replace_all(template, |caps: &Captures<'_>| match &caps[1] {
        "year" => format!("{:04}", timestamp.year()),
        "month" => timestamp.format("%m_%B").to_string(),
        "day" => format!("{:02}", timestamp.day()),
        "quarter" => format!("Q{}", (timestamp.month() - 1) / 3 + 1),
        "category" => category.to_string(),
        _ => caps[0].to_string(),
    });
    join_path([&*expanded])
}

/// Lists placeholders in `template` that [`build_path`] leaves literal.
pub fn unknown_placeholders(template: &str) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    for caps in PLACEHOLDER.captures_iter(template) {
        let name = &caps[1];
        if !KNOWN_PLACEHOLDERS.contains(&name) && !unknown.iter().any(|u| u == name) {
            unknown.push(name.to_string());
        }
    }
    unknown
}

/// Joins path pieces with `/`, collapsing empty segments.
pub fn join_path<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

/// Recognizes paths that already sit inside the organized structure.
///
/// A path is organized when it lies under the destination root and its leading
/// folders have the shape the template would produce.
#[derive(Debug, Clone)]
pub struct OrganizedLayout {
    pattern: Regex,
}

impl OrganizedLayout {
    /// Builds the matcher for a destination root and template.
    ///
    /// # Errors
    ///
    /// Fails only if the generated expression exceeds regex size limits.
    pub fn new(destination_root: &str, template: &str) -> Result<Self, regex::Error> {
        let mut expr = String::from("^");
        for segment in join_path([destination_root]).split('/').filter(|s| !s.is_empty()) {
            expr.push_str(&regex::escape(segment));
            expr.push('/');
        }
        for segment in join_path([template]).split('/').filter(|s| !s.is_empty()) {
            expr.push_str(&segment_expr(segment));
            expr.push('/');
        }
        Ok(Self {
            pattern: Regex::new(&expr)?,
        })
    }

    /// True when `path` is a file inside the organized structure.
    pub fn matches(&self, path: &str) -> bool {
        self.pattern.is_match(path)
    }
}

fn segment_expr(segment: &str) -> String {
    let mut expr = String::new();
    let mut last = 0;
    for caps in PLACEHOLDER.captures_iter(segment) {
        let whole = caps.get(0).expect("group 0 always participates");
        expr.push_str(&regex::escape(&segment[last..whole.start()]));
        expr.push_str(match &caps[1] {
            "year" => r"\d{4}",
            "month" => r"\d{2}_[A-Za-z]+",
            "day" => r"\d{2}",
            "quarter" => r"Q[1-4]",
            "category" => r"[^/]+",
            _ => "",
        });
        if !KNOWN_PLACEHOLDERS.contains(&&caps[1]) {
            expr.push_str(&regex::escape(whole.as_str()));
        }
        last = whole.end();
    }
    expr.push_str(&regex::escape(&segment[last..]));
    expr
}
