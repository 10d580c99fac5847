use std::fmt;

/// Build-time failures surfaced while compiling routing rules.
///
/// Matching never produces an error: a request either yields a route or
/// "no match". Everything here is a mistake in a rule declaration and
/// fails router construction as a whole.
#[derive(Debug)]
pub enum RouterError {
    /// A path pattern that cannot be parsed: unmatched `{`, an empty
    /// parameter key, or a `*` that is not the final character.
    Pattern { pattern: String, reason: String },
    /// The same parameter key appears twice in one pattern (`*` counts).
    DuplicateParamKey { pattern: String, key: String },
    /// A regex in a pattern, header, query, or host predicate failed to
    /// compile.
    Regex { pattern: String, source: regex::Error },
}

impl fmt::Display for RouterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RouterError::Pattern { pattern, reason } => {
                write!(f, "invalid pattern '{}': {}", pattern, reason)
            }
            RouterError::DuplicateParamKey { pattern, key } => {
                write!(
                    f,
                    "pattern '{}' contains duplicate param key '{}'",
                    pattern, key
                )
            }
            RouterError::Regex { pattern, source } => {
                write!(f, "invalid regex '{}': {}", pattern, source)
            }
        }
    }
}

impl std::error::Error for RouterError {}
