use serde::{Deserialize, Deserializer, Serialize};

/// Deserialize a `T` that implements `Default` — treats JSON `null` the same as
/// a missing field (returns `T::default()`).  Use with:
///   `#[serde(default, deserialize_with = "deserialize_null_default")]`
fn deserialize_null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Top-level routing configuration: an ordered list of host rules.
///
/// Declaration order is meaningful. Rules are consulted in the order they
/// appear here, and within a rule the paths keep their declared order for
/// leaf tie-breaking.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RouterConfig {
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub rules: Vec<RuleConfig>,
}

/// A host rule: pre-filters requests by host before the rule's paths are
/// searched.
///
/// Either field may be set, both, or neither. A rule with neither is a
/// catch-all that accepts every host. `host` is compared byte-for-byte
/// against the request host after port stripping; `host_regexp` is
/// compiled exactly as written.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuleConfig {
    #[serde(default)]
    pub host: Option<String>,

    #[serde(default)]
    pub host_regexp: Option<String>,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub paths: Vec<PathConfig>,
}

/// A single path declaration under a host rule.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PathConfig {
    /// Path pattern. Static bytes match themselves; `{name}` captures one
    /// segment; `{name:regex}` constrains the capture; a trailing `*`
    /// captures the remainder under the key `*`.
    #[serde(default)]
    pub path: String,

    /// Opaque backend handle handed back to the caller on a match.
    pub backend: String,

    /// Accepted HTTP methods. Empty means all methods.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub methods: Vec<String>,

    /// Header predicates evaluated at the leaf. With `match_all_headers`
    /// every predicate must hold; otherwise one holding predicate is
    /// enough.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub headers: Vec<KeyMatcher>,

    /// Query predicates evaluated at the leaf. Every predicate must hold.
    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub queries: Vec<KeyMatcher>,

    #[serde(default)]
    pub match_all_headers: bool,
}

/// A header or query predicate: a key plus an optional fixed value set
/// and an optional regex. The request's value for the key (missing keys
/// read as the empty string) is tested against whichever constraints are
/// present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KeyMatcher {
    pub key: String,

    /// Regex source, compiled as written. An empty string counts as
    /// absent.
    #[serde(default)]
    pub regexp: Option<String>,

    #[serde(default, deserialize_with = "deserialize_null_default")]
    pub values: Vec<String>,
}
