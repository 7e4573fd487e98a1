//! Activation context: the location applications are reconciled against.

use std::fmt;

use url::Url;

/// Origin used when a location is built from a bare path.
const DEFAULT_ORIGIN: &str = "http://localhost";

/// The current navigable location.
///
/// Wraps a parsed URL so activity predicates can inspect the path, query,
/// or fragment without re-parsing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    url: Url,
}

impl Location {
    /// Parse an absolute URL.
    ///
    /// # Errors
    ///
    /// Returns an error if `href` is not a valid absolute URL.
    pub fn parse(href: &str) -> Result<Self, url::ParseError> {
        Url::parse(href).map(|url| Self { url })
    }

    /// Build a location from a path (optionally with query and fragment)
    /// relative to a local origin.
    ///
    /// # Errors
    ///
    /// Returns an error if the path cannot be joined onto the origin.
    pub fn from_path(path: &str) -> Result<Self, url::ParseError> {
        let base = Url::parse(DEFAULT_ORIGIN)?;
        base.join(path).map(|url| Self { url })
    }

    /// The full URL.
    pub fn url(&self) -> &Url {
        &self.url
    }

    /// The full URL as a string.
    pub fn href(&self) -> &str {
        self.url.as_str()
    }

    /// The URL path, always starting with `/`.
    pub fn path(&self) -> &str {
        self.url.path()
    }

    /// The query string without the leading `?`.
    pub fn query(&self) -> Option<&str> {
        self.url.query()
    }

    /// The fragment without the leading `#`.
    pub fn fragment(&self) -> Option<&str> {
        self.url.fragment()
    }

    /// The route used for path-pattern matching.
    ///
    /// This is the href with the origin and query removed, so it keeps any
    /// `#fragment` (hash routing), truncated at the first `?`.
    pub fn route(&self) -> String {
        let mut route = self.url.path().to_string();
        if let Some(fragment) = self.url.fragment() {
            route.push('#');
            route.push_str(fragment);
        }
        match route.find('?') {
            Some(index) => route[..index].to_string(),
            None => route,
        }
    }
}

impl Default for Location {
    fn default() -> Self {
        Self {
            url: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
        }
    }
}

impl From<Url> for Location {
    fn from(url: Url) -> Self {
        Self { url }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.url.as_str())
    }
}
