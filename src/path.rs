//! Path-pattern compiler.
//!
//! Turns a route pattern such as `/users/:id/settings` into an activity
//! predicate. Static parts match literally (case-insensitive); `:name`
//! segments match one non-empty path segment. Without `exact`, a pattern
//! also matches any deeper path and a trailing `#fragment`.

use std::sync::Arc;

use regex::{Regex, RegexBuilder};

use crate::activity::ActivityFn;
use crate::domain::Location;

/// Matches one dynamic segment, with an optional trailing slash.
const DYNAMIC_SEGMENT: &str = "[^/]+/?";

/// Compile `path` into a predicate over [`Location::route`].
///
/// # Errors
///
/// Returns an error if the generated expression fails to compile.
pub fn path_to_active_when(path: &str, exact: bool) -> Result<ActivityFn, regex::Error> {
    let regex = path_regex(path, exact)?;
    Ok(Arc::new(move |location: &Location| {
        regex.is_match(&location.route())
    }))
}

/// Build the anchored, case-insensitive expression for a pattern.
///
/// # Errors
///
/// Returns an error if the generated expression fails to compile.
pub fn path_regex(path: &str, exact: bool) -> Result<Regex, regex::Error> {
    let path = if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    };

    let mut builder = PatternBuilder {
        path: &path,
        exact,
        expr: String::from("^"),
        last_index: 0,
        in_dynamic: false,
    };

    for (index, ch) in path.char_indices() {
        let start_of_dynamic = !builder.in_dynamic && ch == ':';
        let end_of_dynamic = builder.in_dynamic && ch == '/';
        if start_of_dynamic || end_of_dynamic {
            builder.append(index);
        }
    }
    builder.append(path.len());

    RegexBuilder::new(&builder.expr)
        .case_insensitive(true)
        .build()
}

struct PatternBuilder<'a> {
    path: &'a str,
    exact: bool,
    expr: String,
    last_index: usize,
    in_dynamic: bool,
}

impl PatternBuilder<'_> {
    fn append(&mut self, index: usize) {
        if self.in_dynamic {
            self.expr.push_str(DYNAMIC_SEGMENT);
        } else {
            self.expr
                .push_str(&regex::escape(&self.path[self.last_index..index]));
        }

        if index == self.path.len() {
            if self.in_dynamic {
                if self.exact {
                    self.expr.push('$');
                }
            } else {
                let suffix = if self.exact { "" } else { ".*" };
                if self.expr.ends_with('/') {
                    self.expr.push_str(suffix);
                    self.expr.push('$');
                } else {
                    self.expr.push_str(&format!("(/{suffix})?(#.*)?$"));
                }
            }
        }

        self.in_dynamic = !self.in_dynamic;
        self.last_index = index;
    }
}
