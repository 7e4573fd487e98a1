//! Handler for the `match` command.

use crate::cli::{output, MatchArgs};
use crate::domain::Location;
use crate::error::{RegistrationError, Result};
use crate::path::path_regex;

/// Compile `pattern` and report whether it matches `location`.
pub fn execute(args: &MatchArgs) -> Result<()> {
    let regex = path_regex(&args.pattern, args.exact).map_err(|err| {
        RegistrationError::InvalidArgument(format!("pattern '{}': {err}", args.pattern))
    })?;
    let location = if args.location.contains("://") {
        Location::parse(&args.location)?
    } else {
        Location::from_path(&args.location)?
    };
    let route = location.route();

    output::key_value("Pattern:", &args.pattern);
    output::key_value("Regex:", regex.as_str());
    output::key_value("Route:", &route);
    if regex.is_match(&route) {
        output::ok("matches");
    } else {
        output::warn("does not match");
    }
    Ok(())
}
