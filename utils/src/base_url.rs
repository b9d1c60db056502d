use url::{ParseError, Url};

/// Resolve `target` against an optional base URL.
/// Absolute targets are returned as-is, relative ones require a base.
pub fn resolve(base: Option<&str>, target: &str) -> Result<Url, ParseError> {
    match Url::parse(target) {
        Ok(url) => Ok(url),
        Err(ParseError::RelativeUrlWithoutBase) => match base {
            Some(base) => Url::parse(base)?.join(target),
            None => Err(ParseError::RelativeUrlWithoutBase),
        },
        Err(err) => Err(err),
    }
}
