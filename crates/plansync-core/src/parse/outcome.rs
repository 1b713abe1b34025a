use std::fmt;

/// Failure value returned by every parser entry point.
///
/// Parsers never panic and never raise: they return either a fully
/// populated record or a `ParseFailure` whose `partial` payload carries
/// whatever validated before the failing step. Which fields a partial may
/// contain is documented on each parser.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseFailure<P = ()> {
    pub message: String,
    pub partial: Option<P>,
}

impl<P> ParseFailure<P> {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            partial: None,
        }
    }

    pub fn with_partial(message: impl Into<String>, partial: P) -> Self {
        Self {
            message: message.into(),
            partial: Some(partial),
        }
    }

    /// Drop the partial payload, keeping only the message. Used when a
    /// caller aggregates failures whose partials it cannot represent.
    pub fn discard_partial<Q>(self) -> ParseFailure<Q> {
        ParseFailure {
            message: self.message,
            partial: None,
        }
    }
}

impl<P: fmt::Debug> fmt::Display for ParseFailure<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl<P: fmt::Debug> std::error::Error for ParseFailure<P> {}

pub type ParseResult<T, P = ()> = std::result::Result<T, ParseFailure<P>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn carries_optional_partial() {
        let plain: ParseFailure<u32> = ParseFailure::new("boom");
        assert_eq!(plain.partial, None);

        let partial = ParseFailure::with_partial("boom", 7u32);
        assert_eq!(partial.partial, Some(7));
        assert_eq!(partial.to_string(), "boom");
    }

    #[test]
    fn discard_partial_changes_payload_type() {
        let f: ParseFailure<u32> = ParseFailure::with_partial("boom", 7);
        let g: ParseFailure<()> = f.discard_partial();
        assert_eq!(g.message, "boom");
        assert_eq!(g.partial, None);
    }
}
