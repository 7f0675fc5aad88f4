//! KDL parse failures as diagnostics.
//!
//! `kdl` reports errors through miette 5, so its `KdlError` is re-labelled
//! here to keep the span and help text under the miette this binary renders
//! with.

use kdl::{KdlDocument, KdlError};
use miette::{Diagnostic, SourceSpan};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq, Diagnostic)]
#[error("{message}")]
#[diagnostic(code(hanji::kdl::parse))]
pub struct KdlParseError {
    pub message: String,
    #[label("{}", label)]
    pub span: SourceSpan,
    pub label: String,
    #[help]
    pub help: Option<String>,
}

impl From<KdlError> for KdlParseError {
    fn from(e: KdlError) -> Self {
        Self {
            message: e.kind.to_string(),
            span: (e.span.offset(), e.span.len()).into(),
            label: e.label.unwrap_or("here").to_string(),
            help: e.help.map(str::to_string),
        }
    }
}

pub fn parse_kdl(source: &str) -> Result<KdlDocument, KdlParseError> {
    source.parse::<KdlDocument>().map_err(KdlParseError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_document() {
        let doc = parse_kdl("type \"hello\"").unwrap();
        assert_eq!(doc.nodes().len(), 1);
    }

    #[test]
    fn test_error_keeps_span_inside_source() {
        let source = "caret 1.";
        let err = parse_kdl(source).unwrap_err();
        assert!(!err.message.is_empty());
        assert!(err.span.offset() <= source.len());
    }
}
