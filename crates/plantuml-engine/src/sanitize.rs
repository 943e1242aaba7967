//! Include-directive stripping
//!
//! `!include` and `!includeurl` make the engine read local files or fetch
//! URLs while rendering. Any line carrying one is removed before the document
//! reaches the engine. There is no allow-list.

use lazy_static::lazy_static;
use regex::Regex;
use tracing::warn;

use crate::decode::DiagramDocument;

lazy_static! {
    static ref INCLUDE_PATTERN: Regex = Regex::new(r"^\s*!include(?:url)?\s+.*$").unwrap();
}

/// Drop every include line; every kept line ends with `\n`
pub fn sanitize(doc: DiagramDocument) -> DiagramDocument {
    let source = doc.into_string();
    let mut out = String::with_capacity(source.len() + 1);
    let mut dropped = 0usize;

    for line in lines(&source) {
        if is_include_directive(line) {
            dropped += 1;
        } else {
            out.push_str(line);
            out.push('\n');
        }
    }

    if dropped > 0 {
        warn!(
            "Stripped {} include directive line(s) from diagram source",
            dropped
        );
    }

    DiagramDocument::from_normalized(out)
}

/// True when the whole line is an include directive
pub fn is_include_directive(line: &str) -> bool {
    INCLUDE_PATTERN.is_match(line)
}

/// Split on `\n`, `\r\n` or a lone `\r`. A trailing terminator does not
/// start another line.
fn lines(source: &str) -> impl Iterator<Item = &str> {
    let mut rest = source;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        match rest.find(|c: char| c == '\n' || c == '\r') {
            Some(at) => {
                let line = &rest[..at];
                let skip = if rest[at..].starts_with("\r\n") { 2 } else { 1 };
                rest = &rest[at + skip..];
                Some(line)
            }
            None => {
                let line = rest;
                rest = "";
                Some(line)
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn run(source: &str) -> String {
        sanitize(DiagramDocument::from_text(source.to_string())).into_string()
    }

    #[test]
    fn test_clean_document_gains_final_newline() {
        assert_eq!(
            run("@startuml\nBob -> Alice: hello\n@enduml"),
            "@startuml\nBob -> Alice: hello\n@enduml\n"
        );
    }

    #[test]
    fn test_strips_include_lines() {
        let source = "@startuml\n!include http://internal/secret\nA -> B\n  !includeurl   file:///etc/passwd\n@enduml";
        assert_eq!(run(source), "@startuml\nA -> B\n@enduml\n");
    }

    #[test]
    fn test_directive_needs_whitespace() {
        assert!(!is_include_directive("!include"));
        assert!(is_include_directive("!include "));
        assert!(is_include_directive("!include x"));
        assert!(is_include_directive("\t!include\tfoo.puml"));
    }

    #[test]
    fn test_only_leading_whitespace_allowed() {
        assert!(!is_include_directive("note: !include foo"));
        assert!(!is_include_directive("' !include foo"));
    }

    #[test]
    fn test_other_keywords_kept() {
        assert!(!is_include_directive("!includes foo"));
        assert!(!is_include_directive("!define X 1"));
    }

    #[test]
    fn test_line_terminators() {
        let lines: Vec<_> = lines("a\r\nb\rc\n\nd\n").collect();
        assert_eq!(lines, vec!["a", "b", "c", "", "d"]);
    }

    #[test]
    fn test_crlf_include_line_removed() {
        let source = "@startuml\r\n!include /etc/hosts\r\nA -> B\r\n@enduml\r\n";
        assert_eq!(run(source), "@startuml\nA -> B\n@enduml\n");
    }

    #[test]
    fn test_empty_document() {
        let doc = DiagramDocument::from_normalized(String::new());
        assert_eq!(sanitize(doc).into_string(), "");
    }

    #[test]
    fn test_idempotent() {
        let source = "@startuml\n!include a\n\nA -> B\r\n  !includeurl b\n@enduml";
        let once = run(source);
        let twice = sanitize(DiagramDocument::from_normalized(once.clone())).into_string();
        assert_eq!(once, twice);
    }
}
