//! Edge case tests for simplec-lex

#[cfg(test)]
mod tests {
    use crate::{lex, TokenKind};

    #[test]
    fn test_edge_empty_source() {
        let tokens = lex("").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::End);
    }

    #[test]
    fn test_edge_whitespace_only() {
        let tokens = lex(" \t\r\n\n  ").unwrap();
        assert_eq!(tokens.len(), 1);
        assert_eq!(tokens[0].kind, TokenKind::End);
    }

    #[test]
    fn test_edge_long_identifier() {
        let name = "a".repeat(10000);
        let tokens = lex(&name).unwrap();
        assert_eq!(tokens[0].kind, TokenKind::Identifier);
        assert_eq!(tokens[0].text, name);
    }

    #[test]
    fn test_edge_underscore_identifiers() {
        let tokens = lex("_ _x x_ __init__").unwrap();
        assert!(tokens[..4].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_edge_adjacent_punctuators() {
        // `a+++b` munches as `a ++ + b`.
        let kinds: Vec<_> = lex("a+++b").unwrap().iter().map(|t| t.kind).collect();
        assert_eq!(
            kinds,
            vec![
                TokenKind::Identifier,
                TokenKind::PlusPlus,
                TokenKind::Plus,
                TokenKind::Identifier,
                TokenKind::End,
            ]
        );
    }

    #[test]
    fn test_edge_keyword_prefix_is_identifier() {
        let tokens = lex("iffy returned skipper").unwrap();
        assert!(tokens[..3].iter().all(|t| t.kind == TokenKind::Identifier));
    }

    #[test]
    fn test_edge_line_comment_at_eof() {
        let tokens = lex("x // trailing").unwrap();
        assert_eq!(tokens.len(), 2);
    }

    #[test]
    fn test_edge_crlf_line_counting() {
        let tokens = lex("a\r\nb").unwrap();
        assert_eq!(tokens[1].pos.line, 2);
        assert_eq!(tokens[1].pos.column, 1);
    }

    #[test]
    fn test_edge_non_ascii_rejected_with_position() {
        let err = lex("x : i32 = \u{3b1};").unwrap_err();
        assert!(err.message.contains("unexpected character"));
        assert_eq!(err.pos.column, 11);
    }

    // ==================== PROPERTY-BASED TESTS ====================

    #[test]
    fn test_property_lexer_is_total() {
        use proptest::prelude::*;

        // Any input either lexes to a sequence ending in End or yields
        // exactly one positioned diagnostic. Never a panic.
        proptest!(|(input in "[ -~\\n\\t]{0,200}")| {
            match lex(&input) {
                Ok(tokens) => {
                    prop_assert!(!tokens.is_empty());
                    prop_assert_eq!(tokens.last().unwrap().kind, TokenKind::End);
                }
                Err(diag) => {
                    prop_assert!(diag.pos.line >= 1);
                    prop_assert!(diag.pos.column >= 1);
                    prop_assert!(!diag.message.is_empty());
                }
            }
        });
    }

    #[test]
    fn test_property_identifiers_roundtrip() {
        use proptest::prelude::*;

        proptest!(|(input in "[a-zA-Z_][a-zA-Z0-9_]{0,100}")| {
            let tokens = lex(&input).unwrap();
            if tokens[0].kind == TokenKind::Identifier {
                prop_assert_eq!(&tokens[0].text, &input);
            }
        });
    }
}
