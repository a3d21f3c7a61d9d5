#![forbid(unsafe_code)]

mod lexer;
mod token;

pub use lexer::{LexError, LexOutput, Lexer};
pub use token::{Token, TokenKind, KEYWORDS};

/// Convenience wrapper: lex `src` and return both tokens and errors.
pub fn lex(src: &str) -> LexOutput {
    Lexer::new(src).lex()
}

#[cfg(test)]
mod tests {
    use super::*;
    use quantel_ast::{DType, ShapeKind};

    fn kinds(src: &str) -> Vec<TokenKind> {
        lex(src).tokens.into_iter().map(|t| t.kind).collect()
    }

    #[test]
    fn lex_typed_declaration() {
        assert_eq!(
            kinds("float32 matrix<2,3> w = 1.5;"),
            vec![
                TokenKind::DType(DType::Float32),
                TokenKind::Shape(ShapeKind::Matrix),
                TokenKind::Lt,
                TokenKind::Int(2),
                TokenKind::Comma,
                TokenKind::Int(3),
                TokenKind::Gt,
                TokenKind::Ident("w".into()),
                TokenKind::Eq,
                TokenKind::Float(1.5),
                TokenKind::Semi,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn compound_operators_win_over_single_characters() {
        assert_eq!(
            kinds("a @= b -> c .. d && e || !f <= g"),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::AtEq,
                TokenKind::Ident("b".into()),
                TokenKind::Arrow,
                TokenKind::Ident("c".into()),
                TokenKind::DotDot,
                TokenKind::Ident("d".into()),
                TokenKind::AndAnd,
                TokenKind::Ident("e".into()),
                TokenKind::OrOr,
                TokenKind::Bang,
                TokenKind::Ident("f".into()),
                TokenKind::Le,
                TokenKind::Ident("g".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn range_bounds_are_not_floats() {
        assert_eq!(
            kinds("0..10"),
            vec![TokenKind::Int(0), TokenKind::DotDot, TokenKind::Int(10), TokenKind::Eof]
        );
    }

    #[test]
    fn comments_are_skipped_and_lines_still_counted() {
        let out = lex("# hash\n// slashes\n/* block\nspans\nlines */ x\ny");
        assert!(out.errors.is_empty());
        let lines: Vec<(String, usize)> = out
            .tokens
            .iter()
            .filter_map(|t| match &t.kind {
                TokenKind::Ident(n) => Some((n.clone(), t.line)),
                _ => None,
            })
            .collect();
        assert_eq!(lines, vec![("x".into(), 5), ("y".into(), 6)]);
    }

    #[test]
    fn inline_block_comment_between_tokens() {
        let out = lex("a /* b * c / d */ e /**/ f");
        assert!(out.errors.is_empty(), "{:?}", out.errors);
        assert_eq!(
            out.tokens.into_iter().map(|t| t.kind).collect::<Vec<_>>(),
            vec![
                TokenKind::Ident("a".into()),
                TokenKind::Ident("e".into()),
                TokenKind::Ident("f".into()),
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn unterminated_block_comment_is_one_error() {
        let out = lex("x\n/* never\nclosed");
        assert_eq!(out.errors.len(), 1);
        assert_eq!(out.errors[0].message, "unterminated block comment");
        assert_eq!(out.errors[0].line, 2);
        assert_eq!(out.errors[0].offset(), 2);
        assert_eq!(kinds("x\n/* never\nclosed"), vec![TokenKind::Ident("x".into()), TokenKind::Eof]);
    }

    #[test]
    fn keywords_booleans_and_strings() {
        assert_eq!(
            kinds("probe(\"say \\\"hi\\\"\"); true false auto"),
            vec![
                TokenKind::KwProbe,
                TokenKind::LParen,
                TokenKind::String("say \"hi\"".into()),
                TokenKind::RParen,
                TokenKind::Semi,
                TokenKind::Bool(true),
                TokenKind::Bool(false),
                TokenKind::KwAuto,
                TokenKind::Eof,
            ]
        );
    }

    #[test]
    fn illegal_characters_are_recorded_and_skipped() {
        let out = lex("int32 scalar x = 5 $ 3;\n?");
        assert_eq!(out.errors.len(), 2);
        assert_eq!(out.errors[0].message, "Illegal character '$'");
        assert_eq!(out.errors[0].line, 1);
        assert_eq!(out.errors[0].offset(), 19);
        assert_eq!(out.errors[1].line, 2);
        // Lexing continued past the bad character.
        assert!(out.tokens.iter().any(|t| t.kind == TokenKind::Int(3)));
        assert_eq!(out.tokens.last().map(|t| &t.kind), Some(&TokenKind::Eof));
    }

    #[test]
    fn unterminated_string_skips_only_the_quote() {
        let out = lex("\"abc");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains('"'));
        assert_eq!(
            out.tokens.iter().map(|t| t.kind.clone()).collect::<Vec<_>>(),
            vec![TokenKind::Ident("abc".into()), TokenKind::Eof]
        );
    }

    #[test]
    fn oversized_integer_is_an_error_not_a_panic() {
        let out = lex("99999999999999999999999");
        assert_eq!(out.errors.len(), 1);
        assert!(out.errors[0].message.contains("out of range"));
    }
}
