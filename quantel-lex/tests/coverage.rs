use proptest::prelude::*;
use quantel_lex::{lex, TokenKind};

/// Rebuild the non-whitespace text from token spans plus skipped characters.
fn reconstruct(src: &str) -> String {
    let out = lex(src);
    let mut pieces: Vec<(usize, usize)> = out
        .tokens
        .iter()
        .filter(|t| t.kind != TokenKind::Eof)
        .map(|t| (t.span.offset(), t.span.offset() + t.span.len()))
        .chain(
            out.errors
                .iter()
                .map(|e| (e.span.offset(), e.span.offset() + e.span.len())),
        )
        .collect();
    pieces.sort();
    pieces.iter().map(|(s, e)| &src[*s..*e]).collect()
}

proptest! {
    #[test]
    fn tokens_and_skipped_characters_cover_the_input(
        src in "[a-z0-9 \n+*<>=!&|.@%^,;(){}\\[\\]$?-]{0,60}"
    ) {
        let expected: String = src.chars().filter(|c| !c.is_whitespace()).collect();
        prop_assert_eq!(reconstruct(&src), expected);
    }

    #[test]
    fn lexing_is_deterministic(src in "[a-z0-9 \n+*=.;$]{0,40}") {
        let a = lex(&src);
        let b = lex(&src);
        prop_assert_eq!(a.tokens, b.tokens);
        prop_assert_eq!(a.errors.len(), b.errors.len());
    }
}

#[test]
fn comments_are_excluded_from_coverage() {
    let src = "x = 1; // trailing\n/* block */ y = 2; # hash";
    assert_eq!(reconstruct(src), "x=1;y=2;");
}
