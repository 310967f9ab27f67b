//! Property tests for the lexer and parser on well-formed and garbage input.

use jtl_templates::ast::Node;
use jtl_templates::lex;
use jtl_templates::parse;
use jtl_templates::parse_template;
use jtl_templates::TokenKind;
use proptest::prelude::*;

/// Templates built only from well-formed constructs.
fn well_formed_template() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        "[a-zA-Z <>/=\n]{0,12}".prop_map(String::from),
        "v_[a-z]{1,6}".prop_map(|name| format!("{{{{ {name} }}}}")),
        "v_[a-z]{1,6}".prop_map(|name| format!("{{{{- {name}|upper -}}}}")),
        "v_[a-z]{1,6}".prop_map(|name| format!("{{% if {name} %}}x{{% endif %}}")),
        "[a-z ]{0,8}".prop_map(|text| format!("{{# {text} #}}")),
        Just("{% for i in [1, 2] %}{{ i }}{% endfor %}".to_string()),
        Just("{% raw %}{{ untouched }}{% endraw %}".to_string()),
        Just("{{ {'a': {'b': 1}} }}".to_string()),
    ];
    prop::collection::vec(piece, 0..20).prop_map(|parts| parts.concat())
}

/// Random soup of delimiters, keywords and noise.
fn delimiter_soup() -> impl Strategy<Value = String> {
    let piece = prop_oneof![
        Just("{{".to_string()),
        Just("}}".to_string()),
        Just("{%".to_string()),
        Just("%}".to_string()),
        Just("{#".to_string()),
        Just("#}".to_string()),
        Just("-".to_string()),
        Just("{".to_string()),
        Just("}".to_string()),
        Just("(".to_string()),
        Just("]".to_string()),
        Just("'".to_string()),
        Just("\"".to_string()),
        Just(" if ".to_string()),
        Just(" endif ".to_string()),
        Just(" for x in ".to_string()),
        Just(" endfor ".to_string()),
        Just(" block ".to_string()),
        Just(" macro m( ".to_string()),
        Just(" raw ".to_string()),
        Just(" else ".to_string()),
        Just("|".to_string()),
        Just("1.".to_string()),
        Just("a".to_string()),
        Just("\n".to_string()),
        Just("é".to_string()),
    ];
    prop::collection::vec(piece, 0..60).prop_map(|parts| parts.concat())
}

fn lexemes(source: &str) -> String {
    let (tokens, _) = lex(source);
    tokens.iter().map(|token| token.lexeme()).collect()
}

proptest! {
    #[test]
    fn test_well_formed_source_round_trips(source in well_formed_template()) {
        let (tokens, diagnostics) = lex(&source);
        prop_assert!(diagnostics.is_empty(), "{diagnostics:?}");
        prop_assert_eq!(lexemes(&source), source);
        prop_assert!(tokens.last().is_some_and(|t| t.is(TokenKind::Eof)));
    }

    #[test]
    fn test_well_formed_source_parses_cleanly(source in well_formed_template()) {
        let (_, diagnostics) = parse_template("t", &source, None);
        prop_assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_lexer_never_loses_text(source in delimiter_soup()) {
        prop_assert_eq!(lexemes(&source), source);
    }

    #[test]
    fn test_parser_terminates_on_soup(source in delimiter_soup()) {
        let (tokens, _) = lex(&source);
        let token_count = tokens.len();
        let (template, _) = parse(tokens, None);
        prop_assert!(count_nodes(&template.body) <= token_count);
    }

    #[test]
    fn test_arbitrary_unicode_is_total(source in "\\PC{0,200}") {
        let (tokens, _) = lex(&source);
        prop_assert!(tokens.last().is_some_and(|t| t.is(TokenKind::Eof)));
        let _ = parse(tokens, None);
    }
}

fn count_nodes(nodes: &[Node]) -> usize {
    nodes
        .iter()
        .map(|node| {
            1 + match node {
                Node::If(node) => {
                    node.branches
                        .iter()
                        .map(|b| count_nodes(&b.body))
                        .sum::<usize>()
                        + node.else_body.as_deref().map_or(0, count_nodes)
                }
                Node::For(node) => {
                    count_nodes(&node.body) + node.else_body.as_deref().map_or(0, count_nodes)
                }
                Node::Block(node) => count_nodes(&node.body),
                Node::Macro(node) => count_nodes(&node.body),
                Node::SetBlock(node) => count_nodes(&node.body),
                Node::CallBlock(node) => count_nodes(&node.body),
                Node::With(node) => count_nodes(&node.body),
                Node::FilterBlock(node) => count_nodes(&node.body),
                Node::CustomTag(node) => node.body.as_deref().map_or(0, count_nodes),
                _ => 0,
            }
        })
        .sum()
}
