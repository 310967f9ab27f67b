//! End-to-end renders through the public API.

use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use camino::Utf8PathBuf;
use jtl_runtime::context;
use jtl_runtime::Environment;
use jtl_runtime::FileSystemLoader;
use jtl_runtime::Map;
use jtl_runtime::MapLoader;
use jtl_runtime::RenderContext;
use jtl_runtime::StrictMode;
use jtl_runtime::TemplateCache;
use jtl_source::Diagnostic;
use jtl_source::DiagnosticKind;
use jtl_templates::ast::CustomTag;
use jtl_templates::GenericTag;
use proptest::prelude::*;

fn env_with(templates: &[(&str, &str)]) -> Environment {
    let mut env = Environment::new();
    env.set_loader(templates.iter().copied().collect::<MapLoader>());
    env
}

fn kinds(diagnostics: &[Diagnostic]) -> Vec<DiagnosticKind> {
    diagnostics.iter().map(Diagnostic::kind).collect()
}

fn render_depth(ctx: &mut RenderContext<'_, '_>, _: &CustomTag) -> String {
    ctx.scope_depth().to_string()
}

/// An environment with an inline `{% depth %}` tag that prints the scope depth.
fn depth_env() -> Environment {
    let mut env = env_with(&[("partial", "{% depth %}{% for x in [1] %}{% depth %}{% endfor %}")]);
    env.add_tag("depth", GenericTag::inline());
    env.add_tag_renderer("depth", render_depth);
    env
}

mod basics {
    use super::*;

    #[test]
    fn test_variable_output() {
        let env = Environment::new();
        let (output, diagnostics) =
            env.render_str("hello", "Hello {{ name }}", context([("name", "Ada")]));
        assert_eq!(output, "Hello Ada");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_loop_metadata() {
        let env = Environment::new();
        let (output, _) = env.render_str(
            "loop",
            "{% for x in [1,2,3] %}{{ loop.index }}:{{ x }} {% endfor %}",
            Map::new(),
        );
        assert_eq!(output, "1:1 2:2 3:3 ");
    }

    #[test]
    fn test_macro_with_default() {
        let env = Environment::new();
        let (output, _) = env.render_str(
            "macro",
            "{% macro greet(name='Guest') %}Hi {{ name }}{% endmacro %}{{ greet() }}",
            Map::new(),
        );
        assert_eq!(output, "Hi Guest");
    }

    #[test]
    fn test_division_by_zero_continues() {
        let env = Environment::new();
        let (output, diagnostics) = env.render_str("div", "a{{ 1 / 0 }}b", Map::new());
        assert_eq!(output, "ab");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidOperand]);
    }

    #[test]
    fn test_digit_separators() {
        let env = Environment::new();
        let (output, diagnostics) =
            env.render_str("numbers", "{{ 1_000 }}|{{ 1_000 + 1 }}|{{ 1_0.5 }}", Map::new());
        assert_eq!(output, "1000|1001|10.5");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_huge_repeat_continues() {
        let env = Environment::new();
        for source in [
            "a{{ 'ab' * 9223372036854775807 }}b",
            "a{{ [1, 2, 3] * 7000000000000000000 }}b",
        ] {
            let (output, diagnostics) = env.render_str("repeat", source, Map::new());
            assert_eq!(output, "ab");
            assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::InvalidOperand]);
        }
    }

    #[test]
    fn test_globals_are_visible_everywhere() {
        let mut env = env_with(&[("footer", "{{ site }}")]);
        env.add_global("site", "example.org");
        let (output, diagnostics) = env.render_str(
            "page",
            "{{ site }}|{% include 'footer' %}",
            Map::new(),
        );
        assert_eq!(output, "example.org|example.org");
        assert!(diagnostics.is_empty());
    }
}

mod includes {
    use super::*;

    #[test]
    fn test_mutual_include_is_one_cycle() {
        let env = env_with(&[
            ("a", "A[{% include 'b' %}]"),
            ("b", "B({% include 'a' %})"),
        ]);
        let (output, diagnostics) = env.render_named("a", Map::new());
        assert_eq!(output, "A[B()]");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateCycle]);
        assert_eq!(diagnostics[0].template(), Some("b"));
        assert!(diagnostics[0].message().contains("a -> b -> a"));
    }

    #[test]
    fn test_context_is_isolated_by_default() {
        let env = env_with(&[("inner", "[{{ who }}]")]);
        let ctx = context([("who", "Ada")]);
        let (without, _) = env.render_str("page", "{% include 'inner' %}", ctx.clone());
        let (with, _) = env.render_str("page", "{% include 'inner' with context %}", ctx);
        assert_eq!(without, "[]");
        assert_eq!(with, "[Ada]");
    }

    #[test]
    fn test_missing_include() {
        let env = env_with(&[]);
        let (output, diagnostics) =
            env.render_str("page", "a{% include 'nope' %}b", Map::new());
        assert_eq!(output, "ab");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateNotFound]);

        let (output, diagnostics) =
            env.render_str("page", "a{% include 'nope' ignore missing %}b", Map::new());
        assert_eq!(output, "ab");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_first_existing_candidate_wins() {
        let env = env_with(&[("fallback", "F")]);
        let (output, diagnostics) =
            env.render_str("page", "{% include ['special', 'fallback'] %}", Map::new());
        assert_eq!(output, "F");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parse_errors_in_included_templates_are_attributed() {
        let env = env_with(&[("broken", "x{% if %}")]);
        let (output, diagnostics) = env.render_str(
            "page",
            "{% include 'broken' %}{% include 'broken' %}",
            Map::new(),
        );
        assert_eq!(output, "xx");
        assert!(!diagnostics.is_empty());
        assert!(diagnostics.iter().all(|d| d.template() == Some("broken")));
        let missing = diagnostics
            .iter()
            .filter(|d| d.kind() == DiagnosticKind::MissingEndTag)
            .count();
        assert_eq!(missing, 1);
    }
}

mod inheritance {
    use super::*;

    const BASE: &str = "<h1>{% block title %}Default{% endblock %}</h1>";

    #[test]
    fn test_child_override() {
        let env = env_with(&[("base", BASE)]);
        let (output, diagnostics) = env.render_str(
            "child",
            "{% extends 'base' %}ignored{% block title %}Hi {{ name }}{% endblock %}",
            context([("name", "Ada")]),
        );
        assert_eq!(output, "<h1>Hi Ada</h1>");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_parent_rendered_directly_uses_its_own_block() {
        let env = env_with(&[("base", BASE)]);
        let (output, _) = env.render_named("base", Map::new());
        assert_eq!(output, "<h1>Default</h1>");
    }

    #[test]
    fn test_multi_level_chain_with_super() {
        let env = env_with(&[
            (
                "base",
                "[{% block a %}A{% endblock %}|{% block b %}B{% endblock %}|{% block c %}C{% endblock %}]",
            ),
            (
                "mid",
                "{% extends 'base' %}{% block a %}mid-a{% endblock %}{% block b %}mid-b({{ super() }}){% endblock %}",
            ),
            (
                "leaf",
                "{% extends 'mid' %}{% block a %}leaf-a({{ super() }}){% endblock %}",
            ),
        ]);
        let (output, diagnostics) = env.render_named("leaf", Map::new());
        assert_eq!(output, "[leaf-a(mid-a)|mid-b(B)|C]");
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
    }

    #[test]
    fn test_top_level_sets_in_child_are_visible_to_the_parent() {
        let env = env_with(&[("base", "{{ title }}:{% block body %}{% endblock %}")]);
        let (output, _) = env.render_str(
            "child",
            "{% extends 'base' %}{% set title = 'T' %}{% block body %}b{% endblock %}",
            Map::new(),
        );
        assert_eq!(output, "T:b");
    }

    #[test]
    fn test_super_outside_an_override() {
        let env = Environment::new();
        let (output, diagnostics) =
            env.render_str("t", "{% block a %}x{{ super() }}{% endblock %}", Map::new());
        assert_eq!(output, "x");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::CallFailed]);
    }

    #[test]
    fn test_extends_cycle() {
        let env = env_with(&[
            ("a", "{% extends 'b' %}"),
            ("b", "{% extends 'a' %}"),
        ]);
        let (output, diagnostics) = env.render_named("a", Map::new());
        assert_eq!(output, "");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateCycle]);
    }

    #[test]
    fn test_missing_parent() {
        let env = env_with(&[]);
        let (_, diagnostics) = env.render_str("child", "{% extends 'nope' %}", Map::new());
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateNotFound]);
    }

    proptest! {
        #[test]
        fn test_single_override_matches_substitution(body in "[a-zA-Z .,!]{0,24}") {
            let parent = "<title>{% block title %}Default{% endblock %}</title>";
            let env = env_with(&[("parent", parent)]);
            let child = format!("{{% extends 'parent' %}}{{% block title %}}{body}{{% endblock %}}");
            let (extended, _) = env.render_str("child", &child, Map::new());
            let (substituted, _) = env.render_str(
                "flat",
                &parent.replace("Default", &body),
                Map::new(),
            );
            prop_assert_eq!(extended, substituted);
        }
    }
}

mod imports {
    use super::*;

    const FORMS: &str = "{% macro input(name) %}<input name=\"{{ name }}\">{% endmacro %}\
                         {% macro label(text) %}<label>{{ text }}</label>{{ input(text) }}{% endmacro %}";

    #[test]
    fn test_namespace_import() {
        let env = env_with(&[("forms", FORMS)]);
        let (output, diagnostics) = env.render_str(
            "page",
            "{% import 'forms' as f %}{{ f.input('q') }}",
            Map::new(),
        );
        assert_eq!(output, "<input name=\"q\">");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn test_imported_macros_call_their_siblings() {
        let env = env_with(&[("forms", FORMS)]);
        let (output, _) = env.render_str(
            "page",
            "{% from 'forms' import label %}{{ label('q') }}",
            Map::new(),
        );
        assert_eq!(output, "<label>q</label><input name=\"q\">");
    }

    #[test]
    fn test_from_import_with_alias() {
        let env = env_with(&[("forms", FORMS)]);
        let (output, _) = env.render_str(
            "page",
            "{% from 'forms' import input as field %}{{ field('q') }}",
            Map::new(),
        );
        assert_eq!(output, "<input name=\"q\">");
    }

    #[test]
    fn test_unknown_names() {
        let env = env_with(&[("forms", FORMS)]);
        let (_, diagnostics) = env.render_str(
            "page",
            "{% from 'forms' import nope %}{% import 'forms' as f %}{{ f.missing() }}",
            Map::new(),
        );
        assert_eq!(
            kinds(&diagnostics),
            vec![DiagnosticKind::UnknownMacro, DiagnosticKind::UnknownMacro]
        );
        assert!(diagnostics[0].message().contains("forms.nope"));
    }
}

mod recovery {
    use super::*;

    const PIECES: [&str; 5] = [
        "text ",
        "{{ name }}",
        "{% if flag %}yes{% else %}no{% endif %}",
        "{% for i in [1, 2] %}{{ i }}{% endfor %}",
        "{% macro m() %}M{% endmacro %}{{ m() }}",
    ];

    fn ctx() -> Map {
        context([("name", "Ada")])
    }

    #[test]
    fn test_bad_tag_leaves_the_rest_intact() {
        let env = Environment::new();
        let valid = PIECES.concat();
        let broken = format!("{}{{% bogus 1 2 %}}{}", PIECES[..2].concat(), PIECES[2..].concat());
        let (expected, clean) = env.render_str("valid", &valid, ctx());
        let (output, diagnostics) = env.render_str("broken", &broken, ctx());
        assert!(clean.is_empty());
        assert!(!diagnostics.is_empty());
        assert_eq!(output, expected);
    }

    proptest! {
        #[test]
        fn test_one_injected_error_does_not_disturb_other_nodes(
            order in Just(PIECES.to_vec()).prop_shuffle(),
            at in 0..=PIECES.len(),
        ) {
            let env = Environment::new();
            let valid = order.concat();
            let broken = format!("{}{{% bogus %}}{}", order[..at].concat(), order[at..].concat());
            let (expected, _) = env.render_str("valid", &valid, ctx());
            let (output, diagnostics) = env.render_str("broken", &broken, ctx());
            prop_assert!(!diagnostics.is_empty());
            prop_assert_eq!(output, expected);
        }
    }
}

mod scoping {
    use super::*;

    #[test]
    fn test_depth_is_restored_after_each_construct() {
        let env = depth_env();
        let (output, diagnostics) = env.render_str(
            "t",
            "{% depth %}\
             {% for x in [1] %}{% depth %}{% endfor %}\
             {% with a = 1 %}{% depth %}{% endwith %}\
             {% macro m() %}{% depth %}{% endmacro %}{{ m() }}\
             {% include 'partial' %}\
             {% depth %}",
            Map::new(),
        );
        assert!(diagnostics.is_empty(), "{diagnostics:?}");
        assert_eq!(output, "1222121");
    }

    fn piece() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("{% for x in [1, 2] %}{{ x / 0 }}{% endfor %}".to_string()),
            Just("{% for x in 3 %}{% else %}{{ nope.attr }}{% endfor %}".to_string()),
            Just("{% with a = missing %}{{ a() }}{% endwith %}".to_string()),
            Just("{% set a, b = [1] %}".to_string()),
            Just("{% macro m(x) %}{{ x | nofilter }}{% endmacro %}{{ m(1, x=2) }}".to_string()),
            Just("{% include 'absent' %}{% include 'partial' %}".to_string()),
            Just("{% call m() %}{{ caller() }}{% endcall %}".to_string()),
            Just("{% filter nofilter %}{{ 1 is nosuchtest }}{% endfilter %}".to_string()),
            Just("{% depth %}".to_string()),
        ]
    }

    proptest! {
        #[test]
        fn test_depth_is_unchanged_after_failing_bodies(
            pieces in prop::collection::vec(piece(), 0..8),
        ) {
            let mut env = depth_env();
            env.set_strict(StrictMode::all());
            let source = format!("{}[{{% depth %}}]", pieces.concat());
            let (output, _) = env.render_str("t", &source, Map::new());
            prop_assert!(output.ends_with("[1]"), "{}", output);
        }
    }
}

mod loading {
    use super::*;

    #[test]
    fn test_file_system_loader() {
        let dir = tempfile::tempdir().unwrap();
        let root = Utf8PathBuf::from_path_buf(dir.path().to_path_buf()).unwrap();
        std::fs::create_dir(root.join("partials")).unwrap();
        std::fs::write(root.join("base.html"), "<{% block body %}{% endblock %}>").unwrap();
        std::fs::write(root.join("partials/nav.html"), "nav").unwrap();
        std::fs::write(
            root.join("page.html"),
            "{% extends 'base.html' %}{% block body %}{% include 'partials/nav.html' %}{% endblock %}",
        )
        .unwrap();

        let mut env = Environment::new();
        env.set_loader(FileSystemLoader::new([root]));
        let (output, diagnostics) = env.render_named("page.html", Map::new());
        assert_eq!(output, "<nav>");
        assert!(diagnostics.is_empty());

        let (_, diagnostics) = env.render_str("t", "{% include '../page.html' %}", Map::new());
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateNotFound]);
    }

    #[test]
    fn test_cache_is_reused_across_renders() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let mut env = Environment::new();
        env.set_loader(move |name: &str| {
            counter.fetch_add(1, Ordering::SeqCst);
            match name {
                "page" => Some("{% include 'part' %}{% include 'part' %}".to_string()),
                "part" => Some("p".to_string()),
                _ => None,
            }
        });

        let mut cache = TemplateCache::new();
        let (first, _) = env.render_named_with_cache("page", Map::new(), &mut cache);
        let (second, _) = env.render_named_with_cache("page", Map::new(), &mut cache);
        assert_eq!(first, "pp");
        assert_eq!(second, "pp");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_no_loader() {
        let env = Environment::new();
        let (output, diagnostics) = env.render_named("page", Map::new());
        assert_eq!(output, "");
        assert_eq!(kinds(&diagnostics), vec![DiagnosticKind::TemplateNotFound]);
    }
}
