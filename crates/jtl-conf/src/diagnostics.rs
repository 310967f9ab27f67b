use jtl_source::Diagnostic;
use jtl_source::Severity;
use rustc_hash::FxHashMap;
use serde::Deserialize;

/// Configured severity for a diagnostic code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiagnosticSeverity {
    Off,
    Error,
    Warning,
    Info,
}

impl DiagnosticSeverity {
    /// Returns None for Off (diagnostic should be dropped).
    #[must_use]
    pub fn to_severity(self) -> Option<Severity> {
        match self {
            DiagnosticSeverity::Off => None,
            DiagnosticSeverity::Error => Some(Severity::Error),
            DiagnosticSeverity::Warning => Some(Severity::Warning),
            DiagnosticSeverity::Info => Some(Severity::Info),
        }
    }
}

/// Per-code severity overrides.
///
/// Codes without an entry keep the default severity of their kind.
/// Keys are either full codes or code prefixes; specific codes override
/// prefix patterns.
///
/// ```toml
/// [diagnostics.severity]
/// R300 = "off"       # unknown variables
/// "L" = "warning"    # every lexical problem
/// L103 = "error"     # except unterminated strings
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Default)]
pub struct DiagnosticsConfig {
    #[serde(default)]
    pub severity: FxHashMap<String, DiagnosticSeverity>,
}

impl DiagnosticsConfig {
    /// The configured severity for `code`: exact match first, then the
    /// longest matching prefix. Codes compare case-insensitively.
    #[must_use]
    pub fn get_severity(&self, code: &str) -> Option<DiagnosticSeverity> {
        self.severity
            .iter()
            .filter(|(pattern, _)| {
                code.get(..pattern.len())
                    .is_some_and(|prefix| prefix.eq_ignore_ascii_case(pattern))
            })
            .max_by_key(|(pattern, _)| pattern.len())
            .map(|(_, &severity)| severity)
    }

    #[must_use]
    pub fn is_enabled(&self, code: &str) -> bool {
        self.get_severity(code) != Some(DiagnosticSeverity::Off)
    }

    /// Drop disabled diagnostics and apply severity overrides, keeping order.
    #[must_use]
    pub fn apply(&self, diagnostics: Vec<Diagnostic>) -> Vec<Diagnostic> {
        diagnostics
            .into_iter()
            .filter_map(|diagnostic| match self.get_severity(diagnostic.code()) {
                None => Some(diagnostic),
                Some(configured) => configured
                    .to_severity()
                    .map(|severity| diagnostic.with_severity(severity)),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use jtl_source::DiagnosticKind;
    use jtl_source::Span;

    use super::*;

    fn config(entries: &[(&str, DiagnosticSeverity)]) -> DiagnosticsConfig {
        DiagnosticsConfig {
            severity: entries
                .iter()
                .map(|(code, severity)| ((*code).to_string(), *severity))
                .collect(),
        }
    }

    #[test]
    fn test_get_severity_default() {
        let config = DiagnosticsConfig::default();
        assert_eq!(config.get_severity("R300"), None);
        assert!(config.is_enabled("R300"));
    }

    #[test]
    fn test_get_severity_exact_overrides_prefix() {
        let config = config(&[
            ("R", DiagnosticSeverity::Warning),
            ("R3", DiagnosticSeverity::Off),
            ("R300", DiagnosticSeverity::Error),
        ]);

        assert_eq!(config.get_severity("R300"), Some(DiagnosticSeverity::Error));
        assert_eq!(config.get_severity("R301"), Some(DiagnosticSeverity::Off));
        assert_eq!(config.get_severity("L100"), None);
    }

    #[test]
    fn test_get_severity_longest_prefix_wins() {
        let config = config(&[
            ("P", DiagnosticSeverity::Warning),
            ("P20", DiagnosticSeverity::Info),
        ]);

        assert_eq!(config.get_severity("P204"), Some(DiagnosticSeverity::Info));
        assert_eq!(config.get_severity("P210"), Some(DiagnosticSeverity::Warning));
    }

    #[test]
    fn test_is_enabled_prefix_off_with_specific_override() {
        let config = config(&[
            ("R", DiagnosticSeverity::Off),
            ("R310", DiagnosticSeverity::Warning),
        ]);

        assert!(config.is_enabled("R310"));
        assert!(!config.is_enabled("R300"));
        assert!(config.is_enabled("P200"));
    }

    #[test]
    fn test_apply_filters_and_overrides() {
        let config = config(&[
            ("R300", DiagnosticSeverity::Off),
            ("R305", DiagnosticSeverity::Info),
        ]);
        let diagnostics = [
            DiagnosticKind::UnknownVariable,
            DiagnosticKind::InvalidOperand,
            DiagnosticKind::MissingEndTag,
        ]
        .into_iter()
        .map(|kind| Diagnostic::new(kind, "message", Span::default()))
        .collect();

        let applied = config.apply(diagnostics);

        let codes: Vec<_> = applied.iter().map(Diagnostic::code).collect();
        assert_eq!(codes, vec!["R305", "P202"]);
        assert_eq!(applied[0].severity(), Severity::Info);
        assert_eq!(applied[1].severity(), Severity::Error);
    }

    #[test]
    fn test_codes_match_case_insensitively() {
        let config = config(&[("r30", DiagnosticSeverity::Off)]);
        assert!(!config.is_enabled("R300"));
    }

    #[test]
    fn test_to_severity() {
        assert_eq!(DiagnosticSeverity::Off.to_severity(), None);
        assert_eq!(DiagnosticSeverity::Warning.to_severity(), Some(Severity::Warning));
    }

    #[test]
    fn test_deserialize_diagnostics_config() {
        let toml = r#"
            [severity]
            R300 = "off"
            "L" = "warning"
            L103 = "error"
        "#;

        let config: DiagnosticsConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.severity.get("R300"), Some(&DiagnosticSeverity::Off));
        assert_eq!(config.severity.get("L"), Some(&DiagnosticSeverity::Warning));
        assert_eq!(config.severity.get("L103"), Some(&DiagnosticSeverity::Error));
    }
}
