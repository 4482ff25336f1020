//! Free-text entity extraction for Spanish utterances.
//!
//! Each entity kind has an ordered pattern table; the first pattern that matches
//! the lowercased, trimmed utterance wins. The captured span has a known leading
//! filler cluster stripped and is then title-cased. Best effort only: no pattern,
//! no name.

use regex::Regex;
use std::sync::LazyLock;

/// Recovers entity names from a raw user utterance.
///
/// The webhook mapper only sees this trait, so an intent-extraction service can
/// replace the regex tables without changing how requests are mapped.
pub trait NameExtractor: Send + Sync {
    /// Initiative name mentioned in `text`, if any.
    fn initiative_name(&self, text: &str) -> Option<String>;

    /// Area (division, department) name mentioned in `text`, if any.
    fn area_name(&self, text: &str) -> Option<String>;
}

/// Ordered extraction patterns plus the leading filler to strip from a capture.
struct PatternTable {
    patterns: Vec<Regex>,
    filler: Regex,
}

impl PatternTable {
    fn new(patterns: &[&str], filler: &str) -> Self {
        Self {
            patterns: patterns
                .iter()
                .map(|p| Regex::new(p).expect("extraction pattern must compile"))
                .collect(),
            filler: Regex::new(filler).expect("filler pattern must compile"),
        }
    }

    /// First capture in pattern order, cleaned and title-cased.
    fn extract(&self, text: &str) -> Option<String> {
        let lowered = text.trim().to_lowercase();
        let captured = self
            .patterns
            .iter()
            .find_map(|re| re.captures(&lowered).and_then(|c| c.get(1)))?;
        let span = captured.as_str().trim();
        let cleaned = self.filler.replace(span, "");
        let cleaned = cleaned.trim();
        if cleaned.is_empty() {
            return None;
        }
        Some(title_case(cleaned))
    }
}

static INITIATIVE_TABLE: LazyLock<PatternTable> = LazyLock::new(|| {
    PatternTable::new(
        &[
            r"iniciativa\s+(?:de\s+)?([^?]+)",
            r"(?:progreso|estado)\s+de\s+(?:la\s+)?([^?]+)",
            r"(?:cómo\s+va)\s+(?:la\s+)?([^?]+)",
        ],
        r"^(?:la\s+)?iniciativa\s+(?:de\s+)?",
    )
});

static AREA_TABLE: LazyLock<PatternTable> = LazyLock::new(|| {
    PatternTable::new(
        &[
            r"área\s+(?:de\s+)?([^?]+)",
            r"división\s+(?:de\s+)?([^?]+)",
            r"departamento\s+(?:de\s+)?([^?]+)",
            r"(?:kpis?\s+del?\s+área\s+(?:de\s+)?)([^?]+)",
        ],
        r"^(?:la\s+|el\s+)?(?:área|división|departamento)\s+(?:de\s+)?",
    )
});

/// Default extractor backed by the built-in Spanish pattern tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternExtractor;

impl NameExtractor for PatternExtractor {
    fn initiative_name(&self, text: &str) -> Option<String> {
        extract_initiative_name(text)
    }

    fn area_name(&self, text: &str) -> Option<String> {
        extract_area_name(text)
    }
}

pub fn extract_initiative_name(text: &str) -> Option<String> {
    INITIATIVE_TABLE.extract(text)
}

pub fn extract_area_name(text: &str) -> Option<String> {
    AREA_TABLE.extract(text)
}

/// Uppercase every cased character that follows an uncased one; lowercase the rest.
pub fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_cased = false;
    for c in s.chars() {
        let cased = c.is_lowercase() || c.is_uppercase();
        if cased && !prev_cased {
            out.extend(c.to_uppercase());
        } else if cased {
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
        prev_cased = cased;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn initiative_patterns() {
        let cases = [
            (
                "¿Cómo va la Iniciativa de Migración de Datos?",
                Some("Migración De Datos"),
            ),
            ("iniciativa portal de clientes", Some("Portal De Clientes")),
            ("Dame el progreso de la modernización", Some("Modernización")),
            ("¿cuál es el estado de onboarding digital?", Some("Onboarding Digital")),
            ("¿cómo va la expansión regional?", Some("Expansión Regional")),
            ("  CÓMO VA EL CRM  ", Some("El Crm")),
            ("hola, buenos días", None),
            ("", None),
        ];
        for (text, expected) in cases {
            assert_eq!(
                extract_initiative_name(text).as_deref(),
                expected,
                "input: {:?}",
                text
            );
        }
    }

    #[test]
    fn initiative_keyword_outranks_progress_pattern() {
        assert_eq!(
            extract_initiative_name("progreso de la iniciativa de ventas").as_deref(),
            Some("Ventas")
        );
    }

    #[test]
    fn area_patterns() {
        let cases = [
            ("¿Cuáles son los KPIs del área de Finanzas?", Some("Finanzas")),
            ("área comercial", Some("Comercial")),
            ("métricas de la división de operaciones", Some("Operaciones")),
            ("kpis del departamento de recursos humanos?", Some("Recursos Humanos")),
            ("kpis de marketing", None),
        ];
        for (text, expected) in cases {
            assert_eq!(extract_area_name(text).as_deref(), expected, "input: {:?}", text);
        }
    }

    #[test]
    fn dangling_preposition_kept_bare_keyword_absent() {
        assert_eq!(extract_area_name("área de ?"), Some("De".to_string()));
        assert_eq!(extract_initiative_name("iniciativa ?"), None);
    }

    #[test]
    fn title_case_follows_cased_boundaries() {
        assert_eq!(title_case("migración de datos"), "Migración De Datos");
        assert_eq!(title_case("o'neil y CRM-2"), "O'Neil Y Crm-2");
        assert_eq!(title_case("fase 2b"), "Fase 2B");
    }

    #[test]
    fn pattern_extractor_delegates_to_tables() {
        let ex = PatternExtractor;
        assert_eq!(ex.initiative_name("iniciativa de ventas").as_deref(), Some("Ventas"));
        assert_eq!(ex.area_name("área de ventas").as_deref(), Some("Ventas"));
    }
}
