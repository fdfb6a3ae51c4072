//! Lexical query expansion that runs before embedding. The goal is recall:
//! densify the query with the catalog's own vocabulary so the vector search
//! has something to bite on, and align size tokens with catalog option
//! values. Repeated tokens are fine since the output only feeds an embedding.

/// A synonym group for a product concept. Matching is bidirectional: a
/// synonym hit appends the canonical term and a canonical hit appends every
/// synonym.
#[derive(Debug, Clone)]
pub struct ConceptGroup {
    pub canonical: String,
    pub synonyms: Vec<String>,
}

/// A brand color group. The canonical form is the plain Spanish adjective;
/// the synonyms are the brand's own color names for it.
#[derive(Debug, Clone)]
pub struct ColorGroup {
    pub canonical: String,
    pub synonyms: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct NormalizerPolicy {
    pub concepts: Vec<ConceptGroup>,
    pub colors: Vec<ColorGroup>,
    /// (token, rewrite) pairs, longest token first.
    pub size_rewrites: Vec<(String, String)>,
}

impl Default for NormalizerPolicy {
    fn default() -> Self {
        Self {
            concepts: concept_table(),
            colors: color_table(),
            size_rewrites: vec![
                ("xxxxl".into(), "4xl".into()),
                ("xxxl".into(), "3xl".into()),
                ("xxl".into(), "2xl".into()),
            ],
        }
    }
}

fn group(canonical: &str, synonyms: &[&str]) -> ConceptGroup {
    ConceptGroup {
        canonical: canonical.to_string(),
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

fn color(canonical: &str, synonyms: &[&str]) -> ColorGroup {
    ColorGroup {
        canonical: canonical.to_string(),
        synonyms: synonyms.iter().map(|s| s.to_string()).collect(),
    }
}

fn concept_table() -> Vec<ConceptGroup> {
    vec![
        group("chaqueta", &["cazadora", "chamarra", "abrigo", "jacket"]),
        group("sudadera", &["hoodie", "jersey", "sueter"]),
        group("camiseta", &["playera", "remera", "tshirt"]),
        group("pantalon", &["pantalones", "jogger", "chandal"]),
        group("gorra", &["cap", "visera"]),
        group("calcetines", &["medias", "socks"]),
    ]
}

fn color_table() -> Vec<ColorGroup> {
    vec![
        color("rojo", &["granate", "burdeos"]),
        color("azul", &["marino", "celeste"]),
        color("verde", &["caqui", "oliva"]),
        color("negro", &["carbon"]),
        color("blanco", &["crudo", "hueso"]),
        color("gris", &["antracita", "plomo"]),
    ]
}

#[derive(Debug, Clone, Default)]
pub struct QueryNormalizer {
    policy: NormalizerPolicy,
}

impl QueryNormalizer {
    pub fn new(policy: NormalizerPolicy) -> Self {
        Self { policy }
    }

    /// Expand a raw query into its embedding-ready form.
    pub fn expand(&self, raw: &str) -> String {
        // Space padding lets whole-word checks use plain substring
        // containment without matching "rojo" inside "arrojo".
        let padded = format!(" {} ", raw.to_lowercase());
        let mut out = padded.clone();

        for concept in &self.policy.concepts {
            let canonical_hit = contains_word(&padded, &concept.canonical);
            let synonym_hit = concept
                .synonyms
                .iter()
                .any(|s| contains_word(&padded, s));
            if synonym_hit {
                out.push_str(&concept.canonical);
                out.push(' ');
            }
            if canonical_hit {
                for synonym in &concept.synonyms {
                    out.push_str(synonym);
                    out.push(' ');
                }
            }
        }

        for color in &self.policy.colors {
            let matched = adjective_variants(&color.canonical)
                .iter()
                .any(|v| contains_word(&padded, v));
            if matched {
                out.push_str(&color.canonical);
                out.push(' ');
                for synonym in &color.synonyms {
                    out.push_str(synonym);
                    out.push(' ');
                }
            }
        }

        for (token, rewrite) in &self.policy.size_rewrites {
            let needle = format!(" {} ", token);
            let replacement = format!(" {} ", rewrite);
            while out.contains(&needle) {
                out = out.replace(&needle, &replacement);
            }
        }

        out.trim().to_string()
    }
}

fn contains_word(padded_haystack: &str, word: &str) -> bool {
    padded_haystack.contains(&format!(" {} ", word))
}

/// Grammatical variants of a Spanish color adjective, covering gender and
/// number agreement so "roja" or "rojas" still triggers the "rojo" group.
pub fn adjective_variants(canonical: &str) -> Vec<String> {
    let mut variants = vec![canonical.to_string()];
    if let Some(stem) = canonical.strip_suffix('o') {
        variants.push(format!("{}a", stem));
        variants.push(format!("{}os", stem));
        variants.push(format!("{}as", stem));
    } else if let Some(stem) = canonical.strip_suffix('z') {
        variants.push(format!("{}ces", stem));
    } else if canonical.ends_with(['a', 'e', 'i', 'u']) {
        variants.push(format!("{}s", canonical));
    } else {
        variants.push(format!("{}es", canonical));
    }
    variants
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn normalizer() -> QueryNormalizer {
        QueryNormalizer::new(NormalizerPolicy::default())
    }

    #[test]
    fn synonym_appends_canonical() {
        let out = normalizer().expand("busco una cazadora ligera");
        assert!(out.contains("chaqueta"));
    }

    #[test]
    fn canonical_appends_every_synonym() {
        let out = normalizer().expand("tienes alguna chaqueta?");
        for synonym in ["cazadora", "chamarra", "abrigo", "jacket"] {
            assert!(out.contains(synonym), "missing {}", synonym);
        }
    }

    #[test]
    fn unrecognized_query_passes_through() {
        assert_eq!(normalizer().expand("Hola Mundo"), "hola mundo");
    }

    #[test]
    fn expansion_is_cumulative_across_groups() {
        let out = normalizer().expand("sudadera o camiseta");
        assert!(out.contains("hoodie"));
        assert!(out.contains("playera"));
    }

    #[rstest]
    #[case("XXL", "2xl")]
    #[case("xxl", "2xl")]
    #[case("xxxl", "3xl")]
    #[case("xxxxl", "4xl")]
    fn size_tokens_rewritten(#[case] token: &str, #[case] expected: &str) {
        let out = normalizer().expand(&format!("camiseta talla {}", token));
        assert!(out.contains(expected), "{} -> {}", token, out);
        assert!(!contains_word(&format!(" {} ", out), &token.to_lowercase()));
    }

    #[test]
    fn unregistered_size_tokens_untouched() {
        let out = normalizer().expand("talla M o LX");
        assert!(out.contains(" m ") || out.ends_with(" m") || out.contains("m o"));
        assert!(out.contains("lx"));
    }

    #[test]
    fn feminine_color_form_triggers_expansion() {
        let out = normalizer().expand("quiero una chaqueta roja");
        assert!(out.contains("rojo"));
        assert!(out.contains("granate"));
        assert!(out.contains("burdeos"));
    }

    #[rstest]
    #[case("rojo", &["rojo", "roja", "rojos", "rojas"])]
    #[case("gris", &["gris", "grises"])]
    #[case("naranja", &["naranja", "naranjas"])]
    #[case("feliz", &["feliz", "felices"])]
    fn adjective_morphology(#[case] canonical: &str, #[case] expected: &[&str]) {
        let variants = adjective_variants(canonical);
        for form in expected {
            assert!(variants.iter().any(|v| v == form), "missing {}", form);
        }
    }
}
