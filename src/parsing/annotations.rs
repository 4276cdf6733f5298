
use itertools::Itertools;
use std::collections::BTreeSet;

use crate::parsing::formats::FieldMap;

/// The derived annotation labels for one record: `;`-joined, deduplicated, and sorted so the
/// output is deterministic regardless of entry order in the source file.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct AnnotationLabels {
    /// e.g. "E123K"
    pub effect: String,
    /// e.g. "SYNONYMOUS_CODING", possibly with the ";EXON" marker appended
    pub functional_consequence: String
}

/// Derives `(effect, functional_consequence)` from the free-form annotation payload of a record.
/// Precedence, first convention found wins:
/// 1. legacy SnpEff `EFF` entries - consequence is the token before the first parenthesis,
///    effect is pipe-field index 3;
/// 2. newer SnpEff `ANN` entries - consequence is pipe-field 1, effect is pipe-field 9;
/// 3. caller-native `FC` entries of `category_effect` shape - underscore-split, with the literal
///    `;EXON` marker appended when the exon flag is present.
/// Records carrying none of the three yield empty strings.
/// # Arguments
/// * `info` - the record's INFO field mapping
pub fn extract_annotations(info: &FieldMap) -> AnnotationLabels {
    if let Some(eff) = info.get("EFF") {
        return parse_legacy_snpeff(eff);
    }

    if let Some(ann) = info.get("ANN") {
        return parse_modern_snpeff(ann);
    }

    if let Some(fc) = info.get("FC") {
        return parse_caller_native(fc, info.contains_key("EXON"));
    }

    AnnotationLabels::default()
}

/// Legacy `EFF` entries look like `NON_SYNONYMOUS_CODING(MODERATE|MISSENSE|gAg/gTg|E123K|...)`.
fn parse_legacy_snpeff(value: &str) -> AnnotationLabels {
    let mut consequences: BTreeSet<&str> = Default::default();
    let mut effects: BTreeSet<&str> = Default::default();
    for entry in value.split(',') {
        if let Some(category) = entry.split('(').next() {
            if !category.is_empty() {
                consequences.insert(category);
            }
        }
        if let Some(effect) = entry.split('|').nth(3) {
            if !effect.is_empty() {
                effects.insert(effect);
            }
        }
    }

    AnnotationLabels {
        effect: effects.iter().join(";"),
        functional_consequence: consequences.iter().join(";")
    }
}

/// Modern `ANN` entries are fully pipe-delimited: field 1 is the consequence,
/// field 9 is the transcript-level effect (HGVS.c).
fn parse_modern_snpeff(value: &str) -> AnnotationLabels {
    let mut consequences: BTreeSet<&str> = Default::default();
    let mut effects: BTreeSet<&str> = Default::default();
    for entry in value.split(',') {
        let fields: Vec<&str> = entry.split('|').collect();
        if let Some(&consequence) = fields.get(1) {
            if !consequence.is_empty() {
                consequences.insert(consequence);
            }
        }
        if let Some(&effect) = fields.get(9) {
            if !effect.is_empty() {
                effects.insert(effect);
            }
        }
    }

    AnnotationLabels {
        effect: effects.iter().join(";"),
        functional_consequence: consequences.iter().join(";")
    }
}

/// Caller-native `FC` tokens are `_`-delimited `category_effect` pairs, e.g. `Missense_E123K`.
/// A missing effect token means a mutation with no consequence (Silent, Noncoding, ...),
/// which is not an error.
fn parse_caller_native(value: &str, has_exon_flag: bool) -> AnnotationLabels {
    let mut consequences: BTreeSet<&str> = Default::default();
    let mut effects: BTreeSet<&str> = Default::default();
    for entry in value.split(',') {
        let mut tokens = entry.split('_');
        if let Some(category) = tokens.next() {
            if !category.is_empty() {
                consequences.insert(category);
            }
        }
        if let Some(effect) = tokens.next() {
            if !effect.is_empty() {
                effects.insert(effect);
            }
        }
    }

    let mut functional_consequence = consequences.iter().join(";");
    if has_exon_flag {
        functional_consequence.push_str(";EXON");
    }

    AnnotationLabels {
        effect: effects.iter().join(";"),
        functional_consequence
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info_map(pairs: &[(&str, &str)]) -> FieldMap {
        pairs.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_no_annotation_present() {
        let info = info_map(&[("DP", "10")]);
        assert_eq!(extract_annotations(&info), AnnotationLabels::default());
    }

    #[test]
    fn test_legacy_snpeff() {
        let info = info_map(&[(
            "EFF",
            "NON_SYNONYMOUS_CODING(MODERATE|MISSENSE|gAg/gTg|E123K|SF3B1),SYNONYMOUS_CODING(LOW|SILENT|gGa/gAa||SF3B1)"
        )]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "NON_SYNONYMOUS_CODING;SYNONYMOUS_CODING");
        // the silent entry has an empty effect token, which is dropped
        assert_eq!(labels.effect, "E123K");
    }

    #[test]
    fn test_legacy_snpeff_deduplicates() {
        let info = info_map(&[(
            "EFF",
            "MISSENSE(a|b|c|E1K|x),MISSENSE(a|b|c|E1K|y)"
        )]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "MISSENSE");
        assert_eq!(labels.effect, "E1K");
    }

    #[test]
    fn test_modern_snpeff() {
        // pipe-field 9 is the transcript-level effect (HGVS.c); field 10 is protein-level
        let info = info_map(&[(
            "ANN",
            "T|missense_variant|MODERATE|SF3B1|ENSG1|transcript|ENST1|coding|1/5|c.1A>T|p.Glu123Lys"
        )]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "missense_variant");
        assert_eq!(labels.effect, "c.1A>T");
    }

    #[test]
    fn test_legacy_wins_over_modern() {
        let info = info_map(&[
            ("EFF", "MISSENSE(a|b|c|E1K|x)"),
            ("ANN", "T|stop_gained|a|b|c|d|e|f|g|p.Q10*")
        ]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "MISSENSE");
        assert_eq!(labels.effect, "E1K");
    }

    #[test]
    fn test_caller_native_fc() {
        let info = info_map(&[("FC", "Missense_E123K,Silent")]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "Missense;Silent");
        assert_eq!(labels.effect, "E123K");
    }

    #[test]
    fn test_caller_native_exon_marker() {
        let info = info_map(&[("FC", "Missense_E123K"), ("EXON", "")]);
        let labels = extract_annotations(&info);
        assert_eq!(labels.functional_consequence, "Missense;EXON");
        assert_eq!(labels.effect, "E123K");
    }
}
