//! Keyword heuristics for the response language and the asker's persona.

use crate::models::{Language, Persona};

const ROMANIZED_HINDI: [&str; 13] = [
    "kisan", "kheti", "fasal", "paani", "baarish", "kuan", "aam", "gaon", "zila", "taluka",
    "sarkar", "yojana", "bhujal",
];

const DEVANAGARI_HINDI: [&str; 13] = [
    "किसान",
    "खेती",
    "फसल",
    "पानी",
    "बारिश",
    "कुआं",
    "गांव",
    "जिला",
    "तालुका",
    "सरकार",
    "योजना",
    "भूजल",
    "सिंचाई",
];

const FARMER_KEYWORDS: [&str; 20] = [
    "crop",
    "farming",
    "irrigation",
    "water for crops",
    "bore well",
    "tube well",
    "field",
    "agriculture",
    "harvest",
    "planting",
    "seeds",
    "fertilizer",
    "my farm",
    "my field",
    "my crops",
    "water shortage",
    "drought",
    "rainfall for farming",
    "when to irrigate",
    "water availability",
];

const PLANNER_KEYWORDS: [&str; 19] = [
    "policy",
    "planning",
    "district",
    "taluka",
    "state",
    "government",
    "water management",
    "resource allocation",
    "budget",
    "scheme",
    "water conservation",
    "aquifer management",
    "recharge projects",
    "water policy",
    "district planning",
    "resource planning",
    "groundwater assessment",
    "monitoring",
    "survey data",
];

const RESEARCHER_KEYWORDS: [&str; 12] = [
    "data analysis",
    "trends",
    "statistical",
    "research",
    "study",
    "correlation",
    "technical",
    "methodology",
    "analysis",
    "water table depth",
    "aquifer characteristics",
    "hydrogeology",
];

fn is_devanagari(c: char) -> bool {
    ('\u{0900}'..='\u{097F}').contains(&c)
}

/// Hindi if the text has any Devanagari or a known Hindi keyword.
pub fn detect_language(text: &str) -> Language {
    if text.chars().any(is_devanagari) {
        return Language::Hindi;
    }
    let lower = text.to_lowercase();
    let romanized = ROMANIZED_HINDI.iter().any(|k| lower.contains(k));
    let devanagari = DEVANAGARI_HINDI.iter().any(|k| text.contains(k));
    if romanized || devanagari {
        Language::Hindi
    } else {
        Language::English
    }
}

/// Number of keywords from `keywords` that occur in `lower`.
fn score(lower: &str, keywords: &[&str]) -> usize {
    keywords.iter().filter(|k| lower.contains(*k)).count()
}

/// Guess the persona from keyword counts; farmer wins ties, then planner.
pub fn detect_user_type(text: &str) -> Persona {
    let lower = text.to_lowercase();
    let farmer = score(&lower, &FARMER_KEYWORDS);
    let planner = score(&lower, &PLANNER_KEYWORDS);
    let researcher = score(&lower, &RESEARCHER_KEYWORDS);

    if farmer > 0 && farmer >= planner {
        Persona::Farmer
    } else if planner > 0 && planner >= farmer {
        Persona::Planner
    } else if researcher > 0 {
        Persona::Researcher
    } else {
        Persona::General
    }
}
