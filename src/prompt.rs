//! Prompt composition.
//!
//! The prompt is assembled from a [`Template`] chosen by
//! `(has_context, persona, language)`; [`select_template`] spells out all
//! sixteen combinations. The template's slots are filled with the question,
//! the matched table rows and the retrieved document excerpts.

use std::fmt::Write as _;

use crate::models::{Language, Persona};
use crate::retrieve::RetrievedContext;
use crate::tables::{CellValue, DistrictRecord, Measurements, TalukaRecord};

/// Sentence the model must use when the supplied context is insufficient.
pub const INSUFFICIENT_CONTEXT: &str = "I don't have enough information to answer this question.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WordBudget {
    pub min: u32,
    pub max: u32,
}

pub fn word_budget(persona: Persona) -> WordBudget {
    let (min, max) = match persona {
        Persona::Farmer => (20, 50),
        Persona::Planner => (80, 120),
        Persona::Researcher => (50, 80),
        Persona::General => (30, 60),
    };
    WordBudget { min, max }
}

/// Named slots of a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Template {
    pub role: &'static str,
    pub mode: &'static str,
    pub instructions: &'static [&'static str],
    pub audience: &'static str,
    pub guidelines: &'static [&'static str],
    pub budget: WordBudget,
    pub example: Option<&'static str>,
    pub language: Language,
}

const ROLE_GROUNDED: &str =
    "You are a groundwater data specialist for Gujarat, India with access to official government data.";
const ROLE_GENERAL: &str =
    "You are a helpful groundwater expert and agricultural advisor for India.";

const MODE_GROUNDED: &str = "SPECIFIC DATA FOUND - USE THIS DATA TO ANSWER";
const MODE_GENERAL: &str = "GENERAL GROUNDWATER QUESTION - USE YOUR KNOWLEDGE TO HELP";

const GROUNDED_INSTRUCTIONS: &[&str] = &[
    "Answer using ONLY the records and excerpts above.",
    "Use the exact numbers given. Always state units: rainfall in mm, areas in hectares (ha).",
    "Cite where each figure comes from: the Taluka or District records, or the source document name.",
    "If several districts or talukas appear, make clear which figure belongs to which.",
    "If the information above is not enough to answer, say \"I don't have enough information to answer this question.\"",
];

const GENERAL_INSTRUCTIONS: &[&str] = &[
    "No local records matched this question. Answer from general knowledge of groundwater, irrigation and water management.",
    "Be educational and give practical best practices and actionable suggestions.",
    "Do not invent specific figures for any district or taluka.",
];

/// Template for one combination of context availability, persona and language.
pub fn select_template(has_context: bool, persona: Persona, language: Language) -> Template {
    use Language::{English, Hindi};
    use Persona::{Farmer, General, Planner, Researcher};

    let (audience, guidelines, example): (&'static str, &'static [&'static str], Option<&'static str>) =
        match (has_context, persona, language) {
            (true, Farmer, English) => (
                "For Farmers",
                &[
                    "Simple language with the actual figures",
                    "Practical advice using the real rainfall and area data",
                    "Give a clear yes/no answer when possible",
                ],
                Some("<taluka> gets <rainfall> mm of rain over <area> hectares. Good for farming."),
            ),
            (true, Planner, English) => (
                "For Planners",
                &[
                    "Detailed analysis using all the figures",
                    "Include recharge worthy area by category (C, NC, PQ)",
                    "Give planning recommendations grounded in the data",
                ],
                None,
            ),
            (true, Researcher, English) => (
                "For Researchers",
                &[
                    "Precise, technical reading of the figures",
                    "Compare categories and locations where the data allows",
                    "Point out gaps or missing values in the data",
                ],
                None,
            ),
            (true, General, English) => (
                "For General Users",
                &[
                    "Plain language with the key figures",
                    "Explain briefly what the numbers mean",
                ],
                None,
            ),
            (false, Farmer, English) => (
                "For Farmers",
                &[
                    "Practical general advice",
                    "Focus on water conservation and efficient irrigation",
                    "Give actionable farming tips",
                ],
                Some("Use drip irrigation to save water. Collect rainwater. Test soil regularly for better crop planning."),
            ),
            (false, Planner, English) => (
                "For Planners",
                &[
                    "Comprehensive water management advice",
                    "Include policy suggestions and strategies",
                    "Provide long-term solutions",
                ],
                Some("Implement rainwater harvesting policies. Develop community water conservation programs. Monitor groundwater levels regularly."),
            ),
            (false, Researcher, English) => (
                "For Researchers",
                &[
                    "Explain the relevant hydrogeological concepts",
                    "Mention standard assessment methods and data sources",
                ],
                None,
            ),
            (false, General, English) => (
                "For General Users",
                &[
                    "Clear, friendly explanation",
                    "One or two practical takeaways",
                ],
                None,
            ),
            (true, Farmer, Hindi) => (
                "किसान के लिए",
                &[
                    "डेटा से वास्तविक संख्याओं का उपयोग करें",
                    "व्यावहारिक सलाह दें - वर्षा, क्षेत्रफल डेटा के साथ",
                    "हां/नहीं में जवाब दें जहाँ संभव हो",
                ],
                Some("<तालुका> में वर्षा <rainfall> mm है, क्षेत्रफल <area> ha है। खेती के लिए उपयुक्त है।"),
            ),
            (true, Planner, Hindi) => (
                "योजनाकार के लिए",
                &[
                    "सभी वास्तविक आंकड़े शामिल करें",
                    "तकनीकी डेटा का विस्तृत उल्लेख करें",
                    "योजना संबंधी सुझाव दें",
                ],
                None,
            ),
            (true, Researcher, Hindi) => (
                "शोधकर्ता के लिए",
                &[
                    "आंकड़ों का सटीक और तकनीकी विश्लेषण करें",
                    "श्रेणियों (C, NC, PQ) और स्थानों की तुलना करें",
                    "डेटा में कमियों का उल्लेख करें",
                ],
                None,
            ),
            (true, General, Hindi) => (
                "सामान्य उपयोगकर्ता के लिए",
                &[
                    "मुख्य आंकड़े सरल भाषा में बताएं",
                    "संख्याओं का अर्थ संक्षेप में समझाएं",
                ],
                None,
            ),
            (false, Farmer, Hindi) => (
                "किसान के लिए",
                &[
                    "व्यावहारिक सामान्य सलाह",
                    "भूजल संरक्षण के तरीके बताएं",
                    "सिंचाई की बेहतर विधियां सुझाएं",
                ],
                Some("ड्रिप सिंचाई से पानी बचाएं। बारिश का पानी इकट्ठा करें। मिट्टी की जांच कराएं।"),
            ),
            (false, Planner, Hindi) => (
                "योजनाकार के लिए",
                &[
                    "व्यापक जल प्रबंधन सलाह",
                    "नीतिगत सुझाव और रणनीति दें",
                    "दीर्घकालिक समाधान बताएं",
                ],
                Some("भूजल प्रबंधन के लिए रेन वाटर हार्वेस्टिंग बढ़ाएं। सामुदायिक जल संरक्षण योजना बनाएं।"),
            ),
            (false, Researcher, Hindi) => (
                "शोधकर्ता के लिए",
                &[
                    "संबंधित भूजल विज्ञान की अवधारणाएं समझाएं",
                    "मानक आकलन विधियों और डेटा स्रोतों का उल्लेख करें",
                ],
                None,
            ),
            (false, General, Hindi) => (
                "सामान्य उपयोगकर्ता के लिए",
                &[
                    "स्पष्ट और सरल व्याख्या",
                    "एक-दो व्यावहारिक सुझाव",
                ],
                None,
            ),
        };

    let (role, mode, instructions) = if has_context {
        (ROLE_GROUNDED, MODE_GROUNDED, GROUNDED_INSTRUCTIONS)
    } else {
        (ROLE_GENERAL, MODE_GENERAL, GENERAL_INSTRUCTIONS)
    };

    Template {
        role,
        mode,
        instructions,
        audience,
        guidelines,
        budget: word_budget(persona),
        example,
        language,
    }
}

/// Build the full prompt for `question`.
pub fn compose(
    question: &str,
    context: &RetrievedContext,
    persona: Persona,
    language: Language,
) -> String {
    let template = select_template(context.has_context(), persona, language);
    render(&template, question, context, persona)
}

fn render(
    template: &Template,
    question: &str,
    context: &RetrievedContext,
    persona: Persona,
) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "{}", template.role);
    let _ = writeln!(out);
    let _ = writeln!(out, "{}:", template.mode);
    let _ = writeln!(out);
    let _ = writeln!(out, "User Type: {}", persona);
    let _ = writeln!(out, "User Question: {}", question.trim());

    let tables = &context.tables;
    if !tables.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "REAL DATA FROM GOVERNMENT RECORDS:");
        for t in &tables.taluka_data {
            render_taluka(&mut out, t);
        }
        for d in &tables.district_data {
            render_district(&mut out, d);
        }
        if !tables.found_locations.is_empty() {
            let _ = writeln!(out, "Locations Found: {}", tables.found_locations.join(", "));
        }
    }

    if !context.chunks.is_empty() {
        let _ = writeln!(out);
        let _ = writeln!(out, "DOCUMENT EXCERPTS:");
        for chunk in &context.chunks {
            let _ = writeln!(
                out,
                "Source: {}, Relevance: {:.2}",
                chunk.source, chunk.relevance
            );
            let _ = writeln!(out, "{}", chunk.text.trim());
            let _ = writeln!(out);
        }
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "INSTRUCTIONS:");
    for line in template.instructions {
        let _ = writeln!(out, "- {}", line);
    }

    let _ = writeln!(out);
    match template.language {
        Language::English => {
            let _ = writeln!(out, "LANGUAGE: Respond in ENGLISH");
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "RESPONSE GUIDELINES ({}, {}-{} words):",
                template.audience, template.budget.min, template.budget.max
            );
        }
        Language::Hindi => {
            let _ = writeln!(out, "IMPORTANT: RESPOND IN HINDI (हिंदी में उत्तर दें)");
            let _ = writeln!(out);
            let _ = writeln!(out, "HINDI RESPONSE GUIDELINES:");
            let _ = writeln!(out, "- उत्तर हिंदी में दें (Devanagari script में)");
            let _ = writeln!(out, "- सरल और स्पष्ट भाषा का उपयोग करें");
            let _ = writeln!(
                out,
                "- अंक और माप की इकाइयां अंग्रेजी में रखें (जैसे mm, ha)"
            );
            let _ = writeln!(out);
            let _ = writeln!(
                out,
                "USER TYPE GUIDELINES ({}, {}-{} शब्दों में):",
                template.audience, template.budget.min, template.budget.max
            );
        }
    }
    for line in template.guidelines {
        let _ = writeln!(out, "- {}", line);
    }
    if let Some(example) = template.example {
        let _ = writeln!(out);
        let _ = writeln!(out, "Example: \"{}\"", example);
    }

    out
}

fn render_taluka(out: &mut String, t: &TalukaRecord) {
    let mut place = String::new();
    if let Some(d) = t.district.display() {
        let _ = write!(place, "District: {}", d);
    }
    if let Some(s) = t.state.display() {
        if !place.is_empty() {
            place.push_str(", ");
        }
        let _ = write!(place, "State: {}", s);
    }
    if place.is_empty() {
        let _ = writeln!(out, "Taluka: {}", t.taluk);
    } else {
        let _ = writeln!(out, "Taluka: {} ({})", t.taluk, place);
    }
    render_measurements(out, &t.measurements);
}

fn render_district(out: &mut String, d: &DistrictRecord) {
    match d.state.display() {
        Some(s) => {
            let _ = writeln!(out, "District: {} (State: {})", d.district, s);
        }
        None => {
            let _ = writeln!(out, "District: {}", d.district);
        }
    }
    render_measurements(out, &d.measurements);
}

fn render_measurements(out: &mut String, m: &Measurements) {
    let _ = writeln!(
        out,
        "  - Rainfall: total {} (C: {}, NC: {}, PQ: {})",
        with_unit(&m.rainfall_total, "mm"),
        with_unit(&m.rainfall_c, "mm"),
        with_unit(&m.rainfall_nc, "mm"),
        with_unit(&m.rainfall_pq, "mm"),
    );
    let _ = writeln!(
        out,
        "  - Total geographical area: {}",
        with_unit(&m.total_geographical_area, "ha")
    );
    let _ = writeln!(
        out,
        "  - Recharge worthy area: total {} (C: {}, NC: {}, PQ: {})",
        with_unit(&m.recharge_worthy_area_total, "ha"),
        with_unit(&m.recharge_worthy_area_c, "ha"),
        with_unit(&m.recharge_worthy_area_nc, "ha"),
        with_unit(&m.recharge_worthy_area_pq, "ha"),
    );
}

fn with_unit(value: &CellValue, unit: &str) -> String {
    match value {
        CellValue::Number(_) => format!("{} {}", value.display().unwrap_or_default(), unit),
        CellValue::Text(s) => s.clone(),
        CellValue::Missing => "not available".to_string(),
    }
}
