//! Decorative "AI analysis" report
//!
//! The numbers shown on the visitor's result page are random decoration drawn
//! from plausible-looking ranges. Nothing here inspects the image.

use rand::Rng;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    /// Always true: the figures are generated, not measured
    pub decorative: bool,
    pub sections: Vec<AnalysisSection>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisSection {
    pub category: String,
    pub items: Vec<AnalysisItem>,
}

#[derive(Debug, Clone, Serialize)]
pub struct AnalysisItem {
    pub label: String,
    pub value: String,
}

impl AnalysisItem {
    fn new(label: &str, value: String) -> Self {
        Self {
            label: label.to_string(),
            value,
        }
    }
}

const LIGHTING_DIRECTIONS: [&str; 3] = ["upper left", "upper right", "front top"];

fn side<R: Rng + ?Sized>(rng: &mut R) -> &'static str {
    if rng.gen_bool(0.5) {
        "left"
    } else {
        "right"
    }
}

/// Draw a fresh report from the thread-local RNG
pub fn generate_report() -> AnalysisReport {
    generate_report_with(&mut rand::thread_rng())
}

/// Draw a report from the given RNG
pub fn generate_report_with<R: Rng + ?Sized>(rng: &mut R) -> AnalysisReport {
    let neutral: u32 = rng.gen_range(75..90);
    let positive: u32 = rng.gen_range(5..100 - neutral);
    let negative = 100 - neutral - positive;

    let skin_r: u32 = rng.gen_range(235..265u32).min(255);
    let skin_g: u32 = rng.gen_range(210..240);
    let skin_b: u32 = rng.gen_range(195..225);

    let basic = AnalysisSection {
        category: "Basic analysis".to_string(),
        items: vec![
            AnalysisItem::new("Face symmetry", format!("{:.1}%", rng.gen_range(90.0..98.0))),
            AnalysisItem::new("Face detection confidence", format!("{:.1}%", rng.gen_range(97.0..100.0))),
            AnalysisItem::new(
                "Image resolution",
                format!("{}×{}px", rng.gen_range(600..800), rng.gen_range(800..1000)),
            ),
        ],
    };

    let emotion = AnalysisSection {
        category: "Expression and emotion".to_string(),
        items: vec![
            AnalysisItem::new("Neutral", format!("{}%", neutral)),
            AnalysisItem::new("Positive", format!("{}%", positive)),
            AnalysisItem::new("Negative", format!("{}%", negative)),
        ],
    };

    let gaze_side = side(rng);
    let gaze = rng.gen_range(2.0..10.0);
    let tilt_side = side(rng);
    let tilt = rng.gen_range(1.0..5.0);

    let pose = AnalysisSection {
        category: "Gaze and angle".to_string(),
        items: vec![
            AnalysisItem::new("Gaze direction", format!("{} {:.1}°", gaze_side, gaze)),
            AnalysisItem::new("Head tilt", format!("{} {:.1}°", tilt_side, tilt)),
            AnalysisItem::new("Face angle", format!("{:.1}° from frontal", rng.gen_range(2.0..12.0))),
        ],
    };

    let lighting_direction = LIGHTING_DIRECTIONS[rng.gen_range(0..LIGHTING_DIRECTIONS.len())];

    let colour = AnalysisSection {
        category: "Colour and lighting".to_string(),
        items: vec![
            AnalysisItem::new("Average skin tone", format!("RGB({}, {}, {})", skin_r, skin_g, skin_b)),
            AnalysisItem::new(
                "Lighting direction",
                format!("{} {}°", lighting_direction, rng.gen_range(35..55)),
            ),
            AnalysisItem::new("Brightness level", format!("{}%", rng.gen_range(65..85))),
        ],
    };

    AnalysisReport {
        decorative: true,
        sections: vec![basic, emotion, pose, colour],
    }
}
