//! Human-readable rendering of analysis results.

use bodyshape_core::photo::ImageInfo;
use bodyshape_core::{Analysis, BodyType, ClassificationResult, RecommendationRecord};
use std::fmt::Write;

const RULE: &str = "============================================================";

pub fn analysis(image: &str, analysis: &Analysis) -> String {
    let mut out = String::new();
    let c = &analysis.classification;
    let m = &analysis.measurements;

    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "BODY TYPE ANALYSIS: {image}");
    let _ = writeln!(out, "{RULE}");
    out.push_str(&classification(c));

    let _ = writeln!(out, "\nBody measurements (fraction of image width):");
    let _ = writeln!(out, "  - Shoulder width: {:.3}", m.shoulder_width);
    let _ = writeln!(out, "  - Hip width: {:.3}", m.hip_width);
    let _ = writeln!(out, "  - Estimated waist width: {:.3}", m.waist_width);
    let _ = writeln!(out, "  - Torso length: {:.3}", m.torso_length);

    let _ = writeln!(out);
    out.push_str(&recommendations(c.body_type, &analysis.recommendations));
    let _ = writeln!(out, "{RULE}");
    out
}

pub fn classification(result: &ClassificationResult) -> String {
    let mut out = String::new();
    let r = &result.ratios;
    let _ = writeln!(out, "Detected body type: {}", result.body_type);
    let _ = writeln!(out, "Confidence: {:.1}%", result.confidence * 100.0);
    let _ = writeln!(out, "\nRatios:");
    let _ = writeln!(out, "  - Shoulder to hip: {:.3}", r.shoulder_to_hip);
    let _ = writeln!(out, "  - Waist to shoulder: {:.3}", r.waist_to_shoulder);
    let _ = writeln!(out, "  - Waist to hip: {:.3}", r.waist_to_hip);
    out
}

pub fn recommendations(body_type: BodyType, record: &RecommendationRecord) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "STYLE RECOMMENDATIONS FOR {}", body_type.display_name().to_uppercase());
    let _ = writeln!(out, "{}", "-".repeat(50));
    let _ = writeln!(out, "{}", record.description);

    for (heading, items) in [
        ("Key characteristics", &record.characteristics),
        ("Styling goals", &record.goals),
    ] {
        let _ = writeln!(out, "\n{heading}:");
        for item in items {
            let _ = writeln!(out, "  - {item}");
        }
    }

    for (category, items) in record.categories() {
        let _ = writeln!(out, "\nRecommended {category}:");
        for item in items {
            let _ = writeln!(out, "  - {item}");
        }
    }

    if !record.tips.is_empty() {
        let _ = writeln!(out, "\nStyle tips:");
        for tip in &record.tips {
            let _ = writeln!(out, "  - {tip}");
        }
    }
    out
}

pub fn image_info(path: &str, info: &ImageInfo) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Image: {path}");
    let _ = writeln!(out, "  Format: {}", info.format.as_deref().unwrap_or("unknown"));
    let _ = writeln!(out, "  Size: {}x{}", info.width, info.height);
    let _ = writeln!(out, "  Color: {}", info.color);
    let _ = writeln!(out, "  Transparency: {}", if info.has_alpha { "yes" } else { "no" });
    out
}
