use lazy_static::lazy_static;
use shared::{DiseaseInfo, Severity};
use std::collections::HashMap;

lazy_static! {
    static ref DISEASE_CATALOG: HashMap<&'static str, DiseaseInfo> = {
        let mut catalog = HashMap::new();
        catalog.insert(
            "healthy",
            entry(
                "The leaf appears healthy with no visible signs of disease.",
                Severity::None,
                "Continue regular monitoring and good agricultural practices.",
                false,
            ),
        );
        catalog.insert(
            "cordana",
            entry(
                "Cordana leaf spot is a fungal disease causing dark spots on leaves.",
                Severity::Moderate,
                "Apply fungicide and improve air circulation around plants.",
                true,
            ),
        );
        catalog.insert(
            "pestalotiopsis",
            entry(
                "Pestalotiopsis causes leaf spots and can lead to leaf blight.",
                Severity::ModerateToHigh,
                "Remove affected leaves and apply appropriate fungicide treatment.",
                true,
            ),
        );
        catalog.insert(
            "sigatoka",
            entry(
                "Sigatoka is a serious fungal disease causing yellowing and black streaks.",
                Severity::High,
                "Immediate fungicide treatment and removal of affected leaves required.",
                true,
            ),
        );
        catalog
    };
}

fn entry(description: &str, severity: Severity, recommendation: &str, urgent: bool) -> DiseaseInfo {
    DiseaseInfo {
        description: description.to_string(),
        severity,
        recommendation: recommendation.to_string(),
        urgent,
    }
}

/// Agronomic guidance for a predicted label, if the label is known.
pub fn disease_info(label: &str) -> Option<DiseaseInfo> {
    DISEASE_CATALOG.get(label.to_ascii_lowercase().as_str()).cloned()
}
