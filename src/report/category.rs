use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum CrashCategory {
    #[serde(rename = "Mid-Air Collision")]
    MidAirCollision,
    #[serde(rename = "Mechanical Failure")]
    MechanicalFailure,
    #[serde(rename = "Weather-Related")]
    Weather,
    #[serde(rename = "Fire/Explosion")]
    FireExplosion,
    #[serde(rename = "Pilot Error")]
    PilotError,
    #[serde(rename = "Hijacking/Terrorism")]
    HijackingTerrorism,
    #[serde(rename = "Shot Down (War/Conflict)")]
    ShotDown,
    #[serde(rename = "Takeoff/Landing Accident")]
    TakeoffLanding,
    #[serde(rename = "Fuel Exhaustion")]
    FuelExhaustion,
    #[serde(rename = "Other/Unknown")]
    Other,
}

/// Checked in order; the first category with a matching keyword wins.
const RULES: &[(CrashCategory, &[&str])] = &[
    (CrashCategory::MidAirCollision, &["collision", "midair", "crash into another"]),
    (CrashCategory::MechanicalFailure, &["engine failure", "mechanical failure", "technical issue"]),
    (CrashCategory::Weather, &["weather", "storm", "turbulence"]),
    (CrashCategory::FireExplosion, &["fire", "explosion", "smoke"]),
    (CrashCategory::PilotError, &["pilot error", "loss of control", "incorrect maneuver"]),
    (CrashCategory::HijackingTerrorism, &["hijacking", "terrorist", "bomb"]),
    (CrashCategory::ShotDown, &["shot down", "missile", "military attack"]),
    (CrashCategory::TakeoffLanding, &["runway", "takeoff", "landing"]),
    (CrashCategory::FuelExhaustion, &["fuel exhaustion", "ran out of fuel"]),
];

impl CrashCategory {
    pub fn label(&self) -> &'static str {
        match self {
            CrashCategory::MidAirCollision => "Mid-Air Collision",
            CrashCategory::MechanicalFailure => "Mechanical Failure",
            CrashCategory::Weather => "Weather-Related",
            CrashCategory::FireExplosion => "Fire/Explosion",
            CrashCategory::PilotError => "Pilot Error",
            CrashCategory::HijackingTerrorism => "Hijacking/Terrorism",
            CrashCategory::ShotDown => "Shot Down (War/Conflict)",
            CrashCategory::TakeoffLanding => "Takeoff/Landing Accident",
            CrashCategory::FuelExhaustion => "Fuel Exhaustion",
            CrashCategory::Other => "Other/Unknown",
        }
    }
}

/// Keyword category of a crash summary (plain substring match, case-insensitive).
pub fn categorize(summary: &str) -> CrashCategory {
    let lower = summary.to_lowercase();
    RULES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|kw| lower.contains(kw)))
        .map(|(category, _)| *category)
        .unwrap_or(CrashCategory::Other)
}
