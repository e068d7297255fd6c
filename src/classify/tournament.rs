use crate::models::{Surface, TournamentLevel};

const GRAND_SLAMS: &[(&str, Surface)] = &[
    ("australian open", Surface::Hard),
    ("roland garros", Surface::Clay),
    ("french open", Surface::Clay),
    ("wimbledon", Surface::Grass),
    ("us open", Surface::Hard),
];

// Largest prize tier first.
const ITF_TIERS: &[(&[&str], TournamentLevel)] = &[
    (&["m100", "w100", "100k"], TournamentLevel::Itf100k),
    (&["m80", "w80", "80k"], TournamentLevel::Itf80k),
    (&["m60", "w60", "60k"], TournamentLevel::Itf60k),
    (&["m40", "w40", "40k"], TournamentLevel::Itf40k),
    (&["m25", "w25", "25k"], TournamentLevel::Itf25k),
    (&["m15", "w15", "15k"], TournamentLevel::Itf15k),
];

/// Best-effort tier from a free-text tournament name.
pub fn tournament_level(name: &str) -> TournamentLevel {
    let name = name.to_lowercase();
    if name.trim().is_empty() {
        return TournamentLevel::Unknown;
    }

    if name.contains("itf") {
        return ITF_TIERS
            .iter()
            .find(|(needles, _)| needles.iter().any(|n| name.contains(n)))
            .map(|(_, level)| *level)
            .unwrap_or(TournamentLevel::Itf25k);
    }
    if name.contains("challenger") {
        return TournamentLevel::Challenger;
    }
    if GRAND_SLAMS.iter().any(|(slam, _)| name.contains(slam)) {
        return TournamentLevel::GrandSlam;
    }
    if name.contains("atp") {
        return if name.contains("1000") || name.contains("masters") {
            TournamentLevel::Atp1000
        } else if name.contains("500") {
            TournamentLevel::Atp500
        } else {
            TournamentLevel::Atp250
        };
    }
    TournamentLevel::Unknown
}

/// Best-effort surface: explicit surface words first, then Grand Slam venues.
pub fn surface(name: &str) -> Surface {
    let name = name.to_lowercase();
    if name.contains("clay") {
        Surface::Clay
    } else if name.contains("grass") {
        Surface::Grass
    } else if name.contains("carpet") {
        Surface::Carpet
    } else if name.contains("hard") {
        Surface::Hard
    } else {
        GRAND_SLAMS
            .iter()
            .find(|(slam, _)| name.contains(slam))
            .map(|(_, surface)| *surface)
            .unwrap_or(Surface::Unknown)
    }
}
