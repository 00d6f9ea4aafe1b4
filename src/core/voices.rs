use crate::core::state::Gender;
use serde::Serialize;

pub const DEFAULT_MALE_VOICE: &str = "Puck";
pub const DEFAULT_FEMALE_VOICE: &str = "Kore";
pub const DEFAULT_NEUTRAL_VOICE: &str = "Kore";
/// Voice given to characters added by hand.
pub const DEFAULT_ADDED_VOICE: &str = "Kore";

/// A prebuilt provider voice. The same `name` may appear under several display names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Voice {
    pub name: &'static str,
    pub display_name: &'static str,
    pub gender: Gender,
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct VoiceCategory {
    pub name: &'static str,
    pub voices: &'static [Voice],
}

const fn voice(name: &'static str, display_name: &'static str, gender: Gender) -> Voice {
    Voice {
        name,
        display_name,
        gender,
    }
}

const KORE: Voice = voice("Kore", "Kore", Gender::Female);
const ZEPHYR: Voice = voice("Zephyr", "Zephyr", Gender::Female);
const PUCK: Voice = voice("Puck", "Puck", Gender::Male);
const CHARON: Voice = voice("Charon", "Charon", Gender::Male);
const FENRIR: Voice = voice("Fenrir", "Fenrir", Gender::Male);

// Context variants
const CHARON_DEEP: Voice = voice("Charon", "Charon (Deep)", Gender::Male);
const FENRIR_DEEP: Voice = voice("Fenrir", "Fenrir (Deep)", Gender::Male);
const CHARON_SERIOUS: Voice = voice("Charon", "Charon (Serious)", Gender::Male);
const FENRIR_SERIOUS: Voice = voice("Fenrir", "Fenrir (Serious)", Gender::Male);

const ALL_FEMALE: &[Voice] = &[KORE, ZEPHYR];
const ALL_MALE: &[Voice] = &[PUCK, CHARON, FENRIR];
const ALL: &[Voice] = &[KORE, ZEPHYR, PUCK, CHARON, FENRIR];
const ANNOUNCER: &[Voice] = &[KORE, PUCK];
const INSPIRATIONAL: &[Voice] = &[ZEPHYR];
const HORROR: &[Voice] = &[CHARON_DEEP, FENRIR_DEEP];
const DRAMA: &[Voice] = &[CHARON_SERIOUS, FENRIR_SERIOUS];

const fn category(name: &'static str, voices: &'static [Voice]) -> VoiceCategory {
    VoiceCategory { name, voices }
}

pub const THEME_CATEGORIES: &[VoiceCategory] = &[
    category("Short stories", &[KORE, PUCK, ZEPHYR]),
    category("Fun facts", ANNOUNCER),
    category("Quotes", &[ZEPHYR, CHARON_SERIOUS, FENRIR_SERIOUS]),
    category("Poetry", INSPIRATIONAL),
    category("Education", ANNOUNCER),
    category("Meditation", INSPIRATIONAL),
    category("Products", ANNOUNCER),
    category("Letters", ANNOUNCER),
    category("Horror", HORROR),
    category("Ghost stories", HORROR),
    category("War", DRAMA),
    category("Dark truths", DRAMA),
    category("Fantasy", ALL),
    category("Science fiction", &[KORE, PUCK, CHARON_SERIOUS, FENRIR_SERIOUS]),
    category("Mystery", HORROR),
    category("Drama", ALL),
    category("Animal world", ANNOUNCER),
    category("Spiritual", &[ZEPHYR, CHARON_DEEP, FENRIR_DEEP]),
    category("Fairy tales", &[KORE, PUCK, ZEPHYR]),
    category("News", ANNOUNCER),
    category("All female voices", ALL_FEMALE),
    category("All male voices", ALL_MALE),
];

pub const LOCALE_CATEGORIES: &[VoiceCategory] = &[
    category("Vietnam", ALL),
    category("USA", &[KORE, ZEPHYR, PUCK]),
    category("UK", &[PUCK, FENRIR_SERIOUS]),
    category("France", &[ZEPHYR]),
    category("Russia", HORROR),
    category("Korea", &[KORE, PUCK]),
    category("Japan", &[ZEPHYR, PUCK]),
    category("China", &[KORE, CHARON_SERIOUS]),
    category("Portugal", &[KORE, PUCK]),
    category("Spain", &[ZEPHYR, CHARON]),
];

/// Theme categories followed by locale categories.
pub fn all_categories() -> impl Iterator<Item = &'static VoiceCategory> {
    THEME_CATEGORIES.iter().chain(LOCALE_CATEGORIES.iter())
}

/// Generic descriptor for a provider voice name.
pub fn find_voice(name: &str) -> Option<Voice> {
    ALL.iter().copied().find(|v| v.name == name)
}

pub fn voices_by_gender(gender: Gender) -> Vec<Voice> {
    ALL.iter().copied().filter(|v| v.gender == gender).collect()
}

/// Every provider voice name reachable from the categories, once each, in first-seen order.
pub fn unique_voice_names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = Vec::new();
    for voice in all_categories().flat_map(|c| c.voices.iter()) {
        if !names.contains(&voice.name) {
            names.push(voice.name);
        }
    }
    names
}

/// Category names a voice appears in, by provider name.
pub fn categories_of(name: &str) -> Vec<&'static str> {
    all_categories()
        .filter(|c| c.voices.iter().any(|v| v.name == name))
        .map(|c| c.name)
        .collect()
}
