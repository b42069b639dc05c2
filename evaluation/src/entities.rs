//! Named-entity extraction capability.
//!
//! Fact scoring only needs PERSON and DATE spans. [`EntityExtractor`] is the
//! seam for a real NER model; [`PatternEntityExtractor`] is a regex-based
//! fallback good enough for English prose about people and years.

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::ScoringResult;

/// Entity type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityLabel {
    Person,
    Date,
    Organization,
    Location,
    Other,
}

impl std::fmt::Display for EntityLabel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Person => write!(f, "PERSON"),
            Self::Date => write!(f, "DATE"),
            Self::Organization => write!(f, "ORG"),
            Self::Location => write!(f, "LOC"),
            Self::Other => write!(f, "OTHER"),
        }
    }
}

/// A typed span of text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub text: String,
    pub label: EntityLabel,
}

impl Entity {
    pub fn new(text: impl Into<String>, label: EntityLabel) -> Self {
        Self {
            text: text.into(),
            label,
        }
    }
}

/// Extract typed entities from text, in order of appearance.
#[cfg_attr(test, mockall::automock)]
pub trait EntityExtractor: Send + Sync {
    fn extract_entities(&self, text: &str) -> Vec<Entity>;
}

/// Texts of all entities with the given label.
pub fn texts_with_label(entities: &[Entity], label: EntityLabel) -> Vec<&str> {
    entities
        .iter()
        .filter(|e| e.label == label)
        .map(|e| e.text.as_str())
        .collect()
}

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

const HONORIFICS: &[&str] = &[
    "Sir", "Dr", "Dr.", "Mr", "Mr.", "Mrs", "Mrs.", "Ms", "Ms.", "Lord", "Lady", "Professor",
    "Prof", "Prof.", "Dame", "Saint", "St.",
];

const EDGE_STOP_WORDS: &[&str] = &[
    "The", "A", "An", "In", "On", "At", "By", "For", "And", "But", "Of", "To", "It", "This",
    "That", "These", "Those", "However", "Other", "Both", "He", "She", "They", "We", "I", "His",
    "Her", "Their", "While", "When", "After", "Before", "Although", "Today", "Early", "Late",
];

/// A run containing any of these names a place, institution or thing.
const NON_PERSON_WORDS: &[&str] = &[
    "Park", "Jersey", "York", "City", "County", "State", "States", "Street", "Avenue", "Road",
    "Square", "Island", "River", "Lake", "Mountain", "Valley", "Kingdom", "Republic", "Britain",
    "America", "Europe", "Company", "Corporation", "Inc", "Ltd", "Laboratory", "Laboratories",
    "Lab", "Labs", "University", "College", "Institute", "Museum", "Library", "Society",
    "Academy", "Office", "Patent", "Electric", "Bulb", "Lamp", "Light", "War", "Revolution",
];

/// Articles that open a run of capitalised common nouns ("The Light Bulb").
const LEADING_ARTICLES: &[&str] = &["The", "A", "An"];

/// Measurement words that turn a four-digit number into a quantity.
const UNIT_WORDS: &[&str] = &[
    "hour", "hours", "hrs", "minute", "minutes", "second", "seconds", "watt", "watts", "w",
    "kilowatt", "kilowatts", "volt", "volts", "v", "amp", "amps", "ohm", "ohms", "degree",
    "degrees", "kelvin", "lumen", "lumens", "meter", "meters", "metre", "metres", "km", "mile",
    "miles", "feet", "foot", "kg", "pound", "pounds", "times", "people", "units", "percent",
];

const CALENDAR_WORDS: &[&str] = &[
    "January",
    "February",
    "March",
    "April",
    "May",
    "June",
    "July",
    "August",
    "September",
    "October",
    "November",
    "December",
    "Monday",
    "Tuesday",
    "Wednesday",
    "Thursday",
    "Friday",
    "Saturday",
    "Sunday",
];

/// Regex-driven PERSON/DATE extractor.
///
/// PERSON: runs of two to four capitalised words on one line, with
/// honorifics, possessives and sentence-edge function words trimmed.
/// Runs opening with an article or containing calendar, place or
/// institution words are rejected. DATE: full dates, month-year pairs,
/// ordinal centuries and years 1000–2099 (optionally as decades) unless
/// a unit follows ("1200 hours").
#[derive(Debug, Clone)]
pub struct PatternEntityExtractor {
    capitalised_run: Regex,
    date: Regex,
}

impl PatternEntityExtractor {
    pub fn new() -> ScoringResult<Self> {
        let capitalised_run = Regex::new(
            r"\b(?:(?:Dr|Mr|Mrs|Ms|Prof|St)\.[ \t]+)?[A-Z](?:[a-zA-Z'’\-]+|\.)?(?:[ \t]+[A-Z](?:[a-zA-Z'’\-]+|\.)?)+",
        )?;
        let date = Regex::new(&format!(
            r"(?i)\b(?:(?:{MONTHS})\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}|(?:{MONTHS})\s+\d{{4}}|(?:(?:early|mid|late)[\s-]+)?\d{{1,2}}(?:st|nd|rd|th)\s+century|(?:1\d{{3}}|20\d{{2}})s?)\b"
        ))?;
        Ok(Self {
            capitalised_run,
            date,
        })
    }

    fn people(&self, text: &str) -> Vec<(usize, Entity)> {
        self.capitalised_run
            .find_iter(text)
            .filter_map(|m| normalise_person(m.as_str()).map(|name| (m.start(), name)))
            .map(|(start, name)| (start, Entity::new(name, EntityLabel::Person)))
            .collect()
    }

    fn dates(&self, text: &str) -> Vec<(usize, Entity)> {
        self.date
            .find_iter(text)
            .filter(|m| !is_quantity(m.as_str(), &text[m.end()..]))
            .map(|m| (m.start(), Entity::new(m.as_str(), EntityLabel::Date)))
            .collect()
    }
}

impl EntityExtractor for PatternEntityExtractor {
    fn extract_entities(&self, text: &str) -> Vec<Entity> {
        let mut found = self.people(text);
        found.extend(self.dates(text));
        found.sort_by_key(|(start, _)| *start);
        found.into_iter().map(|(_, entity)| entity).collect()
    }
}

/// A bare number followed by a unit word is a measurement, not a year.
fn is_quantity(matched: &str, rest: &str) -> bool {
    if !matched.trim_end_matches('s').bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }
    let next: String = rest
        .trim_start_matches([' ', '\t', '-'])
        .chars()
        .take_while(|c| c.is_ascii_alphabetic())
        .collect();
    UNIT_WORDS.contains(&next.to_ascii_lowercase().as_str())
}

fn normalise_person(run: &str) -> Option<String> {
    if run
        .split_whitespace()
        .next()
        .is_some_and(|first| LEADING_ARTICLES.contains(&first))
    {
        return None;
    }

    let mut words: Vec<&str> = run
        .split_whitespace()
        .map(|w| {
            w.trim_end_matches("'s")
                .trim_end_matches("’s")
                .trim_end_matches('.')
        })
        .collect();

    if words
        .iter()
        .any(|w| CALENDAR_WORDS.contains(w) || NON_PERSON_WORDS.contains(w))
    {
        return None;
    }

    while let Some(first) = words.first() {
        if EDGE_STOP_WORDS.contains(first) || HONORIFICS.contains(first) {
            words.remove(0);
        } else {
            break;
        }
    }
    while let Some(last) = words.last() {
        if EDGE_STOP_WORDS.contains(last) {
            words.pop();
        } else {
            break;
        }
    }

    // Initials alone ("J. R.") are not a name.
    if words.iter().all(|w| w.len() <= 1) || !(2..=4).contains(&words.len()) {
        return None;
    }
    Some(words.join(" "))
}
