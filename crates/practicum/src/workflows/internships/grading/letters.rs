/// Fixed letter scale shared by every rubric item without an options schema.
pub const LETTER_SCORES: [(char, f64); 6] = [
    ('A', 7.0),
    ('B', 6.0),
    ('C', 5.0),
    ('D', 4.0),
    ('E', 2.0),
    ('F', 0.0),
];

/// Score of a single-letter answer, case-insensitive. `None` for anything else.
pub fn letter_score(value: &str) -> Option<f64> {
    let mut chars = value.trim().chars();
    let letter = chars.next()?.to_ascii_uppercase();
    if chars.next().is_some() {
        return None;
    }

    LETTER_SCORES
        .iter()
        .find(|(candidate, _)| *candidate == letter)
        .map(|(_, score)| *score)
}

/// Highest letter whose scale value does not exceed `score`.
pub fn letter_for(score: f64) -> char {
    LETTER_SCORES
        .iter()
        .find(|(_, threshold)| score >= *threshold)
        .map(|(letter, _)| *letter)
        .unwrap_or('F')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_every_letter_in_either_case() {
        let expected = [7.0, 6.0, 5.0, 4.0, 2.0, 0.0];
        for (letter, score) in ["A", "B", "C", "D", "E", "F"].iter().zip(expected) {
            assert_eq!(letter_score(letter), Some(score));
            assert_eq!(letter_score(&letter.to_lowercase()), Some(score));
        }
    }

    #[test]
    fn rejects_words_and_unknown_letters() {
        assert_eq!(letter_score("G"), None);
        assert_eq!(letter_score("AB"), None);
        assert_eq!(letter_score(""), None);
        assert_eq!(letter_score(" b "), Some(6.0));
    }

    #[test]
    fn reverse_mapping_uses_scale_thresholds() {
        assert_eq!(letter_for(7.0), 'A');
        assert_eq!(letter_for(6.5), 'B');
        assert_eq!(letter_for(4.2), 'D');
        assert_eq!(letter_for(3.9), 'E');
        assert_eq!(letter_for(1.0), 'F');
        assert_eq!(letter_for(-3.0), 'F');
    }
}
