use crate::models::Record;

pub const LOW_PCT: f64 = 70.0;
pub const WIN_PCT: f64 = 95.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Flag {
    Missing,
    Low,
    Win,
}

impl Flag {
    pub const ALL: [Flag; 3] = [Flag::Missing, Flag::Low, Flag::Win];

    pub fn label(self) -> &'static str {
        match self {
            Flag::Missing => "Missing",
            Flag::Low => "Low",
            Flag::Win => "Win",
        }
    }
}

/// Reads a portal number cell such as `"85%"` or `" 9 / "`.
pub fn to_num(value: &str) -> Option<f64> {
    let cleaned: String = value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() {
        return None;
    }
    cleaned.parse().ok()
}

pub fn derive_flags(score: &str, pct: &str, comments: &str) -> Vec<Flag> {
    let score = to_num(score);
    let pct = to_num(pct);

    let mut flags = Vec::new();
    let missing = comments.to_lowercase().contains("missing")
        || score == Some(0.0)
        || pct == Some(0.0);
    if missing {
        flags.push(Flag::Missing);
    }
    if pct.is_some_and(|p| p < LOW_PCT) {
        flags.push(Flag::Low);
    }
    if pct.is_some_and(|p| p >= WIN_PCT) {
        flags.push(Flag::Win);
    }
    flags
}

pub fn format_flags(flags: &[Flag]) -> String {
    flags.iter().map(|f| f.label()).collect::<Vec<_>>().join(",")
}

/// Parses a stored Status cell back into flags; unknown labels are ignored.
pub fn parse_flags(status: &str) -> Vec<Flag> {
    status
        .split(',')
        .filter_map(|label| {
            let label = label.trim();
            Flag::ALL
                .into_iter()
                .find(|f| f.label().eq_ignore_ascii_case(label))
        })
        .collect()
}

/// Fills an empty Status from the score columns. Extractor-provided values win.
pub fn fill_status(record: &mut Record) {
    if record.status.trim().is_empty() {
        record.status = format_flags(&derive_flags(
            &record.score,
            &record.pct,
            &record.comments,
        ));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_num_strips_decorations() {
        assert_eq!(to_num("85%"), Some(85.0));
        assert_eq!(to_num(" 9.5 "), Some(9.5));
        assert_eq!(to_num("-2"), Some(-2.0));
        assert_eq!(to_num(""), None);
        assert_eq!(to_num("n/a"), None);
        assert_eq!(to_num("1.2.3"), None);
    }

    #[test]
    fn flags_follow_thresholds() {
        assert_eq!(derive_flags("10", "100", ""), vec![Flag::Win]);
        assert_eq!(derive_flags("9.5", "95", ""), vec![Flag::Win]);
        assert_eq!(derive_flags("6", "60", ""), vec![Flag::Low]);
        assert_eq!(derive_flags("7", "70", ""), Vec::<Flag>::new());
        assert_eq!(derive_flags("", "", ""), Vec::<Flag>::new());
    }

    #[test]
    fn zero_or_missing_comment_marks_missing() {
        assert_eq!(derive_flags("0", "0", ""), vec![Flag::Missing, Flag::Low]);
        assert_eq!(
            derive_flags("", "", "Assignment MISSING"),
            vec![Flag::Missing]
        );
    }

    #[test]
    fn fill_status_keeps_existing_value() {
        let mut record = Record {
            pct: "50".to_string(),
            status: "Excused".to_string(),
            ..Record::default()
        };
        fill_status(&mut record);
        assert_eq!(record.status, "Excused");

        record.status.clear();
        fill_status(&mut record);
        assert_eq!(record.status, "Low");
    }

    #[test]
    fn status_labels_round_trip_through_the_cell() {
        assert_eq!(
            parse_flags("Missing, low,Bogus"),
            vec![Flag::Missing, Flag::Low]
        );
        assert_eq!(format_flags(&[Flag::Missing, Flag::Low]), "Missing,Low");
    }
}
