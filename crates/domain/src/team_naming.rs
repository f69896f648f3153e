use rand::seq::IndexedRandom;
use rand::Rng;

use crate::entities::TagSet;

const PREFIXES: [&str; 9] = [
    "Hyper",
    "Elite",
    "Shadow",
    "Quantum",
    "NoName",
    "Hype",
    "Chaos",
    "Stealth",
    "Underground",
];

const WILDCARD_WORDS: &[&str] = &["Wildcard Crew", "Chaos Team", "No Rules Gang"];

fn category_words(tag: &str) -> Option<&'static [&'static str]> {
    let words: &'static [&'static str] = match tag {
        "development" => &["Coders", "Hackers", "Engineers", "Byte Warriors", "Script Lords"],
        "automation" => &["Automators", "BotMasters", "Process Hackers"],
        "design" => &["Pixel Pushers", "UI Ninjas", "Creative Minds"],
        "UX/UI" => &["Experience Wizards", "Interface Gurus", "UX Architects"],
        "writing" => &["Wordsmiths", "Content Ninjas", "Text Hackers"],
        "marketing" => &["Brand Boosters", "Hype Lords", "Engagement Warriors"],
        _ => return None,
    };
    Some(words)
}

/// 根据订单标签生成团队展示名：`{前缀}_{类别词}_{3位十六进制}`
///
/// 名称仅用于展示，不保证唯一。
pub fn generate_team_name<R: Rng + ?Sized>(tags: &TagSet, rng: &mut R) -> String {
    let categories: Vec<&[&str]> = tags.iter().filter_map(|tag| category_words(tag)).collect();

    let prefix = PREFIXES.choose(rng).copied().unwrap_or("NoName");
    let words = categories.choose(rng).copied().unwrap_or(WILDCARD_WORDS);
    let word = words.choose(rng).copied().unwrap_or("Wildcard Crew");
    let suffix: u16 = rng.random_range(0..0x1000);

    format!("{prefix}_{word}_{suffix:03X}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn tags(items: &[&str]) -> TagSet {
        items.iter().map(|s| s.to_string()).collect()
    }

    fn split(name: &str) -> (String, String, String) {
        let parts: Vec<&str> = name.split('_').collect();
        assert_eq!(parts.len(), 3, "unexpected team name: {name}");
        (parts[0].to_string(), parts[1].to_string(), parts[2].to_string())
    }

    #[test]
    fn test_name_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..50 {
            let name = generate_team_name(&tags(&["design"]), &mut rng);
            let (prefix, word, suffix) = split(&name);
            assert!(PREFIXES.contains(&prefix.as_str()));
            assert!(["Pixel Pushers", "UI Ninjas", "Creative Minds"].contains(&word.as_str()));
            assert_eq!(suffix.len(), 3);
            assert!(suffix
                .chars()
                .all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        }
    }

    #[test]
    fn test_unknown_tags_fall_back_to_wildcard() {
        let mut rng = StdRng::seed_from_u64(7);
        let name = generate_team_name(&tags(&["pottery", "gardening"]), &mut rng);
        let (_, word, _) = split(&name);
        assert!(WILDCARD_WORDS.contains(&word.as_str()));

        let name = generate_team_name(&TagSet::new(), &mut rng);
        let (_, word, _) = split(&name);
        assert!(WILDCARD_WORDS.contains(&word.as_str()));
    }

    #[test]
    fn test_words_come_from_order_categories() {
        let mut rng = StdRng::seed_from_u64(1);
        let allowed = [
            "Wordsmiths",
            "Content Ninjas",
            "Text Hackers",
            "Automators",
            "BotMasters",
            "Process Hackers",
        ];
        for _ in 0..50 {
            let name = generate_team_name(&tags(&["writing", "automation", "pottery"]), &mut rng);
            let (_, word, _) = split(&name);
            assert!(allowed.contains(&word.as_str()), "{word}");
        }
    }
}
