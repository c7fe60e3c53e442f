//! 章节文本规整
//!
//! 与分段无关的可选预处理：去掉重复的章节标题行。
//!
//! 规则: 若首个非空行与其后的非空行（忽略大小写）相同，
//! 或首行是一个短的编号标题（"Chapter 3"、"Part II: ..."、"Prologue"、"第十二章"），
//! 则丢弃首行。

/// 标题关键字（小写比较）
const HEADING_KEYWORDS: &[&str] = &["chapter", "part", "prologue", "epilogue"];

/// 标题行的最大字符数
const MAX_HEADING_CHARS: usize = 60;

/// 英文序数词
const NUMBER_WORDS: &[&str] = &[
    "one", "two", "three", "four", "five", "six", "seven", "eight", "nine", "ten", "eleven",
    "twelve", "thirteen", "fourteen", "fifteen", "sixteen", "seventeen", "eighteen", "nineteen",
    "twenty", "first", "second", "third", "fourth", "fifth", "last", "final",
];

/// 规范写法的罗马数字（1..=399，小写）
fn is_roman_numeral(word: &str) -> bool {
    const TABLE: &[(u32, &str)] = &[
        (100, "c"),
        (90, "xc"),
        (50, "l"),
        (40, "xl"),
        (10, "x"),
        (9, "ix"),
        (5, "v"),
        (4, "iv"),
        (1, "i"),
    ];
    let value = |c: char| match c {
        'i' => Some(1),
        'v' => Some(5),
        'x' => Some(10),
        'l' => Some(50),
        'c' => Some(100),
        _ => None,
    };

    let Some(digits) = word.chars().map(value).collect::<Option<Vec<u32>>>() else {
        return false;
    };
    if digits.is_empty() {
        return false;
    }
    let mut total = 0;
    for (i, d) in digits.iter().enumerate() {
        match digits.get(i + 1) {
            Some(next) if next > d => total -= *d as i64,
            _ => total += *d as i64,
        }
    }
    if !(1..400).contains(&total) {
        return false;
    }

    // 重新编码后必须一致，排除 "ill"、"civil" 之类的普通单词
    let mut rest = total as u32;
    let mut canonical = String::new();
    for (n, symbol) in TABLE {
        while rest >= *n {
            canonical.push_str(symbol);
            rest -= n;
        }
    }
    canonical == word
}

/// 关键字之后的内容是否像编号: 空、数字、罗马数字、序数词，或紧跟 ':' / '-'
fn is_heading_tail(tail: &str) -> bool {
    let tail = tail.trim_start();
    if tail.is_empty() || tail.starts_with([':', '-', '.']) {
        return true;
    }
    let token: String = tail
        .chars()
        .take_while(|c| c.is_alphanumeric())
        .collect::<String>()
        .to_lowercase();
    (!token.is_empty() && token.chars().all(|c| c.is_ascii_digit()))
        || is_roman_numeral(&token)
        || NUMBER_WORDS.contains(&token.as_str())
}

/// 首行是否形如标题
fn looks_like_heading(line: &str) -> bool {
    if line.chars().count() > MAX_HEADING_CHARS {
        return false;
    }

    let lower = line.to_lowercase();
    let keyword_heading = HEADING_KEYWORDS.iter().any(|kw| {
        lower.strip_prefix(kw).is_some_and(|tail| {
            !tail.starts_with(|c: char| c.is_alphanumeric()) && is_heading_tail(tail)
        })
    });
    if keyword_heading {
        return true;
    }

    // 第001章 / 第十二章
    line.starts_with('第') && line.find('章').is_some()
}

/// 去掉重复的章节标题行
///
/// 文本为空或只有一行时原样返回
pub fn strip_duplicate_heading(text: &str) -> String {
    let mut lines = text.lines().enumerate().filter(|(_, l)| !l.trim().is_empty());

    let Some((first_idx, first)) = lines.next() else {
        return text.to_string();
    };
    let Some((_, second)) = lines.next() else {
        return text.to_string();
    };

    let first = first.trim();
    let duplicated = first.to_lowercase() == second.trim().to_lowercase();
    if !duplicated && !looks_like_heading(first) {
        return text.to_string();
    }

    tracing::debug!(heading = %first, duplicated, "Stripping leading heading line");

    text.lines()
        .enumerate()
        .filter(|(i, _)| *i != first_idx)
        .map(|(_, l)| l)
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_duplicate_line_is_dropped() {
        let text = "The Boy Who Lived\nTHE BOY WHO LIVED\nMr. and Mrs. Dursley...";
        let result = strip_duplicate_heading(text);
        assert_eq!(result, "THE BOY WHO LIVED\nMr. and Mrs. Dursley...");
    }

    #[test]
    fn test_keyword_heading_is_dropped() {
        let text = "\nChapter 3\n\nIt was a dark and stormy night.";
        let result = strip_duplicate_heading(text);
        assert!(!result.contains("Chapter 3"));
        assert!(result.contains("dark and stormy"));
    }

    #[test]
    fn test_cjk_heading_is_dropped() {
        let text = "第001章 陨落的天才\n斗之力，三段！";
        assert_eq!(strip_duplicate_heading(text), "斗之力，三段！");
    }

    #[test]
    fn test_body_text_is_untouched() {
        let text = "It was a bright cold day.\nThe clocks were striking thirteen.";
        assert_eq!(strip_duplicate_heading(text), text);
    }

    #[test]
    fn test_keyword_must_be_a_whole_word() {
        // "partial" 不是 "part"
        let text = "A partial eclipse.\nThen darkness.";
        assert_eq!(strip_duplicate_heading(text), text);
    }

    #[test]
    fn test_keyword_inside_a_sentence_is_kept() {
        for text in [
            "Part of me wanted to stay.\nBut the train was leaving.",
            "Chapter and verse, he knew them all.\nNobody else did.",
            "She read the last chapter twice.\nThen she slept.",
            "Part civil servant, part spy.\nHe never said which.",
        ] {
            assert_eq!(strip_duplicate_heading(text), text);
        }
    }

    #[test]
    fn test_numbered_headings_are_dropped() {
        for heading in ["Part II", "Chapter Twelve", "Epilogue: Ten Years Later", "PROLOGUE"] {
            let text = format!("{}\nThe story goes on.", heading);
            assert_eq!(strip_duplicate_heading(&text), "The story goes on.");
        }
    }

    #[test]
    fn test_roman_numerals() {
        for word in ["i", "iv", "ix", "xiv", "xl", "xcix", "cccxc"] {
            assert!(is_roman_numeral(word), "{word}");
        }
        for word in ["", "ill", "civil", "iiii", "vx", "did"] {
            assert!(!is_roman_numeral(word), "{word}");
        }
    }

    #[test]
    fn test_single_line_is_untouched() {
        assert_eq!(strip_duplicate_heading("Chapter 1"), "Chapter 1");
        assert_eq!(strip_duplicate_heading(""), "");
    }
}
