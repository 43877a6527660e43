// Copyright Nicholas Harring. All rights reserved.
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the Server Side Public License, version 1, as published by MongoDB, Inc.
// This program is distributed in the hope that it will be useful, but WITHOUT ANY WARRANTY;
// without even the implied warranty of MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.
// See the Server Side Public License for more details. You should have received a copy of the
// Server Side Public License along with this program.
// If not, see <http://www.mongodb.com/licensing/server-side-public-license>.

//! Pure `field -> block keys` transforms. Each returns the
//! finite set of strings the record would block under; an empty set means
//! the record does not block for this predicate.

use std::collections::BTreeSet;

use itertools::Itertools;
use lazy_static::lazy_static;
use regex::Regex;

use super::BlockKeys;

lazy_static! {
    static ref WORDS: Regex = Regex::new(r"[\w']+").expect("valid regex");
    static ref INTEGERS: Regex = Regex::new(r"\d+").expect("valid regex");
    static ref START_WORD: Regex = Regex::new(r"^([\w']+)").expect("valid regex");
    static ref START_INTEGER: Regex = Regex::new(r"^(\d+)").expect("valid regex");
    static ref ALPHA_NUMERIC_RUN: Regex = Regex::new(r"[A-Za-z0-9]+").expect("valid regex");
    static ref PUNCTUATION: Regex = Regex::new(r"[[:punct:]]").expect("valid regex");
}

/// Strip punctuation; used by the string-normalized predicate variant.
#[must_use]
pub fn strip_punc(s: &str) -> String {
    PUNCTUATION.replace_all(s, "").into_owned()
}

/// `(?s)` whitespace-collapse used by the String predicate variant: strip
/// punctuation, then join on single spaces.
#[must_use]
pub fn normalize_whitespace(s: &str) -> String {
    strip_punc(s).split_whitespace().join(" ")
}

#[must_use]
pub fn whole_field(field: &str) -> BlockKeys {
    BlockKeys::from([field.to_string()])
}

#[must_use]
pub fn token(field: &str) -> BlockKeys {
    WORDS.find_iter(field).map(|m| m.as_str().to_string()).collect()
}

#[must_use]
pub fn first_token(field: &str) -> BlockKeys {
    START_WORD
        .captures(field)
        .map(|c| BlockKeys::from([c[1].to_string()]))
        .unwrap_or_default()
}

#[must_use]
pub fn common_integer(field: &str) -> BlockKeys {
    INTEGERS
        .find_iter(field)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .map(|i| i.to_string())
        .collect()
}

#[must_use]
pub fn alpha_numeric(field: &str) -> BlockKeys {
    ALPHA_NUMERIC_RUN
        .find_iter(field)
        .map(|m| m.as_str())
        .filter(|w| w.chars().any(|c| c.is_ascii_digit()))
        .map(str::to_string)
        .collect()
}

#[must_use]
pub fn near_integer(field: &str) -> BlockKeys {
    let mut out = BlockKeys::new();
    for m in INTEGERS.find_iter(field) {
        if let Ok(n) = m.as_str().parse::<i64>() {
            out.insert((n - 1).to_string());
            out.insert(n.to_string());
            out.insert((n + 1).to_string());
        }
    }
    out
}

#[must_use]
pub fn hundred_integer(field: &str) -> BlockKeys {
    INTEGERS
        .find_iter(field)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .map(|n| hundred_bucket(n))
        .collect()
}

fn hundred_bucket(n: i64) -> String {
    let s = n.to_string();
    if s.len() > 2 {
        format!("{}00", &s[..s.len() - 2])
    } else {
        "00".to_string()
    }
}

/// Reproduces `hundredIntegersOddPredicate` verbatim, odd last digit and
/// all.
#[must_use]
pub fn hundred_integer_odd(field: &str) -> BlockKeys {
    INTEGERS
        .find_iter(field)
        .filter_map(|m| m.as_str().parse::<i64>().ok())
        .map(|n| {
            let s = n.to_string();
            let prefix = if s.len() > 2 { &s[..s.len() - 2] } else { "" };
            format!("{}0{}", prefix, (n.rem_euclid(2)))
        })
        .collect()
}

#[must_use]
pub fn first_integer(field: &str) -> BlockKeys {
    START_INTEGER
        .captures(field)
        .map(|c| BlockKeys::from([c[1].to_string()]))
        .unwrap_or_default()
}

/// Sliding window of width `n` over whitespace-split tokens. Despite its
/// name in the original (`ngramsTokens`), the inner double loop collapses
/// algebraically to a fixed-width window — see derivation in DESIGN.md.
fn token_windows(tokens: &[String], n: usize) -> BlockKeys {
    if tokens.len() < n {
        return BlockKeys::new();
    }
    (0..=tokens.len() - n).map(|i| tokens[i..i + n].join(" ")).collect()
}

fn token_windows_str(tokens: &[&str], n: usize) -> BlockKeys {
    let owned: Vec<String> = tokens.iter().map(|s| (*s).to_string()).collect();
    token_windows(&owned, n)
}

#[must_use]
pub fn two_tokens(field: &str) -> BlockKeys {
    let tokens: Vec<&str> = field.split_whitespace().collect();
    token_windows_str(&tokens, 2)
}

#[must_use]
pub fn three_tokens(field: &str) -> BlockKeys {
    let tokens: Vec<&str> = field.split_whitespace().collect();
    token_windows_str(&tokens, 3)
}

#[must_use]
pub fn fingerprint(field: &str) -> BlockKeys {
    let mut tokens: Vec<&str> = field.split_whitespace().collect();
    tokens.sort_unstable();
    BlockKeys::from([tokens.concat()])
}

fn char_ngrams(s: &str, n: usize) -> BTreeSet<String> {
    let chars: Vec<char> = s.chars().collect();
    if chars.len() < n {
        return BTreeSet::new();
    }
    (0..=chars.len() - n)
        .map(|i| chars[i..i + n].iter().collect::<String>())
        .collect()
}

#[must_use]
pub fn one_gram_fingerprint(field: &str) -> BlockKeys {
    let stripped: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    let grams = char_ngrams(&stripped, 1);
    BlockKeys::from([grams.into_iter().collect::<Vec<_>>().concat()])
}

#[must_use]
pub fn two_gram_fingerprint(field: &str) -> BlockKeys {
    if field.chars().count() <= 1 {
        return BlockKeys::new();
    }
    let stripped: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    let grams = char_ngrams(&stripped, 2);
    BlockKeys::from([grams
        .into_iter()
        .map(|g| g.trim().to_string())
        .sorted()
        .collect::<Vec<_>>()
        .concat()])
}

#[must_use]
pub fn common_four_gram(field: &str) -> BlockKeys {
    let stripped: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    char_ngrams(&stripped, 4)
}

#[must_use]
pub fn common_six_gram(field: &str) -> BlockKeys {
    let stripped: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    char_ngrams(&stripped, 6)
}

fn same_char_start(field: &str, n: usize) -> BlockKeys {
    let stripped: String = field.chars().filter(|c| !c.is_whitespace()).collect();
    if stripped.chars().count() < n {
        return BlockKeys::new();
    }
    BlockKeys::from([stripped.chars().take(n).collect::<String>()])
}

#[must_use]
pub fn same_three_char_start(field: &str) -> BlockKeys {
    same_char_start(field, 3)
}

#[must_use]
pub fn same_five_char_start(field: &str) -> BlockKeys {
    same_char_start(field, 5)
}

#[must_use]
pub fn same_seven_char_start(field: &str) -> BlockKeys {
    same_char_start(field, 7)
}

/// All suffixes of the space-stripped string, skipping the last 4.
#[must_use]
pub fn suffix_array(field: &str) -> BlockKeys {
    let stripped: Vec<char> = field.chars().filter(|c| !c.is_whitespace()).collect();
    let len = stripped.len();
    if len <= 4 {
        return BlockKeys::new();
    }
    let n = len - 4;
    (0..n).map(|i| stripped[i..].iter().collect::<String>()).collect()
}

#[must_use]
pub fn sorted_acronym(field: &str) -> BlockKeys {
    let mut initials: Vec<char> = field
        .split_whitespace()
        .filter_map(|tok| tok.chars().next())
        .collect();
    initials.sort_unstable();
    BlockKeys::from([initials.into_iter().collect::<String>()])
}

/// Simplified phonetic reduction, standing in for the original's
/// `doublemetaphone` dependency.
fn phonetic_code(word: &str) -> String {
    let upper: String = word.to_uppercase().chars().filter(|c| c.is_ascii_alphabetic()).collect();
    if upper.is_empty() {
        return String::new();
    }
    let mut out = String::new();
    let mut prev: Option<char> = None;
    for (i, c) in upper.chars().enumerate() {
        let mapped = match c {
            'A' | 'E' | 'I' | 'O' | 'U' | 'Y' => {
                if i == 0 {
                    Some(c)
                } else {
                    None
                }
            }
            'B' | 'P' => Some('B'),
            'C' | 'K' | 'Q' => Some('K'),
            'D' | 'T' => Some('T'),
            'F' | 'V' => Some('F'),
            'G' | 'J' => Some('J'),
            'L' => Some('L'),
            'M' | 'N' => Some('N'),
            'R' => Some('R'),
            'S' | 'Z' | 'X' => Some('S'),
            other => Some(other),
        };
        if let Some(m) = mapped {
            if prev != Some(m) {
                out.push(m);
            }
            prev = Some(m);
        }
    }
    out
}

#[must_use]
pub fn double_metaphone(field: &str) -> BlockKeys {
    let code = phonetic_code(field);
    if code.is_empty() {
        BlockKeys::new()
    } else {
        BlockKeys::from([code])
    }
}

#[must_use]
pub fn metaphone_token(field: &str) -> BlockKeys {
    field
        .split_whitespace()
        .map(phonetic_code)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Adapted from `commonTwoElementsPredicate`: a small, cheap addition in
/// the same family as the n-gram predicates — see DESIGN.md.
fn sorted_chars(field: &str) -> Vec<String> {
    let mut chars: Vec<char> = field.chars().collect();
    chars.sort_unstable();
    chars.into_iter().map(String::from).collect()
}

#[must_use]
pub fn sorted_char_two_gram(field: &str) -> BlockKeys {
    token_windows(&sorted_chars(field), 2)
}

/// See [`sorted_char_two_gram`].
#[must_use]
pub fn sorted_char_three_gram(field: &str) -> BlockKeys {
    token_windows(&sorted_chars(field), 3)
}

#[must_use]
pub fn lat_long_grid(lat: f64, lon: f64, digits: i32) -> BlockKeys {
    if lat == 0.0 && lon == 0.0 {
        return BlockKeys::new();
    }
    let factor = 10f64.powi(digits);
    let r = |v: f64| (v * factor).round() / factor;
    BlockKeys::from([format!("[{}, {}]", r(lat), r(lon))])
}

#[must_use]
pub fn order_of_magnitude(field: f64) -> BlockKeys {
    if field > 0.0 {
        BlockKeys::from([field.log10().round().to_string()])
    } else {
        BlockKeys::new()
    }
}

#[must_use]
pub fn round_to_1(field: f64) -> BlockKeys {
    if field == 0.0 {
        return BlockKeys::from(["0".to_string()]);
    }
    let abs = field.abs();
    let order = abs.log10().floor();
    let factor = 10f64.powf(order);
    let rounded = (abs / factor).round() * factor;
    let signed = rounded.round().copysign(field);
    BlockKeys::from([(signed as i64).to_string()])
}

#[cfg(test)]
mod should {
    use super::*;

    #[test]
    fn test_whole_field() {
        assert_eq!(whole_field("John Woodward"), BlockKeys::from(["John Woodward".to_string()]));
    }

    #[test]
    fn test_token() {
        assert_eq!(
            token("John Woodward"),
            BlockKeys::from(["John".to_string(), "Woodward".to_string()])
        );
    }

    #[test]
    fn test_first_token() {
        assert_eq!(first_token("John Woodward"), BlockKeys::from(["John".to_string()]));
        assert_eq!(first_token(""), BlockKeys::new());
    }

    #[test]
    fn test_common_integer() {
        assert_eq!(
            common_integer("Joh5n 12 45 "),
            BlockKeys::from(["12".to_string(), "45".to_string(), "5".to_string()])
        );
    }

    #[test]
    fn test_near_integers() {
        let out = near_integer("Joh5n 12 45 ");
        for v in ["11", "12", "13", "4", "44", "45", "46", "5", "6"] {
            assert!(out.contains(v), "missing {v} in {out:?}");
        }
    }

    #[test]
    fn test_hundred_integer() {
        let out = hundred_integer("3540 56 J10000");
        assert!(out.contains("00"));
        assert!(out.contains("10000"));
        assert!(out.contains("3500"));
    }

    #[test]
    fn test_hundred_integer_odd_formula() {
        // 3540 -> prefix "35", last digit of 3540 % 2 == 0 -> "3500" style "350" + "0"
        let out = hundred_integer_odd("3541");
        assert!(out.iter().any(|s| s.ends_with('1')));
    }

    #[test]
    fn test_common_two_tokens() {
        let out = two_tokens("John Woodward 123 la la llll");
        for v in ["John Woodward", "Woodward 123", "123 la", "la la", "la llll"] {
            assert!(out.contains(v), "missing {v} in {out:?}");
        }
    }

    #[test]
    fn test_fingerprint() {
        let out = fingerprint("banana apple");
        assert_eq!(out, BlockKeys::from(["applebanana".to_string()]));
    }

    #[test]
    fn test_suffix_array_skips_last_four() {
        let out = suffix_array("JohnWoodward");
        assert_eq!(out.len(), 8);
        assert!(out.contains("JohnWoodward"));
        assert!(out.contains("dward"));
        assert!(!out.iter().any(|s| s == "ward" || s == "ard" || s == "rd" || s == "d"));
    }

    #[test]
    fn test_sorted_acronym() {
        assert_eq!(sorted_acronym("Xavier woodward 4K"), BlockKeys::from(["4Xw".to_string()]));
    }

    #[test]
    fn test_lat_long_grid() {
        let out = lat_long_grid(42.37, -5.44, 1);
        assert_eq!(out, BlockKeys::from(["[42.4, -5.4]".to_string()]));
    }

    #[test]
    fn test_order_of_magnitude() {
        assert_eq!(order_of_magnitude(950.0), BlockKeys::from(["3".to_string()]));
        assert_eq!(order_of_magnitude(0.0), BlockKeys::new());
    }

    #[test]
    fn test_round_to_1() {
        assert_eq!(round_to_1(1234.0), BlockKeys::from(["1000".to_string()]));
        assert_eq!(round_to_1(-1234.0), BlockKeys::from(["-1000".to_string()]));
    }
}
