//! Natural-looking replacement tokens for binary patching.
//!
//! Metadata-window replacements must be byte-length-identical to the text
//! they replace, and should read like plausible package names rather than
//! random noise (a table full of `xq9z.` draws more attention than
//! `libcore.`). Tokens are assembled from small banks of common package-name
//! fragments, padded or truncated to the exact target length, and
//! de-duplicated per run.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::HashSet;

const PKG_PREFIXES: &[&str] = &[
    "app", "lib", "pkg", "sys", "web", "api", "net", "db", "svc", "core", "util", "data",
    "log", "auth", "cache",
];

const PKG_SUFFIXES: &[&str] = &[
    "core", "util", "base", "main", "impl", "svc", "mgr", "handler", "service", "client",
    "server", "config",
];

const PKG_MIDDLES: &[&str] = &["", "http", "grpc", "rest", "rpc", "sql", "store"];

const SHORT_NAMES: &[&str] = &[
    "a", "b", "c", "x", "y", "z", "ab", "io", "os", "db", "fs", "ws", "app", "api", "sys",
    "lib", "net", "log",
];

const VOWELS: &[u8] = b"aeiou";
const CONSONANTS: &[u8] = b"bcdfghjklmnpqrstvwxyz";
const LETTERS: &[u8] = b"abcdefghijklmnopqrstuvwxyz";

const MAX_ATTEMPTS: usize = 1000;

/// Generator of unique, natural-looking, exact-length package tokens
#[derive(Debug)]
pub struct NaturalNameGenerator {
    rng: StdRng,
    used: HashSet<String>,
}

impl NaturalNameGenerator {
    /// Creates a generator from a seed
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            used: HashSet::new(),
        }
    }

    /// Creates a generator with a random seed
    pub fn from_entropy() -> Self {
        Self::new(rand::random())
    }

    /// Generate a replacement of exactly `target_len` bytes for a package
    /// token. A trailing dot on the original is preserved in the output.
    pub fn package_name(&mut self, original: &str, target_len: usize) -> String {
        let has_dot = original.ends_with('.');
        let body_len = if has_dot {
            target_len.saturating_sub(1)
        } else {
            target_len
        };

        for _ in 0..MAX_ATTEMPTS {
            let mut name = self.assemble(body_len);
            if has_dot {
                name.push('.');
            }
            debug_assert_eq!(name.len(), target_len);
            if self.used.insert(name.clone()) {
                return name;
            }
        }
        // The banks are exhausted at this length; fall back to a readable
        // consonant-vowel token
        let name = self.readable(original, target_len, has_dot);
        self.used.insert(name.clone());
        name
    }

    fn assemble(&mut self, len: usize) -> String {
        if len == 0 {
            return String::new();
        }
        if len <= 3 {
            return self.short(len);
        }
        if len <= 8 {
            return self.medium(len);
        }
        self.long(len)
    }

    fn short(&mut self, len: usize) -> String {
        let candidates: Vec<&str> = SHORT_NAMES.iter().copied().filter(|n| n.len() == len).collect();
        if candidates.is_empty() {
            return self.letters(len);
        }
        candidates[self.rng.random_range(0..candidates.len())].to_string()
    }

    fn medium(&mut self, len: usize) -> String {
        for bank in [PKG_PREFIXES, PKG_SUFFIXES] {
            let exact: Vec<&str> = bank.iter().copied().filter(|n| n.len() == len).collect();
            if !exact.is_empty() {
                return exact[self.rng.random_range(0..exact.len())].to_string();
            }
        }
        let word = PKG_PREFIXES[self.rng.random_range(0..PKG_PREFIXES.len())];
        if word.len() >= len {
            return word[..len].to_string();
        }
        let middle = PKG_MIDDLES[self.rng.random_range(0..PKG_MIDDLES.len())];
        let combined = format!("{word}{middle}");
        if combined.len() >= len {
            return combined[..len].to_string();
        }
        self.pad(combined, len)
    }

    fn long(&mut self, len: usize) -> String {
        let prefix = PKG_PREFIXES[self.rng.random_range(0..PKG_PREFIXES.len())];
        let suffix = PKG_SUFFIXES[self.rng.random_range(0..PKG_SUFFIXES.len())];
        let combined = format!("{prefix}{suffix}");
        if combined.len() >= len {
            return combined[..len].to_string();
        }
        let middle = PKG_MIDDLES[self.rng.random_range(0..PKG_MIDDLES.len())];
        let combined = format!("{prefix}{middle}{suffix}");
        if combined.len() >= len {
            return combined[..len].to_string();
        }
        self.pad(combined, len)
    }

    fn readable(&mut self, original: &str, target_len: usize, has_dot: bool) -> String {
        let body_len = if has_dot {
            target_len.saturating_sub(1)
        } else {
            target_len
        };
        let mut out = String::with_capacity(target_len);
        match original.bytes().next() {
            Some(first) if first.is_ascii_lowercase() => out.push(first as char),
            _ => out.push(LETTERS[self.rng.random_range(0..LETTERS.len())] as char),
        }
        let mut vowel = false;
        while out.len() < body_len {
            let bank = if vowel { VOWELS } else { CONSONANTS };
            out.push(bank[self.rng.random_range(0..bank.len())] as char);
            vowel = !vowel;
        }
        if has_dot {
            out.push('.');
        }
        out
    }

    fn pad(&mut self, mut base: String, len: usize) -> String {
        while base.len() < len {
            base.push(LETTERS[self.rng.random_range(0..LETTERS.len())] as char);
        }
        base
    }

    fn letters(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| LETTERS[self.rng.random_range(0..LETTERS.len())] as char)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_length_with_dot() {
        let mut gen = NaturalNameGenerator::new(1);
        for original in ["main.", "runtime.", "sync.", "net/http."] {
            let name = gen.package_name(original, original.len());
            assert_eq!(name.len(), original.len(), "{original}");
            assert!(name.ends_with('.'));
            assert_ne!(name, original);
        }
    }

    #[test]
    fn test_exact_length_without_dot() {
        let mut gen = NaturalNameGenerator::new(2);
        for len in 1..=20 {
            let name = gen.package_name("placeholder", len);
            assert_eq!(name.len(), len);
            assert!(!name.ends_with('.'));
        }
    }

    #[test]
    fn test_names_are_unique_per_run() {
        let mut gen = NaturalNameGenerator::new(3);
        let mut seen = HashSet::new();
        for _ in 0..30 {
            let name = gen.package_name("golang.org.", 11);
            assert!(seen.insert(name.clone()), "duplicate {name}");
        }
    }

    #[test]
    fn test_tokens_look_like_identifiers() {
        let mut gen = NaturalNameGenerator::new(4);
        for _ in 0..20 {
            let name = gen.package_name("fmt.", 4);
            let body = name.trim_end_matches('.');
            assert!(body.bytes().all(|b| b.is_ascii_lowercase()));
        }
    }

    #[test]
    fn test_deterministic_per_seed() {
        let mut a = NaturalNameGenerator::new(9);
        let mut b = NaturalNameGenerator::new(9);
        assert_eq!(a.package_name("sync.", 5), b.package_name("sync.", 5));
    }
}
