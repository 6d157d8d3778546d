//! String literal encryption.
//!
//! A single random key is generated once per run. Each eligible literal is
//! XORed byte-wise with the repeating key and base64-armored, and the
//! occurrence is replaced by a call to a synthesized decrypt helper. The
//! helper is injected once per compilation unit, never into a unit that is
//! restricted to a specific build target (a second copy in a sibling
//! variant would be a duplicate definition when both are compiled).

use crate::mapping::NameGenerator;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use rand::RngCore;

const KEY_LEN: usize = 64;

/// Per-run literal cipher: repeating-key XOR plus base64 armoring
#[derive(Debug, Clone)]
pub struct LiteralCipher {
    key: Vec<u8>,
    helper: String,
}

impl LiteralCipher {
    /// Creates a cipher with a fresh random key and a generated helper name
    pub fn new(gen: &mut NameGenerator) -> Self {
        let mut key = vec![0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut key);
        Self {
            key,
            helper: gen.helper_name(),
        }
    }

    /// Creates a cipher from explicit parts
    pub fn with_key(key: Vec<u8>, helper: String) -> Self {
        Self { key, helper }
    }

    /// Name of the synthesized decrypt function
    pub fn helper_name(&self) -> &str {
        &self.helper
    }

    /// Armor a literal: XOR against the repeating key, then base64
    pub fn encrypt(&self, plain: &str) -> String {
        let bytes: Vec<u8> = plain
            .bytes()
            .enumerate()
            .map(|(i, b)| b ^ self.key[i % self.key.len()])
            .collect();
        STANDARD.encode(bytes)
    }

    /// Reverse of [`encrypt`](Self::encrypt); mirrors what the injected Go
    /// helper computes at runtime
    pub fn decrypt(&self, armored: &str) -> Option<String> {
        let data = STANDARD.decode(armored).ok()?;
        let bytes: Vec<u8> = data
            .iter()
            .enumerate()
            .map(|(i, b)| b ^ self.key[i % self.key.len()])
            .collect();
        String::from_utf8(bytes).ok()
    }

    /// The Go call expression replacing a literal
    pub fn call_expr(&self, plain: &str) -> String {
        format!("{}(\"{}\")", self.helper, self.encrypt(plain))
    }

    /// Go source of the decrypt helper, referring to the base64 package by
    /// `alias`
    pub fn helper_source(&self, alias: &str) -> String {
        let mut key_literal = String::from("[]byte{");
        for (i, b) in self.key.iter().enumerate() {
            if i > 0 {
                key_literal.push_str(", ");
            }
            key_literal.push_str(&b.to_string());
        }
        key_literal.push('}');

        format!(
            "func {name}(encrypted string) string {{\n\
             \tdata, err := {alias}.StdEncoding.DecodeString(encrypted)\n\
             \tif err != nil {{\n\
             \t\treturn \"\"\n\
             \t}}\n\
             \tkey := {key}\n\
             \tresult := make([]byte, len(data))\n\
             \tfor i, b := range data {{\n\
             \t\tresult[i] = b ^ key[i%len(key)]\n\
             \t}}\n\
             \treturn string(result)\n\
             }}\n",
            name = self.helper,
            alias = alias,
            key = key_literal,
        )
    }
}

/// Whether an interpreted string literal's content is worth encrypting.
///
/// Skips short strings and anything containing a backslash escape: the
/// armored form would otherwise encode the escape sequence text, not the
/// decoded bytes.
pub fn literal_eligible(content: &str) -> bool {
    content.len() > 2 && !content.contains('\\')
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn cipher() -> LiteralCipher {
        let key = (0u8..64).map(|i| i.wrapping_mul(37).wrapping_add(11)).collect();
        LiteralCipher::with_key(key, "Qdecode".to_string())
    }

    #[test]
    fn test_round_trip_hello_world() {
        let c = cipher();
        let armored = c.encrypt("hello world");
        assert_ne!(armored, "hello world");
        assert_eq!(c.decrypt(&armored).as_deref(), Some("hello world"));
    }

    #[test]
    fn test_key_repeats_over_long_input() {
        let c = cipher();
        let long = "x".repeat(500);
        assert_eq!(c.decrypt(&c.encrypt(&long)).as_deref(), Some(long.as_str()));
    }

    #[test]
    fn test_call_expr_shape() {
        let c = cipher();
        let call = c.call_expr("hi there");
        assert!(call.starts_with("Qdecode(\""));
        assert!(call.ends_with("\")"));
    }

    #[test]
    fn test_helper_source_embeds_key_and_alias() {
        let c = cipher();
        let src = c.helper_source("qb64");
        assert!(src.contains("func Qdecode(encrypted string) string {"));
        assert!(src.contains("qb64.StdEncoding.DecodeString"));
        assert!(src.contains("key := []byte{11, 48"));
    }

    #[test]
    fn test_eligibility() {
        assert!(literal_eligible("hello"));
        assert!(!literal_eligible("ab"));
        assert!(!literal_eligible("line\\nbreak"));
    }
}
