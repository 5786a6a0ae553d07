//! Stable identifiers and portable names for layers.

use sha2::{Digest, Sha256};

/// Salt mixed into layer ids so identifiers are not trivially
/// reversible to user-supplied names.
const LAYER_ID_SALT: &str = "s4lt0.g30l1ft.1ng3st";

/// Derives the stable identifier for a layer from its original name.
///
/// The id is the first 32 hex characters of a salted SHA-256 digest,
/// which keeps ids filesystem- and key-safe regardless of what the
/// upload contained. Identical names always map to identical ids, so
/// retries of a crashed task reproduce the same artifact paths.
pub fn layer_id(original_name: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(original_name.as_bytes());
    hasher.update(LAYER_ID_SALT.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(32);
    for byte in digest.iter().take(16) {
        hex.push_str(&format!("{byte:02x}"));
    }
    hex
}

/// Cleans a field name for portability across downstream consumers.
///
/// Lower-cases, transliterates common Latin accents, and strips every
/// character outside `[a-z0-9]`. Idempotent: `clean_name(clean_name(x))
/// == clean_name(x)`.
pub fn clean_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.to_lowercase().chars() {
        match ch {
            'a'..='z' | '0'..='9' => out.push(ch),
            'á' | 'à' | 'â' | 'ä' | 'ã' | 'å' => out.push('a'),
            'é' | 'è' | 'ê' | 'ë' => out.push('e'),
            'í' | 'ì' | 'î' | 'ï' => out.push('i'),
            'ó' | 'ò' | 'ô' | 'ö' | 'õ' => out.push('o'),
            'ú' | 'ù' | 'û' | 'ü' => out.push('u'),
            'ñ' => out.push('n'),
            'ç' => out.push('c'),
            _ => {}
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layer_id_is_stable() {
        assert_eq!(layer_id("roads"), layer_id("roads"));
        assert_ne!(layer_id("roads"), layer_id("rivers"));
    }

    #[test]
    fn test_layer_id_length_and_charset() {
        let id = layer_id("Municipalities of Madrid");
        assert_eq!(id.len(), 32);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_clean_name_lowercases_and_strips() {
        assert_eq!(clean_name("Field Name (m2)"), "fieldnamem2");
        assert_eq!(clean_name("COD_POSTAL"), "codpostal");
    }

    #[test]
    fn test_clean_name_transliterates_accents() {
        assert_eq!(clean_name("Población"), "poblacion");
        assert_eq!(clean_name("Área"), "area");
    }

    #[test]
    fn test_clean_name_idempotent() {
        let once = clean_name("Año_Censo");
        assert_eq!(clean_name(&once), once);
    }
}
