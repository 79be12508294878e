//! Host-visible type names.
//!
//! A type is described by a template name such as
//! `el_dist_matrix<f64,STAR,STAR,ELEMENT>`; its host name is the flat
//! identifier `ElDistMatrix_F64_STAR_STAR_ELEMENT`. Words are capitalized,
//! `::` is dropped and every bracketed argument list, innermost first,
//! becomes an underscore-joined suffix.

use once_cell::sync::OnceCell;
use regex::{Captures, Regex};

use crate::Result;

struct Patterns {
    word: Regex,
    innermost: Regex,
    invalid: Regex,
    underscores: Regex,
    identifier: Regex,
}

static PATTERNS: OnceCell<Patterns> = OnceCell::new();

fn patterns() -> Result<&'static Patterns> {
    Ok(PATTERNS.get_or_try_init(|| -> Result<Patterns> {
        Ok(Patterns {
            word: Regex::new(r"_*([A-Za-z0-9]+)")?,
            innermost: Regex::new(r"<([^<>]*)>")?,
            invalid: Regex::new(r"[^A-Za-z0-9_]")?,
            underscores: Regex::new(r"_+")?,
            identifier: Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")?,
        })
    })?)
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

/// Flat identifier for a template name.
///
/// Pure and deterministic; the result contains only `[A-Za-z0-9_]`.
pub fn identifier(template: &str) -> Result<String> {
    let p = patterns()?;
    let mut name = p
        .word
        .replace_all(template, |caps: &Captures<'_>| capitalize(&caps[1]))
        .replace("::", "");
    while p.innermost.is_match(&name) {
        name = p.innermost.replace_all(&name, "_$1").into_owned();
    }
    let name = p.invalid.replace_all(&name, "_");
    let name = p.underscores.replace_all(&name, "_");
    Ok(name.trim_matches('_').to_string())
}

/// Whether `name` is usable as a host identifier.
pub fn is_identifier(name: &str) -> Result<bool> {
    Ok(patterns()?.identifier.is_match(name))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_examples() {
        let cases = [
            (
                "el_dist_matrix<f64,STAR,STAR,ELEMENT>",
                "ElDistMatrix_F64_STAR_STAR_ELEMENT",
            ),
            ("el_matrix<f64 const>", "ElMatrix_F64_Const"),
            ("el_matrix<Complex<f64>>", "ElMatrix_Complex_F64"),
            ("el_matrix<Complex<f32> const>", "ElMatrix_Complex_F32_Const"),
            ("pca_control<bool,bool,bool>", "PcaControl_Bool_Bool_Bool"),
            ("matrix_index<usize,usize>", "MatrixIndex_Usize_Usize"),
            (
                "range<matrix_index<usize,usize>,matrix_size<usize,usize>>",
                "Range_MatrixIndex_Usize_Usize_MatrixSize_Usize_Usize",
            ),
            ("el::matrix<u32>", "ElMatrix_U32"),
        ];
        for (template, expected) in cases {
            assert_eq!(identifier(template).unwrap(), expected, "{template}");
        }
    }

    #[test]
    fn test_identifier_only_identifier_chars() {
        for template in ["a<b, c>", "<x>", "__init__", "m<n<o<p>>>", "q r-s"] {
            let name = identifier(template).unwrap();
            assert!(name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_'), "{name}");
            assert!(!name.starts_with('_') && !name.ends_with('_'), "{name}");
            assert!(!name.contains("__"), "{name}");
        }
        assert_eq!(identifier("__init__").unwrap(), "Init");
    }

    #[test]
    fn test_is_identifier() {
        assert!(is_identifier("ElMatrix_F64").unwrap());
        assert!(!is_identifier("").unwrap());
        assert!(!is_identifier("64bit").unwrap());
        assert!(!is_identifier("El<Matrix>").unwrap());
    }
}
