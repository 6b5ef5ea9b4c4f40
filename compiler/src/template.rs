//! Positional template expansion.
//!
//! Mode templates are opaque text files with numbered `{n}` holes; the
//! renderer computes the fragments and this function splices them in. A
//! hole with no matching fragment is left verbatim, so templates may
//! carry literal braces for slots a mode does not fill.

use lazy_static::lazy_static;
use regex::{Captures, Regex};

lazy_static! {
    static ref HOLE: Regex = Regex::new(r"\{(\d+)\}").unwrap();
}

pub fn expand(template: &str, fragments: &[&str]) -> String {
    HOLE.replace_all(template, |caps: &Captures| {
        let idx: usize = caps[1].parse().unwrap_or(usize::MAX);
        match fragments.get(idx) {
            Some(fragment) => fragment.to_string(),
            None => caps[0].to_string(),
        }
    })
    .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_in_order() {
        assert_eq!(expand("{0}-{1}-{0}", &["a", "b"]), "a-b-a");
    }

    #[test]
    fn test_out_of_range_hole_is_preserved() {
        assert_eq!(expand("{0} {5}", &["a"]), "a {5}");
    }

    #[test]
    fn test_non_numeric_braces_untouched() {
        assert_eq!(expand("fn f() { body }", &[]), "fn f() { body }");
    }
}
