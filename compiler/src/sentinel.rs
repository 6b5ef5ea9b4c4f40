//! The `//$` sentinel micro-grammar.
//!
//! Every generation mode attaches ids to declarations through the same
//! comment-embedded marker: `//$<id>` after package/message lines,
//! `//$<Name>:<id>` on an `enum EMessageDef` tag, and `$<Ns.Msg>` inside
//! a member's trailing comment. All of it is parsed here so the modes
//! share one implementation.

pub const MARK: &str = "//$";

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Byte index of the first character at or after `start` that is neither
/// an identifier character nor one of `extra`; `s.len()` if none.
pub fn ident_run_end(s: &str, extra: &str, start: usize) -> usize {
    for (i, c) in s[start..].char_indices() {
        if !is_ident_char(c) && !extra.contains(c) {
            return start + i;
        }
    }
    s.len()
}

/// The text after the `//$` marker, if the line carries one.
pub fn payload(line: &str) -> Option<&str> {
    line.find(MARK).map(|i| &line[i + MARK.len()..])
}

fn leading_uint(s: &str) -> Option<u32> {
    let s = s.trim_start();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    if end == 0 {
        return None;
    }
    s[..end].parse().ok()
}

/// Parse the bare-integer payload form: a decimal digit run, with
/// anything after it (a stray `{ }`, trailing comment text) ignored.
pub fn parse_id(payload: &str) -> Option<u32> {
    leading_uint(payload)
}

/// Parse the `Name:Id` payload form used by the EnumCmd header tag. The
/// payload is cut at its last space, then split on `:` into exactly two
/// parts.
pub fn parse_name_id(payload: &str) -> Option<(String, u32)> {
    let mut s = payload;
    if let Some(idx) = s.rfind(' ') {
        s = &s[..idx];
    }
    let mut parts = s.split(':');
    let name = parts.next()?.trim();
    let id = leading_uint(parts.next()?)?;
    if parts.next().is_some() || name.is_empty() {
        return None;
    }
    Some((name.to_string(), id))
}

/// Extract a `$Ns.Msg` reference embedded in a trailing comment. Returns
/// the reference (if one follows the `$`) and the comment text with the
/// token excised.
pub fn split_proto_ref(comment: &str) -> (Option<String>, String) {
    let Some(dollar) = comment.find('$') else {
        return (None, comment.to_string());
    };
    let start = dollar + 1;
    let end = ident_run_end(comment, ".", start);
    let proto = (end > start).then(|| comment[start..end].to_string());
    let cleaned = format!("{} {}", comment[..dollar].trim(), comment[end..].trim());
    (proto, cleaned.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_and_id() {
        assert_eq!(payload("package Foo; //$12"), Some("12"));
        assert_eq!(payload("message Bar"), None);
        assert_eq!(parse_id("12"), Some(12));
        assert_eq!(parse_id(" 7 { }"), Some(7));
        assert_eq!(parse_id("1 extra junk"), Some(1));
        assert_eq!(parse_id("abc"), None);
        assert_eq!(parse_id(""), None);
        assert_eq!(parse_id("-3"), None);
    }

    #[test]
    fn test_parse_name_id() {
        assert_eq!(parse_name_id("Test:1"), Some(("Test".into(), 1)));
        assert_eq!(parse_name_id("Test:1 {"), Some(("Test".into(), 1)));
        assert_eq!(parse_name_id("Test"), None);
        assert_eq!(parse_name_id("Test:one"), None);
        assert_eq!(parse_name_id("A:1:2"), None);
        assert_eq!(parse_name_id(":1"), None);
    }

    #[test]
    fn test_split_proto_ref() {
        let (proto, comment) = split_proto_ref("// login ack $Login.AckMsg");
        assert_eq!(proto.as_deref(), Some("Login.AckMsg"));
        assert_eq!(comment, "// login ack");

        let (proto, comment) = split_proto_ref("// $Login.AckMsg trailing");
        assert_eq!(proto.as_deref(), Some("Login.AckMsg"));
        assert_eq!(comment, "// trailing");

        let (proto, comment) = split_proto_ref("// no reference here");
        assert_eq!(proto, None);
        assert_eq!(comment, "// no reference here");

        // A bare `$` is dropped from the comment but yields no reference.
        let (proto, comment) = split_proto_ref("// empty $ ;");
        assert_eq!(proto, None);
        assert_eq!(comment, "// empty ;");
    }

    #[test]
    fn test_ident_run_end() {
        assert_eq!(ident_run_end("Name rest", "", 0), 4);
        assert_eq!(ident_run_end("Ns.Msg rest", ".", 0), 6);
        assert_eq!(ident_run_end("abc", "", 0), 3);
    }
}
