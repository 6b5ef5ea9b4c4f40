//! Composite routing-id formatting.
//!
//! The wire dispatch key is one number combining the package id and the
//! message id, rendered through a configured two-slot printf-style
//! template (e.g. `"%d%04d"` for `package * 10000 + message`). Its
//! digit width must be stable across runs for a fixed template, so the
//! template is parsed once and applied mechanically.

use std::collections::HashMap;

use crate::{error::ProtodefError, table::NormalizedTable, utils::quote};

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Slot { width: usize, zero_pad: bool },
}

/// A parsed two-slot id format template. The first slot receives the
/// package id, the second the message id.
#[derive(Debug, Clone, PartialEq)]
pub struct IdFormat {
    segments: Vec<Segment>,
}

impl IdFormat {
    /// Accepts literal text, `%%`, `%d`, `%<width>d` and `%0<width>d`.
    /// Exactly two integer slots are required.
    pub fn parse(fmt: &str) -> Result<Self, ProtodefError> {
        let bad = |msg: &str| {
            ProtodefError::Config(format!("id format {}: {}", quote(fmt), msg))
        };
        let mut segments = Vec::new();
        let mut literal = String::new();
        let mut chars = fmt.chars().peekable();
        while let Some(c) = chars.next() {
            if c != '%' {
                literal.push(c);
                continue;
            }
            if chars.peek() == Some(&'%') {
                chars.next();
                literal.push('%');
                continue;
            }
            if !literal.is_empty() {
                segments.push(Segment::Literal(std::mem::take(&mut literal)));
            }
            let mut zero_pad = false;
            let mut width = 0usize;
            if chars.peek() == Some(&'0') {
                zero_pad = true;
                chars.next();
            }
            while let Some(d) = chars.peek().and_then(|c| c.to_digit(10)) {
                width = width * 10 + d as usize;
                chars.next();
            }
            match chars.next() {
                Some('d') => segments.push(Segment::Slot { width, zero_pad }),
                Some(other) => return Err(bad(&format!("unsupported conversion '%{}'", other))),
                None => return Err(bad("dangling '%'")),
            }
        }
        if !literal.is_empty() {
            segments.push(Segment::Literal(literal));
        }
        let slots = segments
            .iter()
            .filter(|s| matches!(s, Segment::Slot { .. }))
            .count();
        if slots != 2 {
            return Err(bad("exactly two integer slots are required"));
        }
        Ok(IdFormat { segments })
    }

    /// String form of the composite key.
    pub fn compose_sid(&self, package_id: u32, message_id: u32) -> String {
        let mut out = String::new();
        let mut slot = 0;
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => out.push_str(text),
                Segment::Slot { width, zero_pad } => {
                    let value = if slot == 0 { package_id } else { message_id };
                    slot += 1;
                    if *zero_pad {
                        out.push_str(&format!("{:01$}", value, width));
                    } else {
                        out.push_str(&format!("{:1$}", value, width));
                    }
                }
            }
        }
        out
    }

    /// Numeric form of the composite key; fails when literal text in the
    /// template makes the composed string non-numeric.
    pub fn compose_id(&self, package_id: u32, message_id: u32) -> Result<i64, ProtodefError> {
        let sid = self.compose_sid(package_id, message_id);
        sid.trim().parse::<i64>().map_err(|_| {
            ProtodefError::Config(format!(
                "id format composes non-numeric key {}",
                quote(&sid)
            ))
        })
    }
}

/// Composite keys must be injective over every (package, message) pair
/// of one table; an ambiguous template (say `"%d%d"` with package 1,
/// message 11 vs package 11, message 1) is a collision, caught here
/// before anything renders.
pub fn check_injective(fmt: &IdFormat, table: &NormalizedTable) -> Result<(), ProtodefError> {
    let mut seen: HashMap<String, (String, String)> = HashMap::new();
    for ns in &table.namespaces {
        let (Some(ns_name), Some(ns_id)) = (ns.name.as_deref(), ns.id) else {
            continue;
        };
        for member in &ns.members {
            let Some(member_id) = member.id else {
                continue;
            };
            let sid = fmt.compose_sid(ns_id, member_id);
            if let Some((prev_ns, prev_member)) =
                seen.insert(sid.clone(), (ns_name.to_string(), member.name.clone()))
            {
                return Err(ProtodefError::Collision(format!(
                    "composite id {} maps both [{}.{}] and [{}.{}]",
                    quote(&sid),
                    prev_ns,
                    prev_member,
                    ns_name,
                    member.name
                )));
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_compose() {
        let fmt = IdFormat::parse("%d%04d").unwrap();
        assert_eq!(fmt.compose_sid(1, 1), "10001");
        assert_eq!(fmt.compose_sid(12, 345), "120345");
        assert_eq!(fmt.compose_id(1, 1).unwrap(), 10001);

        let fmt = IdFormat::parse("%02d%03d").unwrap();
        assert_eq!(fmt.compose_sid(1, 7), "01007");
        assert_eq!(fmt.compose_id(1, 7).unwrap(), 1007);
    }

    #[test]
    fn test_literal_and_escape() {
        let fmt = IdFormat::parse("%d-%d").unwrap();
        assert_eq!(fmt.compose_sid(3, 4), "3-4");
        assert!(fmt.compose_id(3, 4).is_err());

        let fmt = IdFormat::parse("%d%%%d").unwrap();
        assert_eq!(fmt.compose_sid(3, 4), "3%4");
    }

    #[test]
    fn test_slot_count_enforced() {
        assert!(IdFormat::parse("%d").is_err());
        assert!(IdFormat::parse("%d%d%d").is_err());
        assert!(IdFormat::parse("").is_err());
        assert!(IdFormat::parse("%s%d").is_err());
        assert!(IdFormat::parse("%d%").is_err());
    }

    #[test]
    fn test_space_padding_is_non_numeric() {
        let fmt = IdFormat::parse("%2d%2d").unwrap();
        assert_eq!(fmt.compose_sid(1, 2), " 1 2");
        assert!(fmt.compose_id(1, 2).is_err());
        // wide enough values fill the padding and become numeric again
        assert_eq!(fmt.compose_id(11, 22).unwrap(), 1122);
    }
}
