use serde_json;

use crate::error::ProtodefError;

pub fn quote(text: &str) -> String {
    serde_json::to_string(text).unwrap()
}

pub fn parse_error(file: &str, line: usize, msg: &str) -> ProtodefError {
    ProtodefError::Parse {
        file: file.to_string(),
        line,
        msg:  msg.to_string(),
    }
}
