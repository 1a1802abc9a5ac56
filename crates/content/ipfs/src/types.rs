use std::collections::HashMap;

use serde::Deserialize;

/// Response body of `add`.
#[derive(Debug, Deserialize)]
pub(crate) struct AddResponse {
    #[serde(rename = "Hash")]
    pub hash: String,
}

/// Response body of `pin/ls`.
#[derive(Debug, Deserialize)]
pub(crate) struct PinLsResponse {
    #[serde(rename = "Keys", default)]
    pub keys: HashMap<String, serde_json::Value>,
}

/// One line of the newline-delimited `refs/local` output.
#[derive(Debug, Deserialize)]
pub(crate) struct RefLine {
    #[serde(rename = "Ref", default)]
    pub reference: String,
    #[serde(rename = "Err", default)]
    pub err: String,
}

/// Error body returned by the daemon on non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiError {
    #[serde(rename = "Message", default)]
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_pin_ls() {
        let body = r#"{"Keys":{"QmA1":{"Type":"recursive"},"QmB2":{"Type":"recursive"}}}"#;
        let parsed: PinLsResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.keys.len(), 2);
        assert!(parsed.keys.contains_key("QmA1"));
    }

    #[test]
    fn parses_ref_line_without_error() {
        let parsed: RefLine = serde_json::from_str(r#"{"Ref":"QmA1","Err":""}"#).unwrap();
        assert_eq!(parsed.reference, "QmA1");
        assert!(parsed.err.is_empty());
    }

    #[test]
    fn parses_api_error() {
        let parsed: ApiError =
            serde_json::from_str(r#"{"Message":"not pinned or pinned indirectly","Code":0,"Type":"error"}"#)
                .unwrap();
        assert_eq!(parsed.message, "not pinned or pinned indirectly");
    }
}
