//! XML documents of the object-store multipart API.

use serde::{Deserialize, Serialize};

/// Reply to an initiate-multipart request.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename = "InitiateMultipartUploadResult")]
pub struct InitiateMultipartUploadResult {
    #[serde(rename = "Bucket", default)]
    pub bucket: String,
    #[serde(rename = "Key", default)]
    pub key: String,
    #[serde(rename = "UploadId", default)]
    pub upload_id: String,
}

/// One entry of a complete-multipart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedPart {
    #[serde(rename = "PartNumber")]
    pub part_number: u32,
    #[serde(rename = "ETag")]
    pub etag: String,
}

/// Body of a complete-multipart request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename = "CompleteMultipartUpload")]
pub struct CompleteMultipartUpload {
    #[serde(rename = "Part", default)]
    pub parts: Vec<CompletedPart>,
}

impl CompleteMultipartUpload {
    /// Serializes the request body.
    pub fn to_xml(&self) -> Result<String, quick_xml::DeError> {
        quick_xml::se::to_string(self)
    }
}

/// Error document returned on non-2xx replies.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename = "Error")]
pub struct OssErrorResponse {
    #[serde(rename = "Code", default)]
    pub code: String,
    #[serde(rename = "Message", default)]
    pub message: String,
    #[serde(rename = "RequestId", default)]
    pub request_id: String,
}

/// Parses an initiate-multipart reply.
pub fn parse_initiate(xml: &str) -> Result<InitiateMultipartUploadResult, quick_xml::DeError> {
    quick_xml::de::from_str(xml)
}

/// Best-effort parse of an error document; `None` if the body is not one.
pub fn parse_error(xml: &str) -> Option<OssErrorResponse> {
    quick_xml::de::from_str(xml).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_initiate_reply() {
        let xml = r#"<?xml version="1.0" encoding="UTF-8"?>
<InitiateMultipartUploadResult>
  <Bucket>fhnfile</Bucket>
  <Key>abc/def</Key>
  <UploadId>0004B9894A22E5B1888A1E29F823****</UploadId>
</InitiateMultipartUploadResult>"#;
        let parsed = parse_initiate(xml).unwrap();
        assert_eq!(parsed.bucket, "fhnfile");
        assert_eq!(parsed.key, "abc/def");
        assert_eq!(parsed.upload_id, "0004B9894A22E5B1888A1E29F823****");
    }

    #[test]
    fn complete_body_keeps_part_order() {
        let body = CompleteMultipartUpload {
            parts: (1..=3)
                .map(|n| CompletedPart {
                    part_number: n,
                    etag: format!("ETAG{n}"),
                })
                .collect(),
        };
        let xml = body.to_xml().unwrap();
        assert!(xml.starts_with("<CompleteMultipartUpload>"));
        let p1 = xml.find("<PartNumber>1</PartNumber>").unwrap();
        let p2 = xml.find("<PartNumber>2</PartNumber>").unwrap();
        let p3 = xml.find("<PartNumber>3</PartNumber>").unwrap();
        assert!(p1 < p2 && p2 < p3);
        assert!(xml.contains("<ETag>ETAG2</ETag>"));

        let back: CompleteMultipartUpload = quick_xml::de::from_str(&xml).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn parses_error_document() {
        let xml = "<Error><Code>NoSuchUpload</Code><Message>gone</Message>\
                   <RequestId>r1</RequestId></Error>";
        let err = parse_error(xml).unwrap();
        assert_eq!(err.code, "NoSuchUpload");
        assert_eq!(err.message, "gone");
    }
}
