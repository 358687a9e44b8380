use reqwest::RequestBuilder;

/// Body context for a platform request.
pub enum RequestType {
    /// A plain request with no body.
    Plain,

    /// A JSON request with the content type set to application/json.
    JSON { body: String },

    /// A raw byte-range body, used for chunk transmissions.
    Bytes { body: Vec<u8> },
}

impl RequestType {
    /// Attach this context's body and content type to a request builder.
    pub fn to_request(self, request: RequestBuilder) -> RequestBuilder {
        match self {
            RequestType::Plain => request,
            RequestType::JSON { body } => request
                .header("Content-Type", "application/json")
                .body(body),
            RequestType::Bytes { body } => request
                .header("Content-Type", "application/octet-stream")
                .body(body),
        }
    }
}

#[cfg(test)]
mod tests {
    use reqwest::Client;

    use super::*;

    #[test]
    fn test_plain_request_has_no_body() {
        let request = RequestType::Plain
            .to_request(Client::new().request(reqwest::Method::GET, "http://localhost"))
            .build()
            .expect("Could not build request");

        assert_eq!(request.url().as_str(), "http://localhost/");
        assert!(request.body().is_none());
    }

    #[test]
    fn test_json_request_sets_content_type_and_body() {
        let request = RequestType::JSON {
            body: "{}".to_string(),
        }
        .to_request(Client::new().request(reqwest::Method::POST, "http://localhost"))
        .build()
        .expect("Could not build request");

        assert_eq!(
            request.headers().get("Content-Type").unwrap(),
            "application/json"
        );
        assert_eq!(
            request.body().unwrap().as_bytes().unwrap(),
            "{}".as_bytes()
        );
    }

    #[test]
    fn test_bytes_request_carries_raw_body() {
        let request = RequestType::Bytes {
            body: vec![1, 2, 3],
        }
        .to_request(Client::new().request(reqwest::Method::PATCH, "http://localhost"))
        .build()
        .expect("Could not build request");

        assert_eq!(
            request.headers().get("Content-Type").unwrap(),
            "application/octet-stream"
        );
        assert_eq!(request.body().unwrap().as_bytes().unwrap(), &[1, 2, 3]);
    }
}
