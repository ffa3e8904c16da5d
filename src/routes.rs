//! Table of forwarding endpoints.
//!
//! Every endpoint is one instance of the same forward-and-normalize operation,
//! parameterized by how the client input is read, where it goes upstream and
//! how the upstream answer is turned into a result.

/// How the inbound request is validated and re-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    /// JSON body holding a non-empty string under this field.
    JsonField(&'static str),
    /// Multipart form holding a file part under this field.
    File(&'static str),
}

/// Which upstream base URL a route is sent to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Transcriber,
    Parser,
}

/// Shape of the normalized success body.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
    /// `{ text }`
    Text,
    /// `{ ingredients, steps }`
    Recipe,
}

/// What to do when a 2xx upstream body is not JSON.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NonJson {
    /// Fail with a protocol error.
    Reject,
    /// Unless the content type claims JSON, use the raw body as the result text.
    RawText,
}

#[derive(Debug, Clone, Copy)]
pub struct Route {
    pub name: &'static str,
    pub path: &'static str,
    pub input: Input,
    pub target: Target,
    pub upstream_path: &'static str,
    pub output: Output,
    pub non_json: NonJson,
}

impl Route {
    pub fn field(&self) -> &'static str {
        match self.input {
            Input::JsonField(field) | Input::File(field) => field,
        }
    }
}

pub const EXTRACT: Route = Route {
    name: "extract",
    path: "/api/extract",
    input: Input::JsonField("url"),
    target: Target::Transcriber,
    upstream_path: "/extract",
    output: Output::Text,
    non_json: NonJson::Reject,
};

pub const PARSE: Route = Route {
    name: "parse",
    path: "/api/parse",
    input: Input::JsonField("transcript"),
    target: Target::Parser,
    upstream_path: "/parse",
    output: Output::Recipe,
    non_json: NonJson::Reject,
};

pub const TRANSCRIBE: Route = Route {
    name: "transcribe",
    path: "/api/transcribe",
    input: Input::File("file"),
    target: Target::Transcriber,
    upstream_path: "/transcribe",
    output: Output::Text,
    non_json: NonJson::RawText,
};

pub const TRANSCRIBE_URL: Route = Route {
    name: "transcribe-url",
    path: "/api/transcribe-url",
    input: Input::JsonField("url"),
    target: Target::Transcriber,
    upstream_path: "/transcribe-url",
    output: Output::Text,
    non_json: NonJson::Reject,
};

pub const ROUTES: [Route; 4] = [EXTRACT, PARSE, TRANSCRIBE, TRANSCRIBE_URL];

pub const HEALTH_PATH: &str = "/api/health";
