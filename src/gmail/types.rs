//! Serde mirrors of the Gmail REST v1 JSON. Every field is optional because
//! the API omits anything empty and the metadata/full formats differ.

use serde::Deserialize;

#[derive(Debug, Default, Deserialize)]
pub struct ListMessagesResponse {
    pub messages: Option<Vec<MessageRef>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct MessageRef {
    pub id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Message {
    pub id: Option<String>,
    /// Millis since epoch, transmitted as a JSON string.
    #[serde(rename = "internalDate")]
    pub internal_date: Option<String>,
    pub payload: Option<MessagePart>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    #[serde(rename = "mimeType")]
    pub mime_type: Option<String>,
    pub headers: Option<Vec<Header>>,
    pub body: Option<MessagePartBody>,
    pub parts: Option<Vec<MessagePart>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Header {
    pub name: Option<String>,
    pub value: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePartBody {
    /// URL-safe base64, per the API.
    pub data: Option<String>,
}
