//! # Dynamic Message Codec
//!
//! Lets `tonic` carry the JSON bodies of `grepl` calls. Each call resolves its method at runtime,
//! so there are no generated message types: [`JsonCodec`] is built from the method descriptor
//! and converts through `prost_reflect::DynamicMessage` on both sides of the wire.
//!
//! A body that does not fit the request message fails before anything is sent, with
//! `INVALID_ARGUMENT`. A response that cannot be read back fails with `INTERNAL`.
use prost::Message;
use prost_reflect::{DynamicMessage, MessageDescriptor, MethodDescriptor};
use tonic::{
    Status,
    codec::{Codec, DecodeBuf, Decoder, EncodeBuf, Encoder},
};

/// Codec for one method: encodes its request message and decodes its response message.
pub struct JsonCodec {
    request: MessageDescriptor,
    response: MessageDescriptor,
}

impl JsonCodec {
    pub fn for_method(method: &MethodDescriptor) -> Self {
        Self {
            request: method.input(),
            response: method.output(),
        }
    }
}

impl Codec for JsonCodec {
    type Encode = serde_json::Value;
    type Decode = serde_json::Value;

    type Encoder = RequestEncoder;
    type Decoder = ResponseDecoder;

    fn encoder(&mut self) -> Self::Encoder {
        RequestEncoder(self.request.clone())
    }

    fn decoder(&mut self) -> Self::Decoder {
        ResponseDecoder(self.response.clone())
    }
}

pub struct RequestEncoder(MessageDescriptor);

impl Encoder for RequestEncoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn encode(&mut self, item: Self::Item, dst: &mut EncodeBuf<'_>) -> Result<(), Self::Error> {
        from_json(&self.0, item)?.encode_raw(dst);
        Ok(())
    }
}

pub struct ResponseDecoder(MessageDescriptor);

impl Decoder for ResponseDecoder {
    type Item = serde_json::Value;
    type Error = Status;

    fn decode(&mut self, src: &mut DecodeBuf<'_>) -> Result<Option<Self::Item>, Self::Error> {
        let mut msg = DynamicMessage::new(self.0.clone());
        msg.merge(src).map_err(|e| {
            Status::internal(format!(
                "Failed to decode message '{}': {e}",
                self.0.full_name()
            ))
        })?;

        to_json(&msg).map(Some)
    }
}

/// Builds a `desc` message from a JSON body, using the protobuf JSON mapping.
fn from_json(desc: &MessageDescriptor, body: serde_json::Value) -> Result<DynamicMessage, Status> {
    DynamicMessage::deserialize(desc.clone(), body).map_err(|e| {
        Status::invalid_argument(format!(
            "JSON body does not match message '{}': {e}",
            desc.full_name()
        ))
    })
}

fn to_json(msg: &DynamicMessage) -> Result<serde_json::Value, Status> {
    serde_json::to_value(msg)
        .map_err(|e| Status::internal(format!("Failed to map response to JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use echo_service::FILE_DESCRIPTOR_SET;
    use prost_reflect::DescriptorPool;
    use serde_json::json;
    use tonic::Code;

    fn echo_request() -> MessageDescriptor {
        DescriptorPool::decode(FILE_DESCRIPTOR_SET)
            .unwrap()
            .get_message_by_name("echo.EchoRequest")
            .unwrap()
    }

    #[test]
    fn test_body_matching_the_message() {
        let desc = echo_request();

        let msg = from_json(&desc, json!({ "message": "hi" })).unwrap();

        assert_eq!(to_json(&msg).unwrap(), json!({ "message": "hi" }));
        assert!(!msg.encode_to_vec().is_empty());
    }

    #[test]
    fn test_unknown_field_is_invalid_argument() {
        let status = from_json(&echo_request(), json!({ "nope": 1 })).unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
        assert!(status.message().contains("echo.EchoRequest"));
    }

    #[test]
    fn test_mistyped_field_is_invalid_argument() {
        let status = from_json(&echo_request(), json!({ "message": 42 })).unwrap_err();

        assert_eq!(status.code(), Code::InvalidArgument);
    }
}
