//! Speakers service facade.
//!
//! One method per downstream endpoint, all routed through the resilient client.

use axum::body::Bytes;
use serde_json::Value;

use crate::client::discovery::{encode_segment, Discovery};
use crate::client::resilient::{ClientError, ResilientClient};

#[derive(Debug)]
pub struct SpeakersService<D> {
    client: ResilientClient<D>,
}

impl<D: Discovery> SpeakersService<D> {
    pub fn new(client: ResilientClient<D>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &ResilientClient<D> {
        &self.client
    }

    pub async fn get_names(&self) -> Result<Value, ClientError> {
        self.client.get_json("/names").await
    }

    pub async fn get_list_short(&self) -> Result<Value, ClientError> {
        self.client.get_json("/list-short").await
    }

    pub async fn get_list(&self) -> Result<Value, ClientError> {
        self.client.get_json("/list").await
    }

    pub async fn get_all_artwork(&self) -> Result<Value, ClientError> {
        self.client.get_json("/artwork").await
    }

    pub async fn get_speaker(&self, shortname: &str) -> Result<Value, ClientError> {
        self.client
            .get_json(&format!("/speaker/{}", encode_segment(shortname)))
            .await
    }

    pub async fn get_artwork_for_speaker(&self, shortname: &str) -> Result<Value, ClientError> {
        self.client
            .get_json(&format!("/artwork/{}", encode_segment(shortname)))
            .await
    }

    /// Image bytes; `path` may contain `/` separators.
    pub async fn get_image(&self, path: &str) -> Result<Bytes, ClientError> {
        let encoded: Vec<String> = path
            .split('/')
            .filter(|s| !s.is_empty() && *s != "." && *s != "..")
            .map(encode_segment)
            .collect();
        self.client
            .get_stream(&format!("/images/{}", encoded.join("/")))
            .await
    }
}
