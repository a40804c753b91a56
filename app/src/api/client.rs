// Conversion client
// Sends one logical action to the conversion endpoint and normalizes the response.

use super::transport::{RawResponse, Transport};
use crate::error::{Result, WizardError};
use crate::models::requests::{ConversionAction, ConversionRequest};
use crate::models::responses::{
    BottomRowsResponse, ConvertResponse, ErrorBody, HeadersResponse, MergeCandidatesResponse,
    Payload, PreviewResponse,
};
use log::{error, info, warn};
use serde::de::DeserializeOwned;
use std::time::Instant;
use uuid::Uuid;

pub struct ConversionClient<T: Transport> {
    transport: T,
}

impl<T: Transport> ConversionClient<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn send(&self, request: &ConversionRequest) -> Result<Payload> {
        let correlation_id = Uuid::new_v4().simple().to_string();
        let action = request.action;
        info!(
            "[PHASE: conversion] [STEP: {}] Submitting {} ({} bytes) (correlation_id={})",
            action, request.file.name, request.file.size, correlation_id
        );

        let started = Instant::now();
        let raw = match self.transport.submit(request, &correlation_id).await {
            Ok(raw) => raw,
            Err(e) => {
                error!(
                    "[PHASE: conversion] [STEP: {}] Failed after {} ms: {} (correlation_id={})",
                    action,
                    started.elapsed().as_millis(),
                    e,
                    correlation_id
                );
                return Err(e);
            }
        };

        let status = raw.status;
        let result = interpret_response(action, raw);
        match &result {
            Ok(_) => info!(
                "[PHASE: conversion] [STEP: {}] HTTP {} in {} ms (correlation_id={})",
                action,
                status,
                started.elapsed().as_millis(),
                correlation_id
            ),
            Err(e) => warn!(
                "[PHASE: conversion] [STEP: {}] HTTP {} rejected: {} (correlation_id={})",
                action, status, e, correlation_id
            ),
        }
        result
    }
}

fn is_json_content_type(content_type: &str) -> bool {
    let essence = content_type
        .split(';')
        .next()
        .unwrap_or("")
        .trim()
        .to_ascii_lowercase();
    essence == "application/json" || essence.ends_with("+json")
}

fn non_empty(s: &str) -> Option<String> {
    let t = s.trim();
    if t.is_empty() {
        None
    } else {
        Some(t.to_string())
    }
}

/// Decode a raw response for `action`.
///
/// JSON bodies are parsed as JSON; anything else is treated as an error message, because the web
/// server in front of the service answers some failures with plain text.
pub fn interpret_response(action: ConversionAction, raw: RawResponse) -> Result<Payload> {
    let is_json = raw
        .content_type
        .as_deref()
        .map(is_json_content_type)
        .unwrap_or(false);
    let success = (200..300).contains(&raw.status);

    if !success || !is_json {
        // A body labelled JSON that does not parse is a plain-text error in disguise.
        let message = if is_json {
            match serde_json::from_str::<ErrorBody>(&raw.body) {
                Ok(body) => body.error.and_then(|e| non_empty(&e)),
                Err(_) => non_empty(&raw.body),
            }
        } else {
            non_empty(&raw.body)
        };
        return Err(WizardError::Server {
            status: raw.status,
            message: message.unwrap_or_else(|| action.default_error_message().to_string()),
        });
    }

    match action {
        ConversionAction::GetPreview => {
            decode::<PreviewResponse>(action, &raw.body).map(Payload::Preview)
        }
        ConversionAction::GetHeaders => {
            decode::<HeadersResponse>(action, &raw.body).map(Payload::Headers)
        }
        ConversionAction::GetBottomRows => {
            decode::<BottomRowsResponse>(action, &raw.body).map(Payload::BottomRows)
        }
        ConversionAction::GetPostMergerCandidates => {
            decode::<MergeCandidatesResponse>(action, &raw.body).map(Payload::MergeCandidates)
        }
        ConversionAction::Convert => {
            decode::<ConvertResponse>(action, &raw.body).map(Payload::Converted)
        }
    }
}

fn decode<R: DeserializeOwned>(action: ConversionAction, body: &str) -> Result<R> {
    serde_json::from_str(body).map_err(|e| WizardError::MalformedResponse {
        action,
        detail: e.to_string(),
    })
}
