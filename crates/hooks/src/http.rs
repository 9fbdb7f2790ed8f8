// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

//! HTTP hooks: the hook context as a JSON request body.

use crate::runner::{HookError, HookRunner};
use async_trait::async_trait;
use herd_core::{HookAction, HookConfig, HookContext, HttpMethod};

/// Replace every `${VAR}` occurrence with the process environment value.
///
/// Missing variables substitute as empty strings; multiple occurrences
/// per value are all replaced. An unterminated `${` is left as-is.
pub fn substitute_env_vars(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut rest = value;
    while let Some(start) = rest.find("${") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        match after.find('}') {
            Some(end) => {
                let name = &after[..end];
                out.push_str(&std::env::var(name).unwrap_or_default());
                rest = &after[end + 1..];
            }
            None => {
                out.push_str(&rest[start..]);
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}

/// Issues POST/PUT/PATCH requests with `${VAR}`-substituted headers.
/// Any 2xx status is success; everything else fails with the status and
/// response body.
pub struct HttpRunner {
    client: reqwest::Client,
}

impl HttpRunner {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl HookRunner for HttpRunner {
    async fn execute(&self, hook: &HookConfig, ctx: &HookContext) -> Result<String, HookError> {
        let HookAction::Http {
            url,
            method,
            headers,
        } = &hook.action
        else {
            return Err(HookError::Request("not an http hook".to_string()));
        };

        let mut request = match method {
            HttpMethod::Post => self.client.post(url),
            HttpMethod::Put => self.client.put(url),
            HttpMethod::Patch => self.client.patch(url),
        };
        for (name, value) in headers {
            request = request.header(name, substitute_env_vars(value));
        }

        let response = request
            .json(ctx)
            .send()
            .await
            .map_err(|e| HookError::Request(e.to_string()))?;

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        if status.is_success() {
            Ok(body)
        } else {
            Err(HookError::HttpStatus {
                status: status.as_u16(),
                body,
            })
        }
    }
}

#[cfg(test)]
#[path = "http_tests.rs"]
mod tests;
