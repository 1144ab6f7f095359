//! Page parameters and list payload parsing.

use serde_json::Value;

use crate::error::TransportError;

/// How pages are requested from the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageConfig {
    pub page_param: String,
    pub size_param: String,
    /// Number of the first page on the wire (0 or 1).
    pub first_page: u32,
    pub page_size: u32,
}

impl Default for PageConfig {
    fn default() -> Self {
        Self {
            page_param: "page".to_string(),
            size_param: "page_size".to_string(),
            first_page: 1,
            page_size: 20,
        }
    }
}

impl PageConfig {
    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn zero_based(mut self) -> Self {
        self.first_page = 0;
        self
    }

    /// Query pairs for a 1-based `page`.
    pub fn query(&self, page: u32) -> Vec<(String, String)> {
        let wire = page.saturating_sub(1) + self.first_page;
        vec![
            (self.page_param.clone(), wire.to_string()),
            (self.size_param.clone(), self.page_size.to_string()),
        ]
    }
}

/// Where the set currently is. Pages are 1-based here regardless of the wire.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageState {
    pub current_page: u32,
    pub page_size: u32,
    pub total_pages: u32,
    pub count: Option<u64>,
}

impl PageState {
    pub fn new(page_size: u32) -> Self {
        Self {
            current_page: 1,
            page_size,
            total_pages: 1,
            count: None,
        }
    }

    /// `Some(page)` when `page` exists, `None` when the request should be a no-op.
    pub fn clamp(&self, page: u32) -> Option<u32> {
        (page >= 1 && page <= self.total_pages.max(1)).then_some(page)
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }

    pub fn has_previous(&self) -> bool {
        self.current_page > 1
    }

    /// Page count for `count` items at this page size, never below one.
    pub fn pages_for(&self, count: u64) -> u32 {
        let pages = count.div_ceil(u64::from(self.page_size.max(1))).max(1);
        u32::try_from(pages).unwrap_or(u32::MAX)
    }

    /// Index of the first item on the current page, 1-based.
    pub fn first_index(&self) -> u64 {
        u64::from(self.current_page.saturating_sub(1)) * u64::from(self.page_size) + 1
    }
}

/// A list response: a bare array, or a paged envelope.
#[derive(Debug, Clone, PartialEq)]
pub enum ListPayload {
    Plain(Vec<Value>),
    Paged {
        results: Vec<Value>,
        count: Option<u64>,
        /// `None` when the envelope only carries `count`.
        num_pages: Option<u32>,
    },
}

impl ListPayload {
    pub fn parse(body: Value) -> Result<Self, TransportError> {
        match body {
            Value::Array(items) => Ok(ListPayload::Plain(items)),
            Value::Object(mut map) => {
                let results = match map.remove("results") {
                    Some(Value::Array(items)) => items,
                    _ => {
                        return Err(TransportError::Decode(
                            "paged response is missing a results array".to_string(),
                        ))
                    }
                };
                let count = map.get("count").and_then(Value::as_u64);
                let num_pages = map
                    .get("num_pages")
                    .and_then(Value::as_u64)
                    .map(|n| u32::try_from(n).unwrap_or(u32::MAX).max(1));
                Ok(ListPayload::Paged {
                    results,
                    count,
                    num_pages,
                })
            }
            other => Err(TransportError::Decode(format!(
                "expected a list response, got {}",
                json_kind(&other)
            ))),
        }
    }

}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
