//! Per-request resolution context.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use woothee::parser::Parser;

use crate::storage::DeviceClass;

/// Everything the resolver may consult about one inbound request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub ip: Option<IpAddr>,
    pub user_agent: Option<String>,
    pub referer: Option<String>,
    pub device: DeviceClass,
    /// Password supplied with the request, if any
    pub password_attempt: Option<String>,
    /// Geo-resolved country of the request IP, when the boundary layer
    /// has already looked it up (rule matching does not block on geo)
    pub country: Option<String>,
    pub now: DateTime<Utc>,
}

impl RequestContext {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            ip: None,
            user_agent: None,
            referer: None,
            device: DeviceClass::Other,
            password_attempt: None,
            country: None,
            now,
        }
    }

    pub fn with_user_agent(mut self, ua: Option<String>) -> Self {
        self.device = ua
            .as_deref()
            .map(classify_device)
            .unwrap_or(DeviceClass::Other);
        self.user_agent = ua;
        self
    }
}

/// Classify a User-Agent into the device buckets routing rules and deep
/// links know about.
pub fn classify_device(user_agent: &str) -> DeviceClass {
    let parser = Parser::new();
    let Some(result) = parser.parse(user_agent) else {
        return DeviceClass::Other;
    };

    match result.os {
        "iPhone" | "iPad" | "iPod" => DeviceClass::Ios,
        "Android" => DeviceClass::Android,
        _ => DeviceClass::Other,
    }
}
