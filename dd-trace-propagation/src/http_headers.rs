// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! Client address and user agent headers recorded during extraction.

use crate::encoding::first_header_value;

pub const FORWARDED_KEY: &str = "forwarded";
pub const FORWARDED_FOR_KEY: &str = "forwarded-for";
pub const X_FORWARDED_KEY: &str = "x-forwarded";
pub const X_FORWARDED_FOR_KEY: &str = "x-forwarded-for";
pub const X_FORWARDED_PROTO_KEY: &str = "x-forwarded-proto";
pub const X_FORWARDED_HOST_KEY: &str = "x-forwarded-host";
pub const X_FORWARDED_PORT_KEY: &str = "x-forwarded-port";
pub const X_CLIENT_IP_KEY: &str = "x-client-ip";
pub const TRUE_CLIENT_IP_KEY: &str = "true-client-ip";
pub const X_CLUSTER_CLIENT_IP_KEY: &str = "x-cluster-client-ip";
pub const X_REAL_IP_KEY: &str = "x-real-ip";
pub const FASTLY_CLIENT_IP_KEY: &str = "fastly-client-ip";
pub const CF_CONNECTING_IP_KEY: &str = "cf-connecting-ip";
pub const CF_CONNECTING_IP_V6_KEY: &str = "cf-connecting-ipv6";
pub const USER_AGENT_KEY: &str = "user-agent";

#[derive(Clone, Default, Debug, PartialEq, Eq)]
pub struct HttpHeaders {
    pub forwarded: Option<String>,
    pub forwarded_for: Option<String>,
    pub x_forwarded: Option<String>,
    pub x_forwarded_for: Option<String>,
    pub x_forwarded_proto: Option<String>,
    pub x_forwarded_host: Option<String>,
    pub x_forwarded_port: Option<String>,
    pub x_client_ip: Option<String>,
    pub true_client_ip: Option<String>,
    pub x_cluster_client_ip: Option<String>,
    pub x_real_ip: Option<String>,
    pub fastly_client_ip: Option<String>,
    pub cf_connecting_ip: Option<String>,
    pub cf_connecting_ipv6: Option<String>,
    pub user_agent: Option<String>,
}

impl HttpHeaders {
    /// Stores `value` if `lower_name` is a recognized header.
    ///
    /// A repeated header keeps its first value. Proto, host and port only keep
    /// the first hop. Returns whether the header was recognized.
    pub fn record(&mut self, lower_name: &str, value: &str) -> bool {
        let slot = match lower_name {
            FORWARDED_KEY => &mut self.forwarded,
            FORWARDED_FOR_KEY => &mut self.forwarded_for,
            X_FORWARDED_KEY => &mut self.x_forwarded,
            X_FORWARDED_FOR_KEY => &mut self.x_forwarded_for,
            X_FORWARDED_PROTO_KEY => &mut self.x_forwarded_proto,
            X_FORWARDED_HOST_KEY => &mut self.x_forwarded_host,
            X_FORWARDED_PORT_KEY => &mut self.x_forwarded_port,
            X_CLIENT_IP_KEY => &mut self.x_client_ip,
            TRUE_CLIENT_IP_KEY => &mut self.true_client_ip,
            X_CLUSTER_CLIENT_IP_KEY => &mut self.x_cluster_client_ip,
            X_REAL_IP_KEY => &mut self.x_real_ip,
            FASTLY_CLIENT_IP_KEY => &mut self.fastly_client_ip,
            CF_CONNECTING_IP_KEY => &mut self.cf_connecting_ip,
            CF_CONNECTING_IP_V6_KEY => &mut self.cf_connecting_ipv6,
            USER_AGENT_KEY => &mut self.user_agent,
            _ => return false,
        };
        if slot.is_none() {
            let value = match lower_name {
                X_FORWARDED_PROTO_KEY | X_FORWARDED_HOST_KEY | X_FORWARDED_PORT_KEY => {
                    first_header_value(Some(value)).unwrap_or(value)
                }
                _ => value,
            };
            *slot = Some(value.to_string());
        }
        true
    }

    pub fn is_empty(&self) -> bool {
        *self == HttpHeaders::default()
    }

    /// Address of the client as reported by the closest proxy.
    ///
    /// Headers are consulted in a fixed order, the first present one wins.
    pub fn client_ip(&self) -> Option<&str> {
        if let Some(ip) = first_header_value(self.x_forwarded_for.as_deref()) {
            return Some(ip);
        }

        [
            &self.x_real_ip,
            &self.true_client_ip,
            &self.x_client_ip,
            &self.x_forwarded,
            &self.forwarded_for,
            &self.x_cluster_client_ip,
            &self.fastly_client_ip,
            &self.cf_connecting_ip,
            &self.cf_connecting_ipv6,
            &self.forwarded,
        ]
        .into_iter()
        .find_map(|header| header.as_deref())
    }
}
