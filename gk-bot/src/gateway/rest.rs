//! REST implementation of the chat gateway

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use gk_common::events::Snowflake;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

use super::{ChatGateway, GatewayError, PermissionOverwrite};

const USER_AGENT: &str = concat!("DiscordBot (gatekeeper, ", env!("CARGO_PKG_VERSION"), ")");
const REQUEST_TIMEOUT_SECS: u64 = 15;
const AUDIT_REASON_HEADER: &str = "X-Audit-Log-Reason";

/// Overwrite target type for roles
const ROLE_OVERWRITE: u8 = 0;

#[derive(Debug, Deserialize)]
struct NamedObject {
    id: Snowflake,
    #[serde(default)]
    name: Option<String>,
}

pub struct RestGateway {
    http_client: reqwest::Client,
    base_url: String,
    token: String,
    /// guild -> role name -> role id
    role_cache: Mutex<HashMap<Snowflake, HashMap<String, Snowflake>>>,
}

impl RestGateway {
    pub fn new(base_url: &str, token: &str) -> Result<Self, GatewayError> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(Self {
            http_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
            role_cache: Mutex::new(HashMap::new()),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, self.url(path))
            .header(reqwest::header::AUTHORIZATION, format!("Bot {}", self.token))
    }

    async fn execute(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, GatewayError> {
        let response = request
            .send()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(GatewayError::Api(status.as_u16(), error_text));
        }

        Ok(response)
    }

    async fn fetch_roles(
        &self,
        guild_id: Snowflake,
    ) -> Result<HashMap<String, Snowflake>, GatewayError> {
        let response = self
            .execute(self.request(reqwest::Method::GET, &format!("/guilds/{}/roles", guild_id)))
            .await?;

        let roles: Vec<NamedObject> = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        let by_name: HashMap<String, Snowflake> = roles
            .into_iter()
            .filter_map(|role| role.name.map(|name| (name, role.id)))
            .collect();

        self.role_cache.lock().await.insert(guild_id, by_name.clone());
        Ok(by_name)
    }

    async fn role_id(
        &self,
        guild_id: Snowflake,
        role_name: &str,
    ) -> Result<Snowflake, GatewayError> {
        let cached = self
            .role_cache
            .lock()
            .await
            .get(&guild_id)
            .and_then(|roles| roles.get(role_name).copied());

        if let Some(id) = cached {
            return Ok(id);
        }

        self.fetch_roles(guild_id)
            .await?
            .get(role_name)
            .copied()
            .ok_or_else(|| GatewayError::UnknownRole(role_name.to_string()))
    }

    async fn member_role(
        &self,
        method: reqwest::Method,
        guild_id: Snowflake,
        member_id: Snowflake,
        role_name: &str,
    ) -> Result<(), GatewayError> {
        let role_id = self.role_id(guild_id, role_name).await?;
        let path = format!("/guilds/{}/members/{}/roles/{}", guild_id, member_id, role_id);
        self.execute(self.request(method, &path)).await?;
        Ok(())
    }
}

#[async_trait]
impl ChatGateway for RestGateway {
    async fn send_message(&self, channel_id: Snowflake, content: &str) -> Result<(), GatewayError> {
        let path = format!("/channels/{}/messages", channel_id);
        self.execute(
            self.request(reqwest::Method::POST, &path)
                .json(&json!({ "content": content })),
        )
        .await?;
        Ok(())
    }

    async fn send_direct(&self, user_id: Snowflake, content: &str) -> Result<(), GatewayError> {
        let response = self
            .execute(
                self.request(reqwest::Method::POST, "/users/@me/channels")
                    .json(&json!({ "recipient_id": user_id })),
            )
            .await?;

        let channel: NamedObject = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        self.send_message(channel.id, content).await
    }

    async fn guild_role_names(&self, guild_id: Snowflake) -> Result<Vec<String>, GatewayError> {
        Ok(self.fetch_roles(guild_id).await?.into_keys().collect())
    }

    async fn add_role(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        role_name: &str,
    ) -> Result<(), GatewayError> {
        self.member_role(reqwest::Method::PUT, guild_id, member_id, role_name)
            .await
    }

    async fn remove_roles(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        role_names: &[&str],
    ) -> Result<(), GatewayError> {
        for role_name in role_names {
            self.member_role(reqwest::Method::DELETE, guild_id, member_id, role_name)
                .await?;
        }
        Ok(())
    }

    async fn timeout_member(
        &self,
        guild_id: Snowflake,
        member_id: Snowflake,
        until: DateTime<Utc>,
        reason: &str,
    ) -> Result<(), GatewayError> {
        let path = format!("/guilds/{}/members/{}", guild_id, member_id);
        self.execute(
            self.request(reqwest::Method::PATCH, &path)
                .header(AUDIT_REASON_HEADER, reason)
                .json(&json!({
                    "communication_disabled_until": until.to_rfc3339_opts(SecondsFormat::Secs, true)
                })),
        )
        .await?;
        Ok(())
    }

    async fn set_default_permissions(
        &self,
        guild_id: Snowflake,
        channel_id: Snowflake,
        overwrite: PermissionOverwrite,
    ) -> Result<(), GatewayError> {
        // The default role shares the guild's id
        let path = format!("/channels/{}/permissions/{}", channel_id, guild_id);
        self.execute(
            self.request(reqwest::Method::PUT, &path).json(&json!({
                "type": ROLE_OVERWRITE,
                "allow": overwrite.allow.to_string(),
                "deny": overwrite.deny.to_string(),
            })),
        )
        .await?;
        Ok(())
    }

    async fn find_channel_by_name(
        &self,
        guild_id: Snowflake,
        name: &str,
    ) -> Result<Option<Snowflake>, GatewayError> {
        let response = self
            .execute(self.request(reqwest::Method::GET, &format!("/guilds/{}/channels", guild_id)))
            .await?;

        let channels: Vec<NamedObject> = response
            .json()
            .await
            .map_err(|e| GatewayError::Http(e.to_string()))?;

        Ok(channels
            .into_iter()
            .find(|channel| channel.name.as_deref() == Some(name))
            .map(|channel| channel.id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_base() {
        let gateway = RestGateway::new("https://discord.com/api/v10/", "token").unwrap();
        assert_eq!(
            gateway.url("/channels/1/messages"),
            "https://discord.com/api/v10/channels/1/messages"
        );
    }

    #[test]
    fn test_named_object_accepts_string_ids() {
        let role: NamedObject =
            serde_json::from_str(r#"{"id": "81384788765712384", "name": "GN1", "color": 0}"#)
                .unwrap();
        assert_eq!(role.id, Snowflake(81_384_788_765_712_384));
        assert_eq!(role.name.as_deref(), Some("GN1"));
    }

    #[tokio::test]
    async fn test_cached_role_lookup() {
        let gateway = RestGateway::new("http://127.0.0.1:9", "token").unwrap();
        gateway
            .role_cache
            .lock()
            .await
            .insert(Snowflake(1), HashMap::from([("Trainee".to_string(), Snowflake(77))]));

        assert_eq!(gateway.role_id(Snowflake(1), "Trainee").await.unwrap(), Snowflake(77));
    }
}
