//! Provider serving a fixed token table, used with `--test-authentication`.

use async_trait::async_trait;
use std::collections::BTreeMap;

use super::{Provider, UserInfo};
use crate::config::StaticIdentity;
use crate::errors::Result;

/// Looks tokens up in a table captured at construction. Unknown tokens are unauthenticated.
#[derive(Debug, Clone)]
pub struct StaticProvider {
    users: BTreeMap<String, UserInfo>,
}

impl StaticProvider {
    pub fn new(identities: &BTreeMap<String, StaticIdentity>) -> Self {
        let users = identities
            .iter()
            .map(|(token, identity)| {
                (
                    token.clone(),
                    UserInfo {
                        username: identity.username.clone(),
                        uid: identity.uid.clone(),
                        groups: identity.groups.clone(),
                    },
                )
            })
            .collect();
        Self { users }
    }

    pub fn len(&self) -> usize {
        self.users.len()
    }

    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl Provider for StaticProvider {
    async fn lookup(&self, token: &str) -> Result<Option<UserInfo>> {
        Ok(self.users.get(token).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;

    #[tokio::test]
    async fn test_default_table() {
        let provider = StaticProvider::new(&Config::default().static_identities);
        assert_eq!(provider.len(), 4);

        let user = provider.lookup("test1").await.unwrap().unwrap();
        assert_eq!(user.username, "test1");
        assert!(user.groups.is_empty());

        let admin = provider.lookup("admin").await.unwrap().unwrap();
        assert_eq!(admin.username, "admin");

        assert_eq!(provider.lookup("test4").await.unwrap(), None);
        assert_eq!(provider.lookup("").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_configured_table() {
        let mut identities = BTreeMap::new();
        identities.insert(
            "ops-token".to_string(),
            StaticIdentity {
                username: "ops".to_string(),
                uid: "42".to_string(),
                groups: vec!["system:masters".to_string()],
            },
        );
        let provider = StaticProvider::new(&identities);

        let user = provider.lookup("ops-token").await.unwrap().unwrap();
        assert_eq!(user.uid, "42");
        assert!(user.is_master());
        assert_eq!(provider.lookup("test1").await.unwrap(), None);
    }
}
