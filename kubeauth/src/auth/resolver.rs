//! Decides who a token belongs to from the backend's answers. No I/O happens here.

use super::{KUBERNETES_MASTER_GROUP, UserInfo};
use crate::backend::{EnvironmentMembership, Identity};

/// Identities returned for one token, split into the user and the groups it belongs to.
#[derive(Debug, Default)]
struct Partition<'a> {
    rancher_user: Option<&'a Identity>,
    federated_user: Option<&'a Identity>,
    groups: Vec<&'a Identity>,
}

impl<'a> Partition<'a> {
    fn new(identities: &'a [Identity]) -> Self {
        let mut partition = Self::default();
        for identity in identities {
            if !identity.user {
                partition.groups.push(identity);
            } else if identity.is_rancher_identity() {
                partition.rancher_user = Some(identity);
            } else {
                partition.federated_user = Some(identity);
            }
        }
        partition
    }

    /// The federated identity names the user unless there isn't one, then the rancher one does.
    fn primary_user(&self) -> Option<&'a Identity> {
        match self.federated_user {
            Some(identity) if !identity.id.is_empty() => Some(identity),
            _ => self.rancher_user.filter(|identity| !identity.id.is_empty()),
        }
    }
}

/// Group name Kubernetes sees for a backend group, e.g. `github_team:infra`
pub fn group_name(identity: &Identity) -> String {
    format!("{}:{}", identity.external_id_type, identity.login)
}

/// Resolve the identities bound to a token against the environment roster.
///
/// The token is authenticated when its primary user identity or any of its group identities is a
/// member of the environment. Membership with the owner role adds the masters group.
pub fn resolve(identities: &[Identity], roster: &EnvironmentMembership) -> Option<UserInfo> {
    let partition = Partition::new(identities);
    let primary = partition.primary_user();

    let mut authenticated = false;
    let mut owner = false;
    for identity in primary.into_iter().chain(partition.groups.iter().copied()) {
        if let Some(member) = roster.get(&identity.id) {
            authenticated = true;
            owner |= member.is_owner();
        }
    }

    if !authenticated {
        return None;
    }

    let mut groups: Vec<String> = partition.groups.iter().map(|identity| group_name(identity)).collect();
    if owner {
        groups.push(KUBERNETES_MASTER_GROUP.to_string());
    }

    Some(UserInfo {
        username: primary.map(|identity| identity.login.clone()).unwrap_or_default(),
        uid: primary.map(|identity| identity.id.clone()).unwrap_or_default(),
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MembershipRecord;

    fn user(id: &str, login: &str, external_id_type: &str) -> Identity {
        Identity {
            id: id.to_string(),
            login: login.to_string(),
            name: login.to_string(),
            user: true,
            external_id_type: external_id_type.to_string(),
        }
    }

    fn group(id: &str, login: &str, external_id_type: &str) -> Identity {
        Identity {
            user: false,
            ..user(id, login, external_id_type)
        }
    }

    fn roster(members: &[(&str, &str)]) -> EnvironmentMembership {
        members
            .iter()
            .map(|(id, role)| {
                (
                    id.to_string(),
                    MembershipRecord {
                        id: id.to_string(),
                        role: role.to_string(),
                        ..Default::default()
                    },
                )
            })
            .collect()
    }

    #[test]
    fn test_owner_is_escalated_to_masters() {
        let identities = [user("u1", "alice", "rancher_id")];
        let user_info = resolve(&identities, &roster(&[("u1", "owner")])).unwrap();

        assert_eq!(user_info.username, "alice");
        assert_eq!(user_info.uid, "u1");
        assert!(user_info.groups.contains(&KUBERNETES_MASTER_GROUP.to_string()));
    }

    #[test]
    fn test_plain_member_is_not_escalated() {
        let identities = [user("u1", "alice", "rancher_id")];
        let user_info = resolve(&identities, &roster(&[("u1", "member")])).unwrap();

        assert_eq!(user_info.username, "alice");
        assert!(user_info.groups.is_empty());
        assert!(!user_info.is_master());
    }

    #[test]
    fn test_non_member_is_unauthenticated() {
        let identities = [user("u2", "bob", "rancher_id")];
        assert_eq!(resolve(&identities, &roster(&[("u1", "owner")])), None);
    }

    #[test]
    fn test_no_identities_is_unauthenticated() {
        assert_eq!(resolve(&[], &roster(&[("u1", "owner")])), None);
    }

    #[test]
    fn test_federated_identity_preferred_for_username() {
        let identities = [
            user("1a5", "alice-local", "rancher_id"),
            user("github_user:7", "alice", "github_user"),
        ];
        let user_info = resolve(&identities, &roster(&[("github_user:7", "member")])).unwrap();

        assert_eq!(user_info.username, "alice");
        assert_eq!(user_info.uid, "github_user:7");
    }

    #[test]
    fn test_only_primary_user_is_checked_against_roster() {
        // The rancher identity is a member, but the federated identity names the user
        let identities = [
            user("1a5", "alice-local", "rancher_id"),
            user("github_user:7", "alice", "github_user"),
        ];
        assert_eq!(resolve(&identities, &roster(&[("1a5", "owner")])), None);
    }

    #[test]
    fn test_rancher_identity_used_when_federated_has_no_id() {
        let identities = [user("", "ghost", "github_user"), user("1a5", "alice", "rancher_id")];
        let user_info = resolve(&identities, &roster(&[("1a5", "member")])).unwrap();

        assert_eq!(user_info.username, "alice");
    }

    #[test]
    fn test_group_membership_authenticates() {
        let identities = [
            user("github_user:7", "alice", "github_user"),
            group("github_team:42", "infra", "github_team"),
            group("github_org:1", "acme", "github_org"),
        ];
        let user_info = resolve(&identities, &roster(&[("github_team:42", "owner")])).unwrap();

        assert_eq!(user_info.username, "alice");
        assert_eq!(
            user_info.groups,
            vec!["github_team:infra".to_string(), "github_org:acme".to_string(), KUBERNETES_MASTER_GROUP.to_string()]
        );
    }

    #[test]
    fn test_owner_role_on_any_match_escalates() {
        let identities = [user("u1", "alice", "rancher_id"), group("g1", "devs", "ldap_group")];
        let user_info = resolve(&identities, &roster(&[("u1", "member"), ("g1", "owner")])).unwrap();

        assert_eq!(user_info.groups, vec!["ldap_group:devs".to_string(), KUBERNETES_MASTER_GROUP.to_string()]);
    }

    #[test]
    fn test_masters_group_added_once() {
        let identities = [user("u1", "alice", "rancher_id"), group("g1", "devs", "ldap_group")];
        let user_info = resolve(&identities, &roster(&[("u1", "owner"), ("g1", "owner")])).unwrap();

        assert_eq!(user_info.groups.iter().filter(|g| *g == KUBERNETES_MASTER_GROUP).count(), 1);
    }

    #[test]
    fn test_group_only_token_has_empty_username() {
        let identities = [group("g1", "devs", "ldap_group")];
        let user_info = resolve(&identities, &roster(&[("g1", "member")])).unwrap();

        assert_eq!(user_info.username, "");
        assert_eq!(user_info.groups, vec!["ldap_group:devs".to_string()]);
    }
}
