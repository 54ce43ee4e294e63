use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    domain::{ChatId, UserId},
    messaging::types::{ChatInfo, ChatKind, UserInfo},
    Result,
};

/// Live chat-administrator lookup.
///
/// Admin status can change between a prompt and its answer, so callers query
/// this on every evaluation instead of caching.
#[async_trait]
pub trait AdminDirectory: Send + Sync {
    async fn chat_admins(&self, chat_id: ChatId) -> Result<Vec<UserId>>;
}

/// Who may trigger a command or satisfy a continuation.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Permission {
    Anyone,
    ChatAdmin,
    /// Only the user who triggered the command that produced the prompt.
    /// Valid for continuations only; command registration rejects it.
    SameUser,
}

/// Permission outcome. Denial is a value the caller branches on, never an
/// error.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny,
}

pub struct PermissionEvaluator {
    admins: Arc<dyn AdminDirectory>,
}

impl PermissionEvaluator {
    pub fn new(admins: Arc<dyn AdminDirectory>) -> Self {
        Self { admins }
    }

    pub async fn evaluate(
        &self,
        required: Permission,
        chat: &ChatInfo,
        sender: &UserInfo,
        originator: Option<UserId>,
    ) -> Result<Decision> {
        match required {
            Permission::Anyone => Ok(Decision::Allow),
            Permission::ChatAdmin => {
                // A private chat has no admin list; its only member runs it.
                if chat.kind == ChatKind::Private {
                    return Ok(Decision::Allow);
                }
                let admins = self.admins.chat_admins(chat.id).await?;
                if admins.contains(&sender.id) {
                    Ok(Decision::Allow)
                } else {
                    Ok(Decision::Deny)
                }
            }
            Permission::SameUser => match originator {
                Some(user) if user == sender.id => Ok(Decision::Allow),
                _ => Ok(Decision::Deny),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{chat, group_chat, user, StubAdmins};

    fn gate(admins: Vec<UserId>) -> PermissionEvaluator {
        PermissionEvaluator::new(Arc::new(StubAdmins::new(admins)))
    }

    #[tokio::test]
    async fn anyone_always_allows() {
        let gate = gate(vec![]);
        let d = gate
            .evaluate(Permission::Anyone, &group_chat(1), &user(7), None)
            .await
            .unwrap();
        assert_eq!(d, Decision::Allow);
    }

    #[tokio::test]
    async fn chat_admin_checks_live_directory() {
        let gate = gate(vec![UserId(7)]);
        let allow = gate
            .evaluate(Permission::ChatAdmin, &group_chat(1), &user(7), None)
            .await
            .unwrap();
        let deny = gate
            .evaluate(Permission::ChatAdmin, &group_chat(1), &user(8), None)
            .await
            .unwrap();
        assert_eq!(allow, Decision::Allow);
        assert_eq!(deny, Decision::Deny);
    }

    #[tokio::test]
    async fn chat_admin_allows_in_private_chats() {
        let gate = gate(vec![]);
        let d = gate
            .evaluate(Permission::ChatAdmin, &chat(1), &user(7), None)
            .await
            .unwrap();
        assert_eq!(d, Decision::Allow);
    }

    #[tokio::test]
    async fn same_user_compares_originator() {
        let gate = gate(vec![]);
        let allow = gate
            .evaluate(
                Permission::SameUser,
                &group_chat(1),
                &user(7),
                Some(UserId(7)),
            )
            .await
            .unwrap();
        let deny = gate
            .evaluate(
                Permission::SameUser,
                &group_chat(1),
                &user(8),
                Some(UserId(7)),
            )
            .await
            .unwrap();
        let missing = gate
            .evaluate(Permission::SameUser, &group_chat(1), &user(7), None)
            .await
            .unwrap();
        assert_eq!(allow, Decision::Allow);
        assert_eq!(deny, Decision::Deny);
        assert_eq!(missing, Decision::Deny);
    }
}
